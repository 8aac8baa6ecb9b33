use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// +1.0 for Buy, -1.0 for Sell.
    pub fn signum(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    pub fn from_venue(value: &str) -> Side {
        match value {
            "SELL" => Side::Sell,
            _ => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    StopLoss,
    StopLossLimit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::StopLoss => "STOP_LOSS",
            OrderType::StopLossLimit => "STOP_LOSS_LIMIT",
        }
    }
}

/// Venue-reported order lifecycle state.
///
/// Transitions are monotonic: once a terminal state is reached the order
/// never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Accepted,
    PartiallyFilled,
    Filled,
    Canceled,
    Expired,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Expired
                | OrderStatus::Rejected
        )
    }

    pub fn from_venue(value: &str) -> Option<OrderStatus> {
        match value {
            "NEW" => Some(OrderStatus::Accepted),
            "PARTIALLY_FILLED" => Some(OrderStatus::PartiallyFilled),
            "FILLED" => Some(OrderStatus::Filled),
            "CANCELED" => Some(OrderStatus::Canceled),
            "EXPIRED" => Some(OrderStatus::Expired),
            "REJECTED" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }
}

/// A tracked order: created by the submission path, mutated only by the
/// reconciliation path, immutable once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: i64,
    symbol: String,
    side: Side,
    order_type: OrderType,
    size: f64,
    price: Option<f64>,
    status: OrderStatus,
    executed_qty: f64,
    executed_price: f64,
    commission: f64,
    updated_at: i64,
}

impl Order {
    pub fn new(
        id: i64,
        symbol: impl Into<String>,
        side: Side,
        order_type: OrderType,
        size: f64,
        price: Option<f64>,
        status: OrderStatus,
        timestamp: i64,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            side,
            order_type,
            size,
            price,
            status,
            executed_qty: 0.0,
            executed_price: 0.0,
            commission: 0.0,
            updated_at: timestamp,
        }
    }

    /// An order rejected before it ever reached the venue. `id` is a local
    /// synthetic id (negative by convention) since no venue id exists.
    pub fn rejected(
        id: i64,
        symbol: impl Into<String>,
        side: Side,
        order_type: OrderType,
        size: f64,
        price: Option<f64>,
        timestamp: i64,
    ) -> Self {
        Self::new(
            id,
            symbol,
            side,
            order_type,
            size,
            price,
            OrderStatus::Rejected,
            timestamp,
        )
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn price(&self) -> Option<f64> {
        self.price
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn executed_qty(&self) -> f64 {
        self.executed_qty
    }

    /// Volume-weighted average price across all fills so far.
    pub fn executed_price(&self) -> f64 {
        self.executed_price
    }

    pub fn commission(&self) -> f64 {
        self.commission
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Requested size signed by side.
    pub fn signed_size(&self) -> f64 {
        self.side.signum() * self.size
    }

    /// Accumulates one fill into the executed totals.
    pub fn apply_fill(&mut self, qty: f64, price: f64, commission: f64, timestamp: i64) {
        if qty <= 0.0 {
            return;
        }
        let filled = self.executed_qty + qty;
        self.executed_price = (self.executed_price * self.executed_qty + price * qty) / filled;
        self.executed_qty = filled;
        self.commission += commission;
        self.updated_at = timestamp;
    }

    /// Applies a venue status, enforcing monotonicity. Returns false when
    /// the transition was ignored because the order is already terminal.
    pub fn set_status(&mut self, status: OrderStatus) -> bool {
        if self.status.is_terminal() {
            if status != self.status {
                debug!(
                    "ignoring status {:?} for terminal order {} ({:?})",
                    status, self.id, self.status
                );
            }
            return false;
        }
        self.status = status;
        true
    }
}
