use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::{info, warn};
use order_broker::PositionLedger;
use venue_api::{Broker, Order, OrderStatus, OrderType, Position, Side};

use crate::config::{InvalidSignalConfig, SignalConfig};
use crate::forward::{SignalAction, SignalForwarder, SignalPayload, SignalTransport};

/// Broker implementation that simulates fills locally and forwards the
/// resulting directional signal to an external endpoint.
///
/// Lets the same strategy run in real-execution or signal-forwarding mode
/// purely by swapping the `Broker` implementation it is handed.
pub struct SignalBroker {
    config: SignalConfig,
    forwarder: SignalForwarder,
    ledger: PositionLedger,
    notifications: VecDeque<Order>,
    last_prices: HashMap<String, f64>,
    next_local_id: i64,
}

impl SignalBroker {
    pub fn new(config: SignalConfig) -> Result<Self, InvalidSignalConfig> {
        config.validate()?;
        let forwarder = SignalForwarder::new(&config).map_err(InvalidSignalConfig)?;
        Ok(Self::assemble(config, forwarder))
    }

    /// Test entry: scripted transport instead of HTTP.
    pub fn with_transport(config: SignalConfig, transport: Arc<dyn SignalTransport>) -> Self {
        let forwarder = SignalForwarder::with_transport(&config, transport);
        Self::assemble(config, forwarder)
    }

    fn assemble(config: SignalConfig, forwarder: SignalForwarder) -> Self {
        Self {
            config,
            forwarder,
            ledger: PositionLedger::new(),
            notifications: VecDeque::new(),
            last_prices: HashMap::new(),
            next_local_id: 0,
        }
    }

    /// Records the latest traded price for a symbol; market submissions
    /// fill at this price. Fed by the runner from pulled bars.
    pub fn observe_price(&mut self, symbol: &str, price: f64) {
        self.last_prices.insert(symbol.to_string(), price);
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    fn next_local_id(&mut self) -> i64 {
        self.next_local_id -= 1;
        self.next_local_id
    }
}

impl Broker for SignalBroker {
    fn submit(
        &mut self,
        symbol: &str,
        side: Side,
        order_type: OrderType,
        size: f64,
        price: Option<f64>,
    ) -> Order {
        let now = chrono::Utc::now();
        let now_ms = now.timestamp_millis();

        let Some(trigger_price) = price.or_else(|| self.last_prices.get(symbol).copied()) else {
            warn!("[SignalBroker] no observed price for {symbol}, rejecting submit");
            let id = self.next_local_id();
            let order = Order::rejected(id, symbol, side, order_type, size, price, now_ms);
            self.notifications.push_back(order.clone());
            return order;
        };

        // Opposing an existing exposure is a close, everything else an
        // entry.
        let position = self.ledger.position(symbol);
        let is_close = (position.is_long() && side == Side::Sell)
            || (position.is_short() && side == Side::Buy);
        let action = SignalAction::derive(side, is_close);

        let mut order = Order::new(
            now_ms,
            symbol,
            side,
            order_type,
            size,
            Some(trigger_price),
            OrderStatus::Accepted,
            now_ms,
        );
        order.apply_fill(size, trigger_price, 0.0, now_ms);
        order.set_status(OrderStatus::Filled);
        self.ledger
            .apply_fill(symbol, side.signum() * size, trigger_price);
        self.notifications.push_back(order.clone());

        info!(
            "[SignalBroker] {symbol} {} {} -> {:?} @ {trigger_price}",
            side.as_str(),
            size,
            action
        );
        self.forwarder.dispatch(SignalPayload {
            secret: self.config.secret.clone(),
            max_lag: self.config.max_lag.clone(),
            timestamp: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            trigger_price: trigger_price.to_string(),
            exchange: self.config.exchange.clone(),
            instrument: self.config.instrument.clone(),
            action,
            bot_id: self.config.bot_id.clone(),
        });

        order
    }

    fn cancel(&mut self, order: &Order) {
        // Nothing to cancel at a venue; acknowledge locally.
        let mut canceled = order.clone();
        canceled.set_status(OrderStatus::Canceled);
        self.notifications.push_back(canceled);
    }

    fn position(&self, symbol: &str) -> Position {
        self.ledger.position(symbol)
    }

    fn observe_price(&mut self, symbol: &str, price: f64) {
        SignalBroker::observe_price(self, symbol, price);
    }

    fn next_notification(&mut self) -> Option<Order> {
        self.notifications.pop_front()
    }
}
