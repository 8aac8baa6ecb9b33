use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;

use log::{debug, info, warn};
use venue_api::{Broker, Order, OrderStatus, OrderType, Position, Side};
use venue_gateway::{GatewayError, OrderUpdate, UserStream, VenueGateway};

use crate::ledger::PositionLedger;
use crate::router::OrderRouter;

/// Broker executing orders for real against the venue.
///
/// `submit` runs a blocking REST round trip on the caller's thread and
/// registers the resulting order before returning. Fill/status events are
/// produced by the user-stream listener thread into a bounded channel and
/// reconciled here by `pump_events`, which runs on the same thread that
/// polls `next_notification` — registration therefore always happens
/// before any event for that order can be processed.
pub struct LiveBroker<R: OrderRouter> {
    router: R,
    events: Receiver<OrderUpdate>,
    _user_stream: Option<UserStream>,
    open_orders: HashMap<i64, Order>,
    ledger: PositionLedger,
    notifications: VecDeque<Order>,
    next_local_id: i64,
    stream_down: bool,
}

impl LiveBroker<Arc<VenueGateway>> {
    /// Connects the user data stream and returns a broker wired to the
    /// given gateway.
    pub fn connect(gateway: Arc<VenueGateway>) -> Result<Self, GatewayError> {
        let listen_key = gateway.listen_key()?;
        let config = gateway.config();
        let (stream, events) =
            UserStream::spawn(&config.ws_url, &listen_key, config.event_capacity)?;
        Ok(Self::with_parts(gateway, events, Some(stream)))
    }
}

impl<R: OrderRouter> LiveBroker<R> {
    /// Assembles a broker from its parts. Used directly by tests, which
    /// inject a scripted router and their own event sender.
    pub fn with_parts(
        router: R,
        events: Receiver<OrderUpdate>,
        user_stream: Option<UserStream>,
    ) -> Self {
        Self {
            router,
            events,
            _user_stream: user_stream,
            open_orders: HashMap::new(),
            ledger: PositionLedger::new(),
            notifications: VecDeque::new(),
            next_local_id: 0,
            stream_down: false,
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn open_order_count(&self) -> usize {
        self.open_orders.len()
    }

    /// Market-closes everything on the account. Errors are logged, not
    /// raised; the stream delivers the resulting fills.
    pub fn close_all(&mut self) {
        if let Err(err) = self.router.close_all_positions() {
            warn!("[LiveBroker] close-all failed: {err}");
        }
    }

    /// Drains the event channel and reconciles every pending update.
    fn pump_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(update) => self.reconcile(update),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.stream_down {
                        warn!("[LiveBroker] user stream disconnected, no further fills will arrive");
                        self.stream_down = true;
                    }
                    break;
                }
            }
        }
    }

    fn reconcile(&mut self, update: OrderUpdate) {
        let Some(order) = self.open_orders.get_mut(&update.order_id) else {
            // Untracked id: either an order from another session or a late
            // event for an order already reconciled to a terminal state.
            debug!(
                "[LiveBroker] ignoring event for untracked order {}",
                update.order_id
            );
            return;
        };

        if update.last_qty > 0.0 {
            order.apply_fill(
                update.last_qty,
                update.last_price,
                update.commission,
                update.transact_time,
            );
            let signed = order.side().signum() * update.last_qty;
            self.ledger
                .apply_fill(&update.symbol, signed, update.last_price);
            info!(
                "[LiveBroker] order {} filled {} @ {} ({}/{})",
                update.order_id,
                update.last_qty,
                update.last_price,
                order.executed_qty(),
                order.size()
            );
        }

        match OrderStatus::from_venue(&update.status) {
            Some(status) => {
                order.set_status(status);
            }
            None => warn!(
                "[LiveBroker] unknown venue status '{}' for order {}",
                update.status, update.order_id
            ),
        }

        let snapshot = order.clone();
        if !snapshot.is_open() {
            self.open_orders.remove(&update.order_id);
            info!(
                "[LiveBroker] order {} closed as {:?}",
                update.order_id,
                snapshot.status()
            );
        }
        self.notifications.push_back(snapshot);
    }

    fn next_local_id(&mut self) -> i64 {
        self.next_local_id -= 1;
        self.next_local_id
    }
}

impl<R: OrderRouter> Broker for LiveBroker<R> {
    fn submit(
        &mut self,
        symbol: &str,
        side: Side,
        order_type: OrderType,
        size: f64,
        price: Option<f64>,
    ) -> Order {
        let now = chrono::Utc::now().timestamp_millis();
        match self.router.create_order(symbol, side, order_type, size, price) {
            Ok(ack) => {
                let status =
                    OrderStatus::from_venue(&ack.status).unwrap_or(OrderStatus::Accepted);
                let mut order = Order::new(
                    ack.order_id,
                    symbol,
                    side,
                    order_type,
                    size,
                    price,
                    status,
                    ack.update_time.unwrap_or(now),
                );
                // Market acks can already carry executions.
                let executed = ack.executed_qty_f64();
                if executed > 0.0 {
                    let avg_price = ack.avg_price_f64();
                    order.apply_fill(executed, avg_price, 0.0, ack.update_time.unwrap_or(now));
                    self.ledger
                        .apply_fill(symbol, side.signum() * executed, avg_price);
                }
                if order.is_open() {
                    self.open_orders.insert(order.id(), order.clone());
                }
                self.notifications.push_back(order.clone());
                order
            }
            Err(err) => {
                // Submission failures never reach the strategy as errors.
                warn!("[LiveBroker] submit {symbol} {} failed: {err}", side.as_str());
                let id = self.next_local_id();
                let order = Order::rejected(id, symbol, side, order_type, size, price, now);
                self.notifications.push_back(order.clone());
                order
            }
        }
    }

    fn cancel(&mut self, order: &Order) {
        if !self.open_orders.contains_key(&order.id()) {
            debug!(
                "[LiveBroker] cancel ignored for unknown or closed order {}",
                order.id()
            );
            return;
        }
        if let Err(err) = self.router.cancel_order(order.symbol(), order.id()) {
            warn!("[LiveBroker] cancel {} failed: {err}", order.id());
        }
    }

    fn position(&self, symbol: &str) -> Position {
        self.ledger.position(symbol)
    }

    fn next_notification(&mut self) -> Option<Order> {
        self.pump_events();
        self.notifications.pop_front()
    }
}
