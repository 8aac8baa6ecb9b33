use crate::model::order::{Order, OrderType, Side};
use crate::model::position::Position;

/// Order routing and position tracking as seen by a strategy.
///
/// A strategy holds a `Box<dyn Broker>` and never learns whether orders are
/// executed for real or merely forwarded as signals. All methods run on the
/// caller's thread; `submit` may block on a network round trip, the rest
/// are local.
pub trait Broker: Send {
    /// Submits an order. Never panics or returns an error: a failed
    /// submission yields an `Order` already in `Rejected` state.
    fn submit(
        &mut self,
        symbol: &str,
        side: Side,
        order_type: OrderType,
        size: f64,
        price: Option<f64>,
    ) -> Order;

    /// Requests cancellation. Unknown or already-terminal orders are
    /// ignored; the authoritative outcome arrives as a notification.
    fn cancel(&mut self, order: &Order);

    /// Current net position for one instrument (flat if never traded).
    fn position(&self, symbol: &str) -> Position;

    /// Hints the latest traded price. Implementations executing at the
    /// venue ignore it; simulated ones fill market orders at this price.
    fn observe_price(&mut self, _symbol: &str, _price: f64) {}

    /// Pops the oldest pending order notification, if any.
    ///
    /// Polled once per strategy tick; also drives event reconciliation for
    /// implementations fed by a push stream.
    fn next_notification(&mut self) -> Option<Order>;
}

impl Broker for Box<dyn Broker> {
    fn submit(
        &mut self,
        symbol: &str,
        side: Side,
        order_type: OrderType,
        size: f64,
        price: Option<f64>,
    ) -> Order {
        (**self).submit(symbol, side, order_type, size, price)
    }

    fn cancel(&mut self, order: &Order) {
        (**self).cancel(order)
    }

    fn position(&self, symbol: &str) -> Position {
        (**self).position(symbol)
    }

    fn observe_price(&mut self, symbol: &str, price: f64) {
        (**self).observe_price(symbol, price)
    }

    fn next_notification(&mut self) -> Option<Order> {
        (**self).next_notification()
    }
}
