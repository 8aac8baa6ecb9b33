use std::sync::Arc;

use venue_api::{OrderType, Side};
use venue_gateway::{GatewayError, OrderAck, VenueGateway};

/// The slice of the gateway the broker depends on. A trait seam so tests
/// can run the broker against a scripted venue.
pub trait OrderRouter: Send {
    fn create_order(
        &self,
        symbol: &str,
        side: Side,
        order_type: OrderType,
        size: f64,
        price: Option<f64>,
    ) -> Result<OrderAck, GatewayError>;

    fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<(), GatewayError>;

    fn close_all_positions(&self) -> Result<(), GatewayError>;
}

impl OrderRouter for Arc<VenueGateway> {
    fn create_order(
        &self,
        symbol: &str,
        side: Side,
        order_type: OrderType,
        size: f64,
        price: Option<f64>,
    ) -> Result<OrderAck, GatewayError> {
        VenueGateway::create_order(self, symbol, side, order_type, size, price)
    }

    fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<(), GatewayError> {
        VenueGateway::cancel_order(self, symbol, order_id)
    }

    fn close_all_positions(&self) -> Result<(), GatewayError> {
        VenueGateway::close_all_positions(self)
    }
}
