pub mod model;
pub mod traits;

pub use model::bar::Bar;
pub use model::feed::FeedState;
pub use model::instrument::Instrument;
pub use model::order::{Order, OrderStatus, OrderType, Side};
pub use model::position::Position;
pub use traits::broker::Broker;
pub use traits::data_feed::DataFeed;
