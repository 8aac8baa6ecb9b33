//! Connectivity to the trading venue: a blocking, rate-aware REST facade
//! plus the push-stream listener threads feeding fills and closed bars back
//! into the process.

pub mod config;
pub mod error;
pub mod filters;
pub mod interval;
pub mod rest;
pub mod stream;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use filters::FilterCache;
pub use interval::{interval_code, interval_millis, Timeframe};
pub use rest::{OrderAck, VenueGateway};
pub use stream::{BarSink, KlineStream, OrderUpdate, UserStream};
