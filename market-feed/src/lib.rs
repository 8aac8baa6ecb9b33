//! Per-instrument market data feed: a state machine bridging a one-shot
//! historical backfill and the live kline stream.

pub mod config;
pub mod feed;
pub mod source;

pub use config::FeedConfig;
pub use feed::{BarFeed, FeedNotice};
pub use source::{FeedError, HistorySource, KlineSubscriber, LiveSubscriber};

#[cfg(test)]
mod tests;
