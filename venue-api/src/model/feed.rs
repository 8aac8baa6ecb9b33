use serde::{Deserialize, Serialize};

/// Lifecycle state of a market data feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedState {
    /// Replaying buffered historical bars.
    Backfilling,
    /// Subscribed to the push stream; bars arrive as intervals close.
    Live,
    /// No more bars will ever be produced.
    Terminated,
}
