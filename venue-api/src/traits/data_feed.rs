use crate::model::bar::Bar;
use crate::model::feed::FeedState;

/// A polled source of closed bars for one instrument.
///
/// `pull` returning `None` means "no data yet" while the feed is live, and
/// "end of stream" once `state()` reports `Terminated`. The caller retries
/// on its next scheduling tick; it never blocks on the feed.
pub trait DataFeed {
    fn pull(&mut self) -> Option<Bar>;

    fn state(&self) -> FeedState;
}
