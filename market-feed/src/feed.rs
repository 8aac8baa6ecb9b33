use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use log::{error, info};
use venue_api::{Bar, DataFeed, FeedState};
use venue_gateway::{interval_code, BarSink};

use crate::config::FeedConfig;
use crate::source::{HistorySource, LiveSubscriber};

/// Out-of-band feed lifecycle notifications, polled by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedNotice {
    /// Backfill started; bars are historical until `Live` arrives.
    Delayed,
    /// Stream subscription established.
    Live,
    UnsupportedTimeframe,
    HistoryFailed,
    SubscribeFailed,
}

/// Bar sequence for one instrument.
///
/// Starts in `Backfilling` when a start time is configured (one bulk
/// historical fetch, buffered in chronological order), transitions to
/// `Live` exactly once — after the backfill buffer fully drains — and then
/// serves bars appended by the kline listener thread. `Terminated` is
/// entered on unsupported timeframes, fetch failure, or subscription
/// failure, never left.
pub struct BarFeed<H: HistorySource, L: LiveSubscriber> {
    config: FeedConfig,
    history: H,
    subscriber: L,
    state: FeedState,
    interval: Option<&'static str>,
    backfill: VecDeque<Bar>,
    live: BarSink,
    last_open_time: Option<i64>,
    notices: VecDeque<FeedNotice>,
}

impl<H: HistorySource, L: LiveSubscriber> BarFeed<H, L> {
    pub fn new(config: FeedConfig, history: H, subscriber: L) -> Self {
        Self {
            config,
            history,
            subscriber,
            state: FeedState::Terminated,
            interval: None,
            backfill: VecDeque::new(),
            live: Arc::new(Mutex::new(VecDeque::new())),
            last_open_time: None,
            notices: VecDeque::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    /// Resolves the interval and runs the backfill (or goes straight to
    /// live). Failures terminate the feed with a notice; nothing is raised.
    pub fn start(&mut self) {
        let Some(interval) = interval_code(self.config.timeframe, self.config.compression) else {
            error!(
                "[BarFeed] no venue interval for {:?}/{} on {}",
                self.config.timeframe, self.config.compression, self.config.symbol
            );
            self.state = FeedState::Terminated;
            self.notices.push_back(FeedNotice::UnsupportedTimeframe);
            return;
        };
        self.interval = Some(interval);

        let Some(start_ms) = self.config.start_time else {
            info!("[BarFeed] {} starting live-only", self.config.symbol);
            self.go_live();
            return;
        };

        self.state = FeedState::Backfilling;
        self.notices.push_back(FeedNotice::Delayed);
        match self.history.klines(&self.config.symbol, interval, start_ms) {
            Ok(mut bars) => {
                if self.config.drop_newest {
                    // The most recent bar may span a still-open interval.
                    bars.pop();
                }
                info!(
                    "[BarFeed] {} backfilled {} bars from {}",
                    self.config.symbol,
                    bars.len(),
                    start_ms
                );
                self.backfill.extend(bars);
            }
            Err(err) => {
                error!("[BarFeed] {} backfill failed: {err}", self.config.symbol);
                self.state = FeedState::Terminated;
                self.notices.push_back(FeedNotice::HistoryFailed);
            }
        }
    }

    pub fn next_notice(&mut self) -> Option<FeedNotice> {
        self.notices.pop_front()
    }

    fn go_live(&mut self) {
        if !self.config.live_bars {
            info!(
                "[BarFeed] {} replay finished, live bars disabled",
                self.config.symbol
            );
            self.state = FeedState::Terminated;
            return;
        }
        let Some(interval) = self.interval else {
            self.state = FeedState::Terminated;
            return;
        };
        match self
            .subscriber
            .subscribe(&self.config.symbol, interval, Arc::clone(&self.live))
        {
            Ok(()) => {
                info!("[BarFeed] {} live on {interval}", self.config.symbol);
                self.state = FeedState::Live;
                self.notices.push_back(FeedNotice::Live);
            }
            Err(err) => {
                error!("[BarFeed] {} subscribe failed: {err}", self.config.symbol);
                self.state = FeedState::Terminated;
                self.notices.push_back(FeedNotice::SubscribeFailed);
            }
        }
    }

    /// Yields `bar` only if it advances the open-time watermark. Bars at or
    /// behind the watermark (the backfill tail replayed by the stream, or
    /// duplicates) are dropped.
    fn guard(&mut self, bar: Bar) -> Option<Bar> {
        if let Some(last) = self.last_open_time {
            if bar.open_time <= last {
                return None;
            }
        }
        self.last_open_time = Some(bar.open_time);
        Some(bar)
    }
}

impl<H: HistorySource, L: LiveSubscriber> DataFeed for BarFeed<H, L> {
    fn pull(&mut self) -> Option<Bar> {
        loop {
            match self.state {
                FeedState::Terminated => return None,
                FeedState::Backfilling => {
                    let Some(bar) = self.backfill.pop_front() else {
                        // Buffer drained: switch over, report no data this
                        // tick so the caller resumes on its next pass.
                        self.go_live();
                        return None;
                    };
                    if let Some(bar) = self.guard(bar) {
                        return Some(bar);
                    }
                }
                FeedState::Live => {
                    let next = self
                        .live
                        .lock()
                        .expect("live sink mutex poisoned")
                        .pop_front();
                    let bar = next?;
                    if let Some(bar) = self.guard(bar) {
                        return Some(bar);
                    }
                }
            }
        }
    }

    fn state(&self) -> FeedState {
        self.state
    }
}
