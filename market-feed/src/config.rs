use serde::Deserialize;
use venue_gateway::Timeframe;

fn default_true() -> bool {
    true
}

/// What one feed replays and streams. Built once at startup, immutable
/// thereafter.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub compression: u32,
    /// Backfill start (unix millis). Absent means live-only.
    #[serde(default)]
    pub start_time: Option<i64>,
    /// Keep streaming after the backfill drains. Off gives a one-shot
    /// historical replay.
    #[serde(default = "default_true")]
    pub live_bars: bool,
    /// Drop the most recent backfill bar, which may belong to a still-open
    /// interval.
    #[serde(default = "default_true")]
    pub drop_newest: bool,
}

impl FeedConfig {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, compression: u32) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            compression,
            start_time: None,
            live_bars: true,
            drop_newest: true,
        }
    }

    pub fn with_start_time(mut self, start_ms: i64) -> Self {
        self.start_time = Some(start_ms);
        self
    }

    pub fn with_live_bars(mut self, live_bars: bool) -> Self {
        self.live_bars = live_bars;
        self
    }
}
