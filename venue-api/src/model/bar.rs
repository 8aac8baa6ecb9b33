use serde::{Deserialize, Serialize};

/// A closed candle for one instrument and interval.
///
/// `open_time` is the opening timestamp of the backing interval (unix
/// millis), not the close. Bars are immutable once produced and are
/// consumed exactly once by the feed's pull path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(open_time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}
