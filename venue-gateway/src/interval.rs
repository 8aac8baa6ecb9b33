use serde::Deserialize;

/// Bar timeframe unit requested by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Timeframe {
    Minutes,
    Days,
    Weeks,
    Months,
}

/// Maps a timeframe/compression pair onto the venue's kline interval code.
/// Returns `None` for combinations the venue has no stream for.
pub fn interval_code(timeframe: Timeframe, compression: u32) -> Option<&'static str> {
    match (timeframe, compression) {
        (Timeframe::Minutes, 1) => Some("1m"),
        (Timeframe::Minutes, 3) => Some("3m"),
        (Timeframe::Minutes, 5) => Some("5m"),
        (Timeframe::Minutes, 15) => Some("15m"),
        (Timeframe::Minutes, 30) => Some("30m"),
        (Timeframe::Minutes, 60) => Some("1h"),
        (Timeframe::Minutes, 120) => Some("2h"),
        (Timeframe::Minutes, 240) => Some("4h"),
        (Timeframe::Minutes, 360) => Some("6h"),
        (Timeframe::Minutes, 480) => Some("8h"),
        (Timeframe::Minutes, 720) => Some("12h"),
        (Timeframe::Days, 1) => Some("1d"),
        (Timeframe::Days, 3) => Some("3d"),
        (Timeframe::Weeks, 1) => Some("1w"),
        (Timeframe::Months, 1) => Some("1M"),
        _ => None,
    }
}

/// Nominal interval duration in milliseconds, used to advance the cursor
/// when paginating historical fetches. Months use 31 days; overshooting is
/// harmless since the venue clamps to actual bar boundaries.
pub fn interval_millis(code: &str) -> i64 {
    const MINUTE: i64 = 60_000;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    match code {
        "1m" => MINUTE,
        "3m" => 3 * MINUTE,
        "5m" => 5 * MINUTE,
        "15m" => 15 * MINUTE,
        "30m" => 30 * MINUTE,
        "1h" => HOUR,
        "2h" => 2 * HOUR,
        "4h" => 4 * HOUR,
        "6h" => 6 * HOUR,
        "8h" => 8 * HOUR,
        "12h" => 12 * HOUR,
        "1d" => DAY,
        "3d" => 3 * DAY,
        "1w" => 7 * DAY,
        "1M" => 31 * DAY,
        _ => MINUTE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_mappings() {
        assert_eq!(interval_code(Timeframe::Minutes, 1), Some("1m"));
        assert_eq!(interval_code(Timeframe::Minutes, 60), Some("1h"));
        assert_eq!(interval_code(Timeframe::Minutes, 720), Some("12h"));
        assert_eq!(interval_code(Timeframe::Days, 3), Some("3d"));
        assert_eq!(interval_code(Timeframe::Months, 1), Some("1M"));
    }

    #[test]
    fn test_unsupported_mappings() {
        assert_eq!(interval_code(Timeframe::Minutes, 7), None);
        assert_eq!(interval_code(Timeframe::Weeks, 2), None);
        assert_eq!(interval_code(Timeframe::Months, 6), None);
    }

    #[test]
    fn test_interval_millis() {
        assert_eq!(interval_millis("1m"), 60_000);
        assert_eq!(interval_millis("1h"), 3_600_000);
        assert_eq!(interval_millis("1d"), 86_400_000);
    }
}
