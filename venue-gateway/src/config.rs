use serde::Deserialize;

fn default_recv_window() -> u64 {
    5_000
}

fn default_retries() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_rate_gap_ms() -> u64 {
    // 1200 request weight per minute.
    50
}

fn default_event_capacity() -> usize {
    256
}

/// Connection settings for one venue, constructed once and immutable
/// thereafter.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub rest_url: String,
    pub ws_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// Quote asset balances are reported in (e.g. "USDT").
    pub quote_asset: String,
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,
    /// Attempt count for safely-retryable calls.
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum gap between any two REST calls (self-imposed rate limit).
    #[serde(default = "default_rate_gap_ms")]
    pub rate_gap_ms: u64,
    /// Capacity of the bounded order-event channel fed by the user stream.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rest_url: "https://fapi.binance.com".to_string(),
            ws_url: "wss://fstream.binance.com".to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            quote_asset: "USDT".to_string(),
            recv_window: default_recv_window(),
            retries: default_retries(),
            timeout_secs: default_timeout_secs(),
            rate_gap_ms: default_rate_gap_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl GatewayConfig {
    pub fn testnet() -> Self {
        Self {
            rest_url: "https://testnet.binancefuture.com".to_string(),
            ws_url: "wss://stream.binancefuture.com".to_string(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self.api_secret = api_secret.into();
        self
    }
}
