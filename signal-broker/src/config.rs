use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

fn default_max_lag() -> String {
    "30000".to_string()
}

fn default_exchange() -> String {
    "BINANCE".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_attempt_timeout_secs() -> u64 {
    5
}

fn default_fallback_log() -> PathBuf {
    PathBuf::from("signals.log")
}

#[derive(Debug, Error)]
#[error("invalid signal config: {0}")]
pub struct InvalidSignalConfig(pub String);

/// Delivery settings for outbound trade signals. Built once, validated,
/// immutable thereafter.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    /// Webhook URL the signal payload is POSTed to.
    pub endpoint: String,
    pub secret: String,
    /// Ticker name as the receiving bot knows it.
    pub instrument: String,
    pub bot_id: String,
    #[serde(default = "default_max_lag")]
    pub max_lag: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    /// Where exhausted signals are appended instead of being lost.
    #[serde(default = "default_fallback_log")]
    pub fallback_log: PathBuf,
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), InvalidSignalConfig> {
        if self.endpoint.is_empty() {
            return Err(InvalidSignalConfig("endpoint is required".to_string()));
        }
        if self.secret.is_empty() {
            return Err(InvalidSignalConfig("secret is required".to_string()));
        }
        if self.instrument.is_empty() {
            return Err(InvalidSignalConfig("instrument is required".to_string()));
        }
        if self.bot_id.is_empty() {
            return Err(InvalidSignalConfig("bot_id is required".to_string()));
        }
        Ok(())
    }
}
