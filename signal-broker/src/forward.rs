use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{info, warn};
use rand::Rng;
use serde::Serialize;
use venue_api::Side;

use crate::config::SignalConfig;

/// Directional action understood by the receiving automation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    EnterLong,
    ExitLong,
    EnterShort,
    ExitShort,
}

impl SignalAction {
    /// Maps an order side onto an action: an order opposing the current
    /// exposure is a close, anything else an entry.
    pub fn derive(side: Side, is_close: bool) -> Self {
        match (side, is_close) {
            (Side::Sell, true) => SignalAction::ExitLong,
            (Side::Buy, true) => SignalAction::ExitShort,
            (Side::Buy, false) => SignalAction::EnterLong,
            (Side::Sell, false) => SignalAction::EnterShort,
        }
    }
}

/// Outbound webhook body.
#[derive(Debug, Clone, Serialize)]
pub struct SignalPayload {
    pub secret: String,
    pub max_lag: String,
    /// UTC ISO-8601 with trailing Z.
    pub timestamp: String,
    pub trigger_price: String,
    pub exchange: String,
    pub instrument: String,
    pub action: SignalAction,
    pub bot_id: String,
}

/// Delivery seam: HTTP in production, scripted in tests.
pub trait SignalTransport: Send + Sync {
    fn post(&self, payload: &SignalPayload) -> Result<(), String>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| err.to_string())?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl SignalTransport for HttpTransport {
    fn post(&self, payload: &SignalPayload) -> Result<(), String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .map_err(|err| err.to_string())?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!(
                "http {status}: {}",
                response.text().unwrap_or_default()
            ))
        }
    }
}

/// Fire-and-forget delivery with bounded retries. Exhausting every attempt
/// appends the signal to a local log instead of raising.
#[derive(Clone)]
pub struct SignalForwarder {
    transport: Arc<dyn SignalTransport>,
    max_retries: u32,
    backoff_base: Duration,
    fallback_log: PathBuf,
}

impl SignalForwarder {
    pub fn new(config: &SignalConfig) -> Result<Self, String> {
        let transport = HttpTransport::new(
            config.endpoint.clone(),
            Duration::from_secs(config.attempt_timeout_secs),
        )?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: &SignalConfig, transport: Arc<dyn SignalTransport>) -> Self {
        Self {
            transport,
            max_retries: config.max_retries.max(1),
            backoff_base: Duration::from_secs(1),
            fallback_log: config.fallback_log.clone(),
        }
    }

    /// Shrinks the retry backoff; tests use zero to avoid sleeping.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Delivers on a detached thread; the caller never waits or fails.
    pub fn dispatch(&self, payload: SignalPayload) {
        let forwarder = self.clone();
        let result = thread::Builder::new()
            .name("signal-forward".to_string())
            .spawn(move || {
                forwarder.deliver(payload);
            });
        if let Err(err) = result {
            warn!("[SignalForwarder] could not spawn delivery thread: {err}");
        }
    }

    /// Synchronous delivery loop. Returns true if the endpoint accepted the
    /// signal, false if it was written to the fallback log.
    pub fn deliver(&self, payload: SignalPayload) -> bool {
        for attempt in 1..=self.max_retries {
            match self.transport.post(&payload) {
                Ok(()) => {
                    info!(
                        "[SignalForwarder] sent {:?} {} @ {}",
                        payload.action, payload.instrument, payload.trigger_price
                    );
                    return true;
                }
                Err(err) => {
                    warn!(
                        "[SignalForwarder] attempt {attempt}/{} failed: {err}",
                        self.max_retries
                    );
                }
            }
            if attempt < self.max_retries {
                thread::sleep(self.backoff(attempt));
            }
        }

        warn!(
            "[SignalForwarder] retries exhausted, logging {:?} {} to {}",
            payload.action,
            payload.instrument,
            self.fallback_log.display()
        );
        if let Err(err) = self.write_fallback(&payload) {
            warn!("[SignalForwarder] fallback log write failed: {err}");
        }
        false
    }

    /// Exponential backoff with uniform jitter: base * 2^attempt + [0, base).
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.backoff_base * 2u32.saturating_pow(attempt);
        let jitter = self.backoff_base.mul_f64(rand::thread_rng().gen::<f64>());
        exp + jitter
    }

    fn write_fallback(&self, payload: &SignalPayload) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.fallback_log)?;
        let line = serde_json::to_string(payload)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        writeln!(file, "{line}")
    }
}
