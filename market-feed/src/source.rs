use std::sync::Arc;

use thiserror::Error;
use venue_api::Bar;
use venue_gateway::{BarSink, GatewayError, KlineStream, VenueGateway};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("historical fetch failed: {0}")]
    History(#[from] GatewayError),

    #[error("stream subscription failed: {0}")]
    Subscribe(String),
}

/// Source of historical bars. Seam so tests can script the backfill.
pub trait HistorySource: Send {
    fn klines(&self, symbol: &str, interval: &str, start_ms: i64) -> Result<Vec<Bar>, FeedError>;
}

impl HistorySource for Arc<VenueGateway> {
    fn klines(&self, symbol: &str, interval: &str, start_ms: i64) -> Result<Vec<Bar>, FeedError> {
        Ok(self.get_klines(symbol, interval, start_ms)?)
    }
}

/// Attaches a live kline listener that appends closed bars to `sink`.
pub trait LiveSubscriber: Send {
    fn subscribe(&mut self, symbol: &str, interval: &str, sink: BarSink) -> Result<(), FeedError>;
}

/// Production subscriber: one WebSocket connection and listener thread per
/// feed, kept alive for as long as the subscriber exists.
pub struct KlineSubscriber {
    ws_url: String,
    stream: Option<KlineStream>,
}

impl KlineSubscriber {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            stream: None,
        }
    }

    pub fn for_gateway(gateway: &VenueGateway) -> Self {
        Self::new(gateway.config().ws_url.clone())
    }
}

impl LiveSubscriber for KlineSubscriber {
    fn subscribe(&mut self, symbol: &str, interval: &str, sink: BarSink) -> Result<(), FeedError> {
        let stream = KlineStream::spawn(&self.ws_url, symbol, interval, sink)
            .map_err(|err| FeedError::Subscribe(err.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }
}
