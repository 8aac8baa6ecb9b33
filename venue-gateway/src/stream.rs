use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, warn};
use serde::Deserialize;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};
use venue_api::{Bar, Side};

use crate::error::GatewayError;

/// How often a listener wakes from a blocking read to check for shutdown.
const READ_POLL: Duration = Duration::from_secs(1);

/// Shared buffer a kline listener appends closed bars to.
pub type BarSink = Arc<Mutex<VecDeque<Bar>>>;

/// One fill/status report from the venue's user data stream.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub order_id: i64,
    pub symbol: String,
    pub side: Side,
    /// Venue status string (`NEW`, `FILLED`, ...); mapped by the broker.
    pub status: String,
    pub last_qty: f64,
    pub last_price: f64,
    pub commission: f64,
    pub transact_time: i64,
}

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Listener for the account's order/fill events.
///
/// Owns one connection and one background thread; the thread is the sole
/// producer into the bounded channel returned by `spawn`. Dropping the
/// handle stops the thread.
pub struct UserStream {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl UserStream {
    pub fn spawn(
        ws_base: &str,
        listen_key: &str,
        capacity: usize,
    ) -> Result<(Self, Receiver<OrderUpdate>), GatewayError> {
        let url = format!("{ws_base}/ws/{listen_key}");
        let socket = open_socket(&url)?;
        let (tx, rx) = mpsc::sync_channel(capacity);
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("user-stream".to_string())
            .spawn(move || {
                run_listener(socket, flag, "UserStream", move |text| {
                    let Some(update) = parse_order_update(text) else {
                        return true;
                    };
                    match tx.try_send(update) {
                        Ok(()) => true,
                        Err(TrySendError::Full(update)) => {
                            // Consumer drains every tick; sustained fullness
                            // means it stopped polling.
                            warn!(
                                "[UserStream] event channel full, dropping update for order {}",
                                update.order_id
                            );
                            true
                        }
                        Err(TrySendError::Disconnected(_)) => false,
                    }
                });
            })
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        Ok((
            Self {
                shutdown,
                handle: Some(handle),
            },
            rx,
        ))
    }
}

impl Drop for UserStream {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Listener for one instrument's kline stream.
///
/// Appends a bar to the sink only when the venue marks the interval closed;
/// open bars are discarded.
pub struct KlineStream {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KlineStream {
    pub fn spawn(
        ws_base: &str,
        symbol: &str,
        interval: &str,
        sink: BarSink,
    ) -> Result<Self, GatewayError> {
        let url = format!(
            "{ws_base}/ws/{}@kline_{interval}",
            symbol.to_lowercase()
        );
        let socket = open_socket(&url)?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let label = format!("KlineStream {symbol}");

        let handle = thread::Builder::new()
            .name(format!("kline-{}", symbol.to_lowercase()))
            .spawn(move || {
                run_listener(socket, flag, &label, move |text| {
                    if let Some(bar) = parse_closed_kline(text) {
                        sink.lock()
                            .expect("bar sink mutex poisoned")
                            .push_back(bar);
                    }
                    true
                });
            })
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }
}

impl Drop for KlineStream {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn open_socket(url: &str) -> Result<Socket, GatewayError> {
    let (socket, _response) =
        connect(url).map_err(|err| GatewayError::Transport(err.to_string()))?;
    // Periodic read timeouts let the loop notice the shutdown flag.
    match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => {
            let _ = stream.set_read_timeout(Some(READ_POLL));
        }
        MaybeTlsStream::NativeTls(stream) => {
            let _ = stream.get_ref().set_read_timeout(Some(READ_POLL));
        }
        _ => {}
    }
    Ok(socket)
}

/// Blocking read loop shared by both listeners. `on_text` returns false to
/// stop the loop.
fn run_listener(
    mut socket: Socket,
    shutdown: Arc<AtomicBool>,
    label: &str,
    mut on_text: impl FnMut(&str) -> bool,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        match socket.read_message() {
            Ok(Message::Text(text)) => {
                if !on_text(&text) {
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                if let Err(err) = socket.write_message(Message::Pong(payload)) {
                    error!("[{label}] pong failed: {err}");
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                warn!("[{label}] stream closed by venue");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                // Read timeout tick; loop back to the shutdown check.
            }
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                warn!("[{label}] connection closed");
                break;
            }
            Err(err) => {
                error!("[{label}] stream error: {err}");
                break;
            }
        }
    }
    let _ = socket.close(None);
    debug!("[{label}] listener stopped");
}

#[derive(Debug, Deserialize)]
struct EventProbe {
    #[serde(rename = "e", default)]
    event: String,
}

#[derive(Debug, Deserialize)]
struct OrderTradeUpdateMsg {
    #[serde(rename = "o")]
    order: OrderTradeUpdateBody,
}

#[derive(Debug, Deserialize)]
struct OrderTradeUpdateBody {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "i")]
    order_id: i64,
    #[serde(rename = "S")]
    side: String,
    #[serde(rename = "X")]
    status: String,
    #[serde(rename = "l")]
    last_qty: String,
    #[serde(rename = "L")]
    last_price: String,
    #[serde(rename = "n", default)]
    commission: Option<String>,
    #[serde(rename = "T", default)]
    transact_time: i64,
}

#[derive(Debug, Deserialize)]
struct KlineMsg {
    #[serde(rename = "k")]
    kline: KlineBody,
}

#[derive(Debug, Deserialize)]
struct KlineBody {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "x")]
    is_closed: bool,
}

/// Parses a user-stream frame into an `OrderUpdate`. Frames of any other
/// event type yield `None`.
pub fn parse_order_update(text: &str) -> Option<OrderUpdate> {
    let probe: EventProbe = serde_json::from_str(text).ok()?;
    if probe.event != "ORDER_TRADE_UPDATE" {
        if probe.event == "error" {
            error!("[UserStream] venue error frame: {text}");
        }
        return None;
    }
    let msg: OrderTradeUpdateMsg = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(err) => {
            warn!("[UserStream] malformed order update: {err}");
            return None;
        }
    };
    let body = msg.order;
    Some(OrderUpdate {
        order_id: body.order_id,
        symbol: body.symbol,
        side: Side::from_venue(&body.side),
        status: body.status,
        last_qty: body.last_qty.parse().unwrap_or(0.0),
        last_price: body.last_price.parse().unwrap_or(0.0),
        commission: body
            .commission
            .as_deref()
            .and_then(|n| n.parse().ok())
            .unwrap_or(0.0),
        transact_time: body.transact_time,
    })
}

/// Parses a kline frame and returns the bar only if the interval is closed.
pub fn parse_closed_kline(text: &str) -> Option<Bar> {
    let probe: EventProbe = serde_json::from_str(text).ok()?;
    if !probe.event.contains("kline") {
        if probe.event == "error" {
            error!("[KlineStream] venue error frame: {text}");
        }
        return None;
    }
    let msg: KlineMsg = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(err) => {
            warn!("[KlineStream] malformed kline: {err}");
            return None;
        }
    };
    let k = msg.kline;
    if !k.is_closed {
        return None;
    }
    Some(Bar::new(
        k.open_time,
        k.open.parse().unwrap_or(0.0),
        k.high.parse().unwrap_or(0.0),
        k.low.parse().unwrap_or(0.0),
        k.close.parse().unwrap_or(0.0),
        k.volume.parse().unwrap_or(0.0),
    ))
}
