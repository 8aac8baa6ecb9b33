use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use venue_api::{Broker, OrderStatus, OrderType, Side};

use crate::broker::SignalBroker;
use crate::config::SignalConfig;
use crate::forward::{SignalAction, SignalForwarder, SignalPayload, SignalTransport};

struct StubTransport {
    results: Mutex<VecDeque<Result<(), String>>>,
    sent: Mutex<Vec<SignalPayload>>,
}

impl StubTransport {
    fn accepting() -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn scripted(results: Vec<Result<(), String>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent_actions(&self) -> Vec<SignalAction> {
        self.sent.lock().unwrap().iter().map(|p| p.action).collect()
    }
}

impl SignalTransport for StubTransport {
    fn post(&self, payload: &SignalPayload) -> Result<(), String> {
        self.sent.lock().unwrap().push(payload.clone());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

fn config() -> SignalConfig {
    SignalConfig {
        endpoint: "http://localhost:5678/webhook".to_string(),
        secret: "s3cret".to_string(),
        instrument: "BTCUSDT".to_string(),
        bot_id: "bot-1".to_string(),
        max_lag: "30000".to_string(),
        exchange: "BINANCE".to_string(),
        max_retries: 3,
        attempt_timeout_secs: 5,
        fallback_log: PathBuf::from("signals.log"),
    }
}

fn wait_for_sends(stub: &StubTransport, count: usize) {
    for _ in 0..500 {
        if stub.sent.lock().unwrap().len() >= count {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for {count} forwarded signals");
}

#[test]
fn test_buy_flat_emits_enter_long() {
    let stub = StubTransport::accepting();
    let mut broker = SignalBroker::with_transport(config(), stub.clone());
    broker.observe_price("BTCUSDT", 100.0);

    let order = broker.submit("BTCUSDT", Side::Buy, OrderType::Market, 1.0, None);
    assert_eq!(order.status(), OrderStatus::Filled);
    assert!((order.executed_price() - 100.0).abs() < 1e-9);

    wait_for_sends(&stub, 1);
    assert_eq!(stub.sent_actions(), vec![SignalAction::EnterLong]);
    let sent = stub.sent.lock().unwrap();
    assert_eq!(sent[0].trigger_price, "100");
}

#[test]
fn test_round_trip_long_emits_enter_then_exit() {
    let stub = StubTransport::accepting();
    let mut broker = SignalBroker::with_transport(config(), stub.clone());
    broker.observe_price("BTCUSDT", 100.0);

    broker.submit("BTCUSDT", Side::Buy, OrderType::Market, 1.0, None);
    wait_for_sends(&stub, 1);
    broker.observe_price("BTCUSDT", 110.0);
    broker.submit("BTCUSDT", Side::Sell, OrderType::Market, 1.0, None);

    assert!(broker.position("BTCUSDT").is_flat());
    assert!((broker.ledger().realized_pnl("BTCUSDT") - 10.0).abs() < 1e-9);

    wait_for_sends(&stub, 2);
    assert_eq!(
        stub.sent_actions(),
        vec![SignalAction::EnterLong, SignalAction::ExitLong]
    );
}

#[test]
fn test_short_side_actions_are_symmetric() {
    let stub = StubTransport::accepting();
    let mut broker = SignalBroker::with_transport(config(), stub.clone());
    broker.observe_price("BTCUSDT", 100.0);

    broker.submit("BTCUSDT", Side::Sell, OrderType::Market, 1.0, None);
    wait_for_sends(&stub, 1);
    broker.submit("BTCUSDT", Side::Buy, OrderType::Market, 1.0, None);
    wait_for_sends(&stub, 2);
    assert_eq!(
        stub.sent_actions(),
        vec![SignalAction::EnterShort, SignalAction::ExitShort]
    );
}

#[test]
fn test_submit_without_price_is_rejected() {
    let stub = StubTransport::accepting();
    let mut broker = SignalBroker::with_transport(config(), stub.clone());

    let order = broker.submit("BTCUSDT", Side::Buy, OrderType::Market, 1.0, None);
    assert_eq!(order.status(), OrderStatus::Rejected);
    assert!(broker.position("BTCUSDT").is_flat());
    assert!(stub.sent.lock().unwrap().is_empty());
}

#[test]
fn test_fill_updates_local_ledger() {
    let stub = StubTransport::accepting();
    let mut broker = SignalBroker::with_transport(config(), stub);
    broker.observe_price("BTCUSDT", 100.0);

    broker.submit("BTCUSDT", Side::Buy, OrderType::Market, 2.0, None);
    let position = broker.position("BTCUSDT");
    assert!((position.size() - 2.0).abs() < 1e-9);
    assert!((position.avg_price() - 100.0).abs() < 1e-9);

    // Notification carries the filled snapshot.
    let note = broker.next_notification().unwrap();
    assert_eq!(note.status(), OrderStatus::Filled);
    assert!(broker.next_notification().is_none());
}

#[test]
fn test_payload_shape() {
    let stub = StubTransport::accepting();
    let mut broker = SignalBroker::with_transport(config(), stub.clone());
    broker.observe_price("BTCUSDT", 27123.5);
    broker.submit("BTCUSDT", Side::Buy, OrderType::Market, 1.0, None);

    wait_for_sends(&stub, 1);
    let payload = stub.sent.lock().unwrap()[0].clone();
    let value = serde_json::to_value(&payload).unwrap();

    assert_eq!(value["secret"], "s3cret");
    assert_eq!(value["max_lag"], "30000");
    assert_eq!(value["exchange"], "BINANCE");
    assert_eq!(value["instrument"], "BTCUSDT");
    assert_eq!(value["bot_id"], "bot-1");
    assert_eq!(value["action"], "enter_long");
    assert_eq!(value["trigger_price"], "27123.5");

    let timestamp = value["timestamp"].as_str().unwrap();
    assert_eq!(timestamp.len(), 20);
    assert!(timestamp.ends_with('Z'));
    assert!(timestamp.contains('T'));
}

#[test]
fn test_retry_success_after_transient_failure() {
    let stub = StubTransport::scripted(vec![Err("timeout".to_string()), Ok(())]);
    let forwarder =
        SignalForwarder::with_transport(&config(), stub.clone()).with_backoff_base(Duration::ZERO);

    let delivered = forwarder.deliver(sample_payload());
    assert!(delivered);
    assert_eq!(stub.sent.lock().unwrap().len(), 2);
}

#[test]
fn test_exhausted_retries_fall_back_to_log() {
    let log_path = std::env::temp_dir().join(format!(
        "signal-fallback-{}-{}.log",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
    ));
    let mut cfg = config();
    cfg.fallback_log = log_path.clone();

    let stub = StubTransport::scripted(vec![
        Err("refused".to_string()),
        Err("refused".to_string()),
        Err("refused".to_string()),
    ]);
    let forwarder =
        SignalForwarder::with_transport(&cfg, stub.clone()).with_backoff_base(Duration::ZERO);

    let delivered = forwarder.deliver(sample_payload());
    assert!(!delivered);
    assert_eq!(stub.sent.lock().unwrap().len(), 3);

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let line: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
    assert_eq!(line["action"], "exit_short");
    assert_eq!(line["bot_id"], "bot-1");

    let _ = std::fs::remove_file(&log_path);
}

fn sample_payload() -> SignalPayload {
    SignalPayload {
        secret: "s3cret".to_string(),
        max_lag: "30000".to_string(),
        timestamp: "2026-08-07T00:00:00Z".to_string(),
        trigger_price: "100".to_string(),
        exchange: "BINANCE".to_string(),
        instrument: "BTCUSDT".to_string(),
        action: SignalAction::ExitShort,
        bot_id: "bot-1".to_string(),
    }
}
