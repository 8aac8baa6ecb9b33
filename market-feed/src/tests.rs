use std::sync::{Arc, Mutex};

use venue_api::{Bar, DataFeed, FeedState};
use venue_gateway::{BarSink, GatewayError, Timeframe};

use crate::config::FeedConfig;
use crate::feed::{BarFeed, FeedNotice};
use crate::source::{FeedError, HistorySource, LiveSubscriber};

const MINUTE: i64 = 60_000;

fn bar(index: i64) -> Bar {
    let open_time = 1_690_000_000_000 + index * MINUTE;
    Bar::new(open_time, 100.0 + index as f64, 101.0, 99.0, 100.5, 10.0)
}

struct StubHistory {
    bars: Vec<Bar>,
    fail: bool,
}

impl HistorySource for StubHistory {
    fn klines(&self, _symbol: &str, _interval: &str, _start_ms: i64) -> Result<Vec<Bar>, FeedError> {
        if self.fail {
            return Err(FeedError::History(GatewayError::Transport(
                "connection reset".to_string(),
            )));
        }
        Ok(self.bars.clone())
    }
}

/// Captures the sink handed over at subscription so the test can play the
/// listener thread's role.
#[derive(Default)]
struct StubSubscriber {
    sink: Arc<Mutex<Option<BarSink>>>,
    fail: bool,
    subscriptions: Arc<Mutex<u32>>,
}

impl StubSubscriber {
    fn handle(&self) -> (Arc<Mutex<Option<BarSink>>>, Arc<Mutex<u32>>) {
        (Arc::clone(&self.sink), Arc::clone(&self.subscriptions))
    }
}

impl LiveSubscriber for StubSubscriber {
    fn subscribe(&mut self, _symbol: &str, _interval: &str, sink: BarSink) -> Result<(), FeedError> {
        *self.subscriptions.lock().unwrap() += 1;
        if self.fail {
            return Err(FeedError::Subscribe("no route to host".to_string()));
        }
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }
}

fn config() -> FeedConfig {
    FeedConfig::new("BTCUSDT", Timeframe::Minutes, 1)
}

fn push_live(sink: &Arc<Mutex<Option<BarSink>>>, bar: Bar) {
    let guard = sink.lock().unwrap();
    let sink = guard.as_ref().expect("not subscribed");
    sink.lock().unwrap().push_back(bar);
}

#[test]
fn test_backfill_drop_newest_then_live_once() {
    let history = StubHistory {
        bars: (0..500).map(bar).collect(),
        fail: false,
    };
    let subscriber = StubSubscriber::default();
    let (_sink, subscriptions) = subscriber.handle();

    let mut feed = BarFeed::new(config().with_start_time(1_690_000_000_000), history, subscriber);
    feed.start();
    assert_eq!(feed.state(), FeedState::Backfilling);
    assert_eq!(feed.next_notice(), Some(FeedNotice::Delayed));

    // 500 fetched, newest dropped.
    let mut pulled = 0;
    while let Some(_bar) = feed.pull() {
        pulled += 1;
        assert_eq!(feed.state(), FeedState::Backfilling);
    }
    assert_eq!(pulled, 499);

    // The empty pull performed the transition.
    assert_eq!(feed.state(), FeedState::Live);
    assert_eq!(feed.next_notice(), Some(FeedNotice::Live));
    assert_eq!(*subscriptions.lock().unwrap(), 1);

    // Draining while live never re-subscribes.
    assert!(feed.pull().is_none());
    assert_eq!(*subscriptions.lock().unwrap(), 1);
}

#[test]
fn test_live_bars_arrive_through_sink() {
    let history = StubHistory {
        bars: vec![],
        fail: false,
    };
    let subscriber = StubSubscriber::default();
    let (sink, _) = subscriber.handle();

    let mut feed = BarFeed::new(config(), history, subscriber);
    feed.start();
    assert_eq!(feed.state(), FeedState::Live);

    assert!(feed.pull().is_none()); // no data yet, not an error

    push_live(&sink, bar(1));
    let got = feed.pull().unwrap();
    assert_eq!(got.open_time, bar(1).open_time);
    assert!(feed.pull().is_none());
}

#[test]
fn test_open_time_watermark_filters_stream_overlap() {
    let history = StubHistory {
        bars: vec![bar(0), bar(1), bar(2)],
        fail: false,
    };
    let subscriber = StubSubscriber::default();
    let (sink, _) = subscriber.handle();

    let mut feed = BarFeed::new(
        config().with_start_time(1_690_000_000_000),
        history,
        subscriber,
    );
    feed.start();

    // drop_newest leaves bars 0 and 1.
    assert_eq!(feed.pull().unwrap().open_time, bar(0).open_time);
    assert_eq!(feed.pull().unwrap().open_time, bar(1).open_time);
    assert!(feed.pull().is_none()); // transition tick

    // The stream replays bar 1 (already seen) before bar 2.
    push_live(&sink, bar(1));
    push_live(&sink, bar(2));

    let got = feed.pull().unwrap();
    assert_eq!(got.open_time, bar(2).open_time);
    assert!(feed.pull().is_none());
}

#[test]
fn test_unsupported_timeframe_terminates() {
    let history = StubHistory {
        bars: vec![bar(0)],
        fail: false,
    };
    let mut feed = BarFeed::new(
        FeedConfig::new("BTCUSDT", Timeframe::Minutes, 7),
        history,
        StubSubscriber::default(),
    );
    feed.start();

    assert_eq!(feed.state(), FeedState::Terminated);
    assert_eq!(feed.next_notice(), Some(FeedNotice::UnsupportedTimeframe));
    assert!(feed.pull().is_none());
}

#[test]
fn test_history_failure_terminates() {
    let history = StubHistory {
        bars: vec![],
        fail: true,
    };
    let mut feed = BarFeed::new(
        config().with_start_time(1_690_000_000_000),
        history,
        StubSubscriber::default(),
    );
    feed.start();

    assert_eq!(feed.state(), FeedState::Terminated);
    assert_eq!(feed.next_notice(), Some(FeedNotice::Delayed));
    assert_eq!(feed.next_notice(), Some(FeedNotice::HistoryFailed));
}

#[test]
fn test_subscribe_failure_terminates() {
    let history = StubHistory {
        bars: vec![bar(0), bar(1)],
        fail: false,
    };
    let subscriber = StubSubscriber {
        fail: true,
        ..Default::default()
    };

    let mut feed = BarFeed::new(
        config().with_start_time(1_690_000_000_000),
        history,
        subscriber,
    );
    feed.start();

    while feed.pull().is_some() {}
    assert_eq!(feed.state(), FeedState::Terminated);
    let notices: Vec<_> = std::iter::from_fn(|| feed.next_notice()).collect();
    assert!(notices.contains(&FeedNotice::SubscribeFailed));
}

#[test]
fn test_replay_only_terminates_after_drain() {
    let history = StubHistory {
        bars: (0..10).map(bar).collect(),
        fail: false,
    };
    let mut feed = BarFeed::new(
        config()
            .with_start_time(1_690_000_000_000)
            .with_live_bars(false),
        history,
        StubSubscriber::default(),
    );
    feed.start();

    let mut pulled = 0;
    while feed.pull().is_some() {
        pulled += 1;
    }
    assert_eq!(pulled, 9);
    assert_eq!(feed.state(), FeedState::Terminated);
}

#[test]
fn test_open_times_strictly_increase_across_seam() {
    let history = StubHistory {
        bars: (0..5).map(bar).collect(),
        fail: false,
    };
    let subscriber = StubSubscriber::default();
    let (sink, _) = subscriber.handle();

    let mut feed = BarFeed::new(
        config().with_start_time(1_690_000_000_000),
        history,
        subscriber,
    );
    feed.start();

    let mut seen = Vec::new();
    while let Some(bar) = feed.pull() {
        seen.push(bar.open_time);
    }
    push_live(&sink, bar(3)); // stale duplicate
    push_live(&sink, bar(4));
    push_live(&sink, bar(5));
    while let Some(bar) = feed.pull() {
        seen.push(bar.open_time);
    }

    for pair in seen.windows(2) {
        assert!(pair[1] > pair[0], "open times must strictly increase");
    }
    assert_eq!(seen.len(), 6); // 4 backfill + bars 4 and 5
}
