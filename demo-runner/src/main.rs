//! Minimal runner wiring a feed and a broker together with no strategy
//! attached: pull bars, print them, and optionally fire one market buy so
//! the notification path can be observed end to end.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Deserialize;

use market_feed::{BarFeed, FeedConfig, KlineSubscriber};
use order_broker::LiveBroker;
use signal_broker::{SignalBroker, SignalConfig};
use venue_api::{Broker, DataFeed, FeedState, OrderType, Side};
use venue_gateway::{GatewayConfig, VenueGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Mode {
    /// Execute orders for real through the venue gateway.
    Live,
    /// Simulate fills locally and forward signals to the webhook endpoint.
    Signal,
}

#[derive(Parser, Debug)]
#[command(about = "Poll a market data feed and route demo orders through a broker")]
struct Args {
    /// Path to the TOML runner configuration.
    #[arg(long, default_value = "runner.toml")]
    config: String,

    #[arg(long, value_enum, default_value = "signal")]
    mode: Mode,

    /// Submit one market buy of this size once the feed goes live.
    #[arg(long)]
    buy: Option<f64>,

    /// Poll interval in milliseconds.
    #[arg(long, default_value_t = 500)]
    tick_ms: u64,
}

#[derive(Debug, Deserialize)]
struct RunnerConfig {
    gateway: GatewayConfig,
    feed: FeedConfig,
    signal: Option<SignalConfig>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading {}", args.config))?;
    let config: RunnerConfig = toml::from_str(&raw).context("parsing runner config")?;

    let gateway = Arc::new(VenueGateway::new(config.gateway)?);
    let symbol = config.feed.symbol.clone();

    let mut broker: Box<dyn Broker> = match args.mode {
        Mode::Live => {
            let balance = gateway.refresh_balance()?;
            info!("available balance: {balance}");
            Box::new(LiveBroker::connect(Arc::clone(&gateway))?)
        }
        Mode::Signal => {
            let signal = config
                .signal
                .context("signal mode requires a [signal] section")?;
            Box::new(SignalBroker::new(signal)?)
        }
    };

    let subscriber = KlineSubscriber::for_gateway(&gateway);
    let mut feed = BarFeed::new(config.feed, Arc::clone(&gateway), subscriber);
    feed.start();

    let mut pending_buy = args.buy;
    loop {
        while let Some(bar) = feed.pull() {
            info!(
                "bar {} open={} high={} low={} close={} volume={}",
                bar.open_time, bar.open, bar.high, bar.low, bar.close, bar.volume
            );
            broker.observe_price(&symbol, bar.close);
        }

        while let Some(notice) = feed.next_notice() {
            info!("feed notice: {notice:?}");
        }

        match feed.state() {
            FeedState::Terminated => {
                info!("feed terminated, exiting");
                break;
            }
            FeedState::Live => {
                if let Some(size) = pending_buy.take() {
                    let order = broker.submit(&symbol, Side::Buy, OrderType::Market, size, None);
                    info!("submitted demo buy: {order:?}");
                }
            }
            FeedState::Backfilling => {}
        }

        while let Some(note) = broker.next_notification() {
            info!(
                "order {} -> {:?} filled {} @ {}",
                note.id(),
                note.status(),
                note.executed_qty(),
                note.executed_price()
            );
        }

        let position = broker.position(&symbol);
        if !position.is_flat() {
            info!(
                "position {symbol}: {} @ {}",
                position.size(),
                position.avg_price()
            );
        }

        thread::sleep(Duration::from_millis(args.tick_ms));
    }

    Ok(())
}
