use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use kestrel::KestrelError;
use kestrel::config::fetch_config;
use kestrel::runner::{FeedEvent, Runner, RecurringTask};
use kestrel::session::TradingSession;
use kestrel::store::Store;
use kestrel::websocket::{authorize, connect, process_messages, run_writer};

/// Default path of the persistent session store.
const STORE_PATH: &str = "kestrel-store.json";

/// Keep-alive ping interval.
const KEEP_ALIVE: Duration = Duration::from_secs(25);

#[tokio::main]
async fn main() -> Result<(), KestrelError> {
    // Initialize tracing subscriber for logging output.
    tracing_subscriber::fmt::init();

    let app_config = fetch_config()?;
    let store = Store::new(STORE_PATH);
    let session = TradingSession::from_store(store.load()?);
    let auto_interval = Duration::from_millis(session.settings.auto_interval_ms);

    let (mut write, mut read) = connect(&app_config.endpoint()).await?;
    match &app_config.api_token {
        Some(token) => authorize(&mut write, token).await?,
        None => {
            warn!("No DERIV_API_TOKEN set - streaming without authorization");
        }
    }

    // One channel in (broker events + timers), one channel out (requests).
    let (event_tx, event_rx) = mpsc::channel::<FeedEvent>(256);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let writer = tokio::spawn(async move { run_writer(write, outbound_rx).await });
    let reader_tx = event_tx.clone();
    let reader = tokio::spawn(async move { process_messages(&mut read, reader_tx).await });

    let auto_trader = RecurringTask::start(auto_interval, event_tx.clone(), || FeedEvent::AutoCheck);
    let keep_alive = RecurringTask::start(KEEP_ALIVE, event_tx.clone(), || FeedEvent::KeepAlive);

    // Ctrl-C requests a clean shutdown through the same event channel.
    let shutdown_tx = event_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(FeedEvent::Shutdown).await;
        }
    });
    drop(event_tx);

    let runner = Runner::new(session, outbound_tx, Some(store));
    let session = runner.run(event_rx).await;
    info!(
        trades = session.trades_made(),
        "Runner stopped - session persisted"
    );

    auto_trader.shutdown().await;
    keep_alive.shutdown().await;
    reader.abort();
    writer.abort();

    Ok(())
}
