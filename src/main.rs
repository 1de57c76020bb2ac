//! Application entry: wires the stream ingestor, the scan-cycle
//! scheduler, and the creator-monitor sweep onto a shared `Store` and
//! runs them concurrently until the process receives a shutdown signal.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::{watch, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

use early_signal_detector::clock::SystemClock;
use early_signal_detector::config::Config;
use early_signal_detector::ingestor::source::StreamTransport;
use early_signal_detector::ingestor::wss::TungsteniteTransport;
use early_signal_detector::ingestor::{IngestorRunner, SubscriptionSnapshot, WorkQueue};
use early_signal_detector::notifier::{LoggingNotifier, Notifier, WebhookNotifier};
use early_signal_detector::providers::chain_rpc::HttpChainRpc;
use early_signal_detector::providers::market_data::HttpMarketDataProvider;
use early_signal_detector::providers::ChainRpc;
use early_signal_detector::scheduler::Scheduler;
use early_signal_detector::store::memory_store::MemoryStore;
#[cfg(feature = "sqlite_store")]
use early_signal_detector::store::sqlite_store::SqliteStore;
use early_signal_detector::store::Store;

#[derive(Parser, Debug)]
#[command(about = "Early signal detector: scores pump.fun-style launches for instability and smart-wallet activity")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();
    let cfg = Config::load_from(&args.config);
    info!(scan_interval_sec = cfg.scan_interval_sec, stream_url = %cfg.stream_url, "loaded config");

    let clock = Arc::new(SystemClock);

    let store: Arc<dyn Store> = match &cfg.store_url {
        #[cfg(feature = "sqlite_store")]
        Some(url) => Arc::new(SqliteStore::connect(url).await?),
        #[cfg(not(feature = "sqlite_store"))]
        Some(_) => {
            anyhow::bail!("store_url is set but this binary was built without the sqlite_store feature");
        }
        None => Arc::new(MemoryStore::new()),
    };

    let market_data = Arc::new(HttpMarketDataProvider::new(
        cfg.market_data_url.clone(),
        cfg.price_fallback_url.clone(),
    ));
    let chain_rpc: Arc<dyn ChainRpc> = Arc::new(HttpChainRpc::new(&cfg, clock.clone()));

    let notifier: Arc<dyn Notifier> = match &cfg.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LoggingNotifier),
    };

    let queue = Arc::new(Mutex::new(WorkQueue::new(
        cfg.queue_capacity,
        (cfg.requeue_cooldown_sec * 1000) as i64,
    )));
    let (snapshot_tx, snapshot_rx) = watch::channel(SubscriptionSnapshot::default());

    let scheduler = Arc::new(Scheduler::new(
        market_data.clone(),
        chain_rpc,
        store.clone(),
        clock.clone(),
        notifier,
        queue.clone(),
        snapshot_tx,
        cfg.clone(),
    ));

    let transport: Arc<dyn StreamTransport> = Arc::new(TungsteniteTransport);
    let ingestor = Arc::new(IngestorRunner::new(
        transport,
        store.clone(),
        cfg.clone(),
        clock.clone(),
        queue,
        snapshot_rx,
    ));

    let ingestor_handle = tokio::spawn(async move { ingestor.run().await });
    let scheduler_handle = tokio::spawn(async move { scheduler.run().await });
    let creator_monitor_handle = tokio::spawn(early_signal_detector::creator_monitor::run(
        store,
        market_data,
        clock,
        cfg.clone(),
    ));

    #[cfg(feature = "prometheus_exporter")]
    let metrics_handle = cfg.metrics_pushgateway_url.clone().map(|url| {
        tokio::spawn(early_signal_detector::metrics_exporter::run(
            url,
            cfg.metrics_job_name.clone(),
            cfg.metrics_instance.clone(),
            cfg.metrics_push_interval_sec,
        ))
    });

    tokio::select! {
        _ = ingestor_handle => info!("ingestor task exited"),
        _ = scheduler_handle => info!("scheduler task exited"),
        _ = creator_monitor_handle => info!("creator monitor task exited"),
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
    }

    #[cfg(feature = "prometheus_exporter")]
    if let Some(handle) = metrics_handle {
        handle.abort();
    }

    Ok(())
}
