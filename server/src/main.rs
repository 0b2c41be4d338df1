use std::sync::Arc;

use anyhow::Context;
use common::logger::init_logger;
use dispatch::{Router, initialize};
use market::AlignedTicker;
use processor::{EventSink, LogSink};
use server::{
    config::AppConfig,
    feed,
    lifecycle::report_exit,
    loader::{load_markets, load_stats},
    sqlite_sink::SqliteEventSink,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

async fn build_sink(cfg: &AppConfig) -> anyhow::Result<Arc<dyn EventSink>> {
    match &cfg.events_db_url {
        Some(url) => {
            let sink = SqliteEventSink::connect(url)
                .await
                .with_context(|| format!("opening event journal {url}"))?;
            info!(component = "main", %url, "journaling events to sqlite");
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(LogSink)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env()?;
    init_logger("signal-engine", cfg.json_logs);

    info!(
        component = "main",
        mode = ?cfg.processor.mode,
        window = ?cfg.window,
        listen = %cfg.listen_addr,
        "starting signal engine"
    );

    let markets = load_markets(&cfg.markets_path).await?;
    let stats = load_stats(&cfg.stats_path).await?;
    let sink = build_sink(&cfg).await?;

    let shutdown = CancellationToken::new();

    // Processors subscribe before the ticker starts so none misses a boundary.
    let mut ticker = AlignedTicker::new(cfg.window);
    let (registry, supervisor) =
        initialize(&markets, &stats, &cfg.processor, &mut ticker, sink, &shutdown)?;
    let ticker_task = ticker.spawn(shutdown.clone());

    let router = Arc::new(Router::new(Arc::new(registry)));

    let listener = TcpListener::bind(cfg.listen_addr)
        .await
        .with_context(|| format!("binding {}", cfg.listen_addr))?;
    let mut feed_task = tokio::spawn(feed::serve(listener, router.clone(), shutdown.clone()));

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("installing ctrl-c handler")?;
            info!(component = "main", "shutdown requested");
        }
        res = &mut feed_task => report_exit("feed", res),
    }

    shutdown.cancel();
    if !feed_task.is_finished() {
        report_exit("feed", feed_task.await);
    }
    supervisor.shutdown().await;
    report_exit("ticker", ticker_task.await.map(Ok));

    let counters = router.counters();
    let snapshots = router.registry().snapshots();
    info!(
        component = "main",
        delivered = counters.delivered.load(std::sync::atomic::Ordering::Relaxed),
        unrouted = counters.unrouted.load(std::sync::atomic::Ordering::Relaxed),
        closed = counters.closed.load(std::sync::atomic::Ordering::Relaxed),
        snapshots = %serde_json::to_string(&snapshots)?,
        "final processor state"
    );

    Ok(())
}
