//! Startup wiring: one processor task and queue per eligible market.
//!
//! `initialize` runs exactly once. The `Registry` it returns is never
//! mutated afterwards, so the router reads it without locking.

use std::collections::HashMap;
use std::sync::Arc;

use market::{AlignedTicker, MarketKey, StatsTable, TradeBatch};
use processor::{
    EventSink, MarketMachine, MarketProcessor, ProcessorConfig, ProcessorError, ProcessorSnapshot,
};
use tokio::sync::{
    mpsc::{self, Sender},
    watch,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::RouteError;

/// Router-side view of one processor.
#[derive(Clone)]
pub struct Handle {
    market: MarketKey,
    tx: Sender<TradeBatch>,
    snapshot: watch::Receiver<ProcessorSnapshot>,
    cancel: CancellationToken,
}

impl Handle {
    pub fn market(&self) -> &MarketKey {
        &self.market
    }

    /// Pushes a batch, waiting while the queue is full.
    pub async fn deliver(&self, batch: TradeBatch) -> Result<(), RouteError> {
        self.tx
            .send(batch)
            .await
            .map_err(|_| RouteError::ProcessorClosed(self.market.clone()))
    }

    /// Latest state published by the processor.
    pub fn snapshot(&self) -> ProcessorSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every state change of this processor.
    pub fn subscribe_snapshots(&self) -> watch::Receiver<ProcessorSnapshot> {
        self.snapshot.clone()
    }

    /// Free slots in the inbound queue.
    pub fn available_capacity(&self) -> usize {
        self.tx.capacity()
    }

    /// Stops this processor only; siblings keep running.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Immutable `MarketKey -> Handle` table.
#[derive(Clone, Default)]
pub struct Registry {
    routes: HashMap<MarketKey, Handle>,
}

impl Registry {
    pub fn get(&self, market: &str) -> Option<&Handle> {
        self.routes.get(market)
    }

    pub fn contains(&self, market: &str) -> bool {
        self.routes.contains_key(market)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Snapshot of every processor, ordered by market.
    pub fn snapshots(&self) -> Vec<ProcessorSnapshot> {
        let mut out: Vec<_> = self.routes.values().map(Handle::snapshot).collect();
        out.sort_by(|a, b| a.market.cmp(&b.market));
        out
    }
}

/// Owns the processor tasks and the shared cancellation token.
pub struct Supervisor {
    cancel: CancellationToken,
    tasks: Vec<(MarketKey, JoinHandle<()>)>,
}

impl Supervisor {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancels every processor and waits for them. A panicked processor is
    /// reported and does not prevent the others from being joined.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        for (market, task) in self.tasks {
            match task.await {
                Ok(()) => {}
                Err(e) if e.is_panic() => {
                    error!(component = "supervisor", %market, "processor panicked");
                }
                Err(e) => {
                    warn!(component = "supervisor", %market, error = %e, "processor task aborted");
                }
            }
        }

        info!(component = "supervisor", "all processors stopped");
    }
}

/// Creates one processor per configured market that has stats.
///
/// Markets without stats, and repeated keys, are logged and skipped.
/// Every processor subscribes to `ticker`, so this must run before the
/// ticker is spawned. Must be called inside a Tokio runtime.
pub fn initialize(
    markets: &[MarketKey],
    stats: &StatsTable,
    config: &ProcessorConfig,
    ticker: &mut AlignedTicker,
    sink: Arc<dyn EventSink>,
    shutdown: &CancellationToken,
) -> Result<(Registry, Supervisor), ProcessorError> {
    config.validate()?;

    let cancel = shutdown.child_token();
    let mut routes = HashMap::with_capacity(markets.len());
    let mut tasks = Vec::with_capacity(markets.len());

    for market in markets {
        if routes.contains_key(market) {
            warn!(component = "registry", %market, "duplicate market in configuration; ignored");
            continue;
        }

        let Some(window_stats) = stats.get(market.as_str()) else {
            warn!(
                component = "registry",
                event = "missing_stats",
                %market,
                "no historical stats for market; excluded"
            );
            continue;
        };

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let ticks = ticker.subscribe();
        let machine = MarketMachine::new(market.clone(), *window_stats, config.clone());
        let (processor, snapshot) = MarketProcessor::new(machine, rx, ticks, sink.clone());

        let processor_cancel = cancel.child_token();
        let task = tokio::spawn(processor.run(processor_cancel.clone()));

        routes.insert(
            market.clone(),
            Handle {
                market: market.clone(),
                tx,
                snapshot,
                cancel: processor_cancel,
            },
        );
        tasks.push((market.clone(), task));
    }

    info!(
        component = "registry",
        configured = markets.len(),
        active = routes.len(),
        mode = ?config.mode,
        "processors started"
    );

    Ok((Registry { routes }, Supervisor { cancel, tasks }))
}
