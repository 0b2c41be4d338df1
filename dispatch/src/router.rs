//! Routes decoded trade batches to the owning market processor.
//!
//! The router runs on the transport's task and never touches processor
//! state: its only side effect is a queue push. A full queue makes `route`
//! wait (backpressure to the feed connection); dropping would silently
//! corrupt the window volume.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use common::logger::warn_if_slow;
use market::TradeBatch;
use tracing::{trace, warn};

use crate::registry::Registry;

/// Pushes blocked longer than this are logged.
const SLOW_PUSH: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Batch queued on the market's processor.
    Delivered,
    /// No processor is registered for the market; batch dropped.
    Unrouted,
    /// The processor has stopped; batch dropped.
    Closed,
}

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct RouterCounters {
    pub delivered: Arc<AtomicU64>,
    pub unrouted: Arc<AtomicU64>,
    pub closed: Arc<AtomicU64>,
}

#[derive(Clone)]
pub struct Router {
    registry: Arc<Registry>,
    counters: RouterCounters,
}

impl Router {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            counters: RouterCounters::default(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn counters(&self) -> &RouterCounters {
        &self.counters
    }

    pub async fn route(&self, batch: TradeBatch) -> RouteOutcome {
        let Some(handle) = self.registry.get(batch.market.as_str()) else {
            self.counters.unrouted.fetch_add(1, Ordering::Relaxed);
            warn!(
                component = "router",
                event = "route_miss",
                market = %batch.market,
                trades = batch.len(),
                "no processor for market; batch dropped"
            );
            return RouteOutcome::Unrouted;
        };

        let trades = batch.len();
        match warn_if_slow("router_push", SLOW_PUSH, handle.deliver(batch)).await {
            Ok(()) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                trace!(component = "router", market = %handle.market(), trades, "batch routed");
                RouteOutcome::Delivered
            }
            Err(e) => {
                self.counters.closed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    component = "router",
                    event = "processor_closed",
                    error = %e,
                    trades,
                    "batch dropped"
                );
                RouteOutcome::Closed
            }
        }
    }
}
