use async_trait::async_trait;
use tokio::sync::mpsc::Sender;
use tracing::info;

use crate::error::ProcessorError;
use crate::event::{EventKind, MarketEvent};

/// Destination for domain events.
///
/// Implementations may be slow (indexers, databases); a processor awaits
/// each publish in order. Errors are logged by the caller and never stop
/// the processor.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn publish(&self, event: MarketEvent) -> anyhow::Result<()>;
}

/// Forwards events into an mpsc channel for in-process subscribers.
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<MarketEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<MarketEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn publish(&self, event: MarketEvent) -> anyhow::Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ProcessorError::SinkClosed)?;
        Ok(())
    }
}

/// Writes every event to the log.
#[derive(Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn publish(&self, event: MarketEvent) -> anyhow::Result<()> {
        match &event.kind {
            EventKind::BuyOpened {
                entry_rate,
                target_rate,
                ..
            } => info!(
                event = event.kind.name(),
                market = %event.market,
                %entry_rate,
                %target_rate,
                "market event"
            ),
            EventKind::SellClosed {
                entry_rate,
                exit_rate,
                ..
            } => info!(
                event = event.kind.name(),
                market = %event.market,
                %entry_rate,
                %exit_rate,
                "market event"
            ),
            EventKind::AlertFired { volume, threshold } => info!(
                event = event.kind.name(),
                market = %event.market,
                volume,
                threshold,
                "market event"
            ),
        }
        Ok(())
    }
}
