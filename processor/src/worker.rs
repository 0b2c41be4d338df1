//! Async driver around `MarketMachine`.
//!
//! One task per market. The task is the only writer of its machine; it waits
//! on the inbound queue, the window ticker, cancellation, and (alert mode with
//! a re-arm delay) its own re-arm timer, all in one `select!`.

use std::sync::Arc;

use chrono::Utc;
use market::{TradeBatch, WindowTick};
use tokio::sync::{mpsc::Receiver, watch};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::event::{EventKind, MarketEvent};
use crate::machine::MarketMachine;
use crate::sink::EventSink;
use crate::snapshot::ProcessorSnapshot;

pub struct MarketProcessor {
    machine: MarketMachine,
    inbound: Receiver<TradeBatch>,
    ticks: Receiver<WindowTick>,
    sink: Arc<dyn EventSink>,
    snapshot_tx: watch::Sender<ProcessorSnapshot>,
}

impl MarketProcessor {
    /// Returns the processor and a receiver for its published snapshots.
    pub fn new(
        machine: MarketMachine,
        inbound: Receiver<TradeBatch>,
        ticks: Receiver<WindowTick>,
        sink: Arc<dyn EventSink>,
    ) -> (Self, watch::Receiver<ProcessorSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());
        (
            Self {
                machine,
                inbound,
                ticks,
                sink,
                snapshot_tx,
            },
            snapshot_rx,
        )
    }

    /// Event loop. Returns on cancellation or when every sender is gone.
    ///
    /// Batches still queued at cancellation are discarded.
    pub async fn run(mut self, cancel: CancellationToken) {
        let span = common::logger::market_span("processor", self.machine.market().as_str());

        async move {
            info!(
                mode = ?self.machine.config().mode,
                threshold = self.machine.threshold(),
                "processor started"
            );

            let rearm_after = self.machine.config().alert_rearm;
            let rearm = sleep_until(Instant::now());
            tokio::pin!(rearm);
            let mut rearm_pending = false;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("processor cancelled");
                        break;
                    }

                    maybe_batch = self.inbound.recv() => {
                        let Some(batch) = maybe_batch else {
                            warn!("inbound queue closed");
                            break;
                        };

                        let events = self.machine.on_batch(&batch, Utc::now());
                        let alerted = events
                            .iter()
                            .any(|e| matches!(e.kind, EventKind::AlertFired { .. }));

                        if alerted {
                            if let Some(delay) = rearm_after {
                                rearm.as_mut().reset(Instant::now() + delay);
                                rearm_pending = true;
                            }
                        }

                        self.publish(events).await;
                        self.snapshot_tx.send_replace(self.machine.snapshot());
                    }

                    Some(tick) = self.ticks.recv() => {
                        self.machine.on_tick(tick);
                        self.snapshot_tx.send_replace(self.machine.snapshot());
                    }

                    () = &mut rearm, if rearm_pending => {
                        rearm_pending = false;
                        self.machine.rearm_alert();
                        self.snapshot_tx.send_replace(self.machine.snapshot());
                    }
                }
            }

            let s = self.machine.state();
            info!(
                opened = s.open_count,
                succeeded = s.success_count,
                alerts = s.alert_count,
                "processor stopped"
            );
        }
        .instrument(span)
        .await
    }

    async fn publish(&self, events: Vec<MarketEvent>) {
        for event in events {
            let kind = event.kind.name();
            if let Err(e) = self.sink.publish(event).await {
                warn!(event = kind, error = ?e, "event sink rejected event");
            } else {
                debug!(event = kind, "event published");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use market::{OrderType, Trade, WindowStats};
    use tokio::sync::mpsc;

    use crate::config::{ProcessorConfig, ProcessorMode};
    use crate::sink::ChannelSink;

    struct Rig {
        batches: mpsc::Sender<TradeBatch>,
        ticks: mpsc::Sender<WindowTick>,
        events: mpsc::Receiver<MarketEvent>,
        snapshots: watch::Receiver<ProcessorSnapshot>,
        cancel: CancellationToken,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn(config: ProcessorConfig) -> Rig {
        let (batches, inbound) = mpsc::channel(16);
        let (ticks, tick_rx) = mpsc::channel(1);
        let (event_tx, events) = mpsc::channel(16);

        let machine = MarketMachine::new("BTC-ETH".into(), WindowStats::new(10.0), config);
        let (processor, snapshots) =
            MarketProcessor::new(machine, inbound, tick_rx, Arc::new(ChannelSink::new(event_tx)));

        let cancel = CancellationToken::new();
        let task = tokio::spawn(processor.run(cancel.clone()));

        Rig {
            batches,
            ticks,
            events,
            snapshots,
            cancel,
            task,
        }
    }

    fn fresh(rate: f64, price: f64) -> Trade {
        Trade::new(rate, price, OrderType::Buy, common::time::now_secs())
    }

    fn tick() -> WindowTick {
        WindowTick {
            boundary: Utc::now(),
        }
    }

    async fn settled(rig: &mut Rig) -> ProcessorSnapshot {
        rig.snapshots.changed().await.unwrap();
        rig.snapshots.borrow_and_update().clone()
    }

    #[tokio::test]
    async fn publishes_buy_then_sell() {
        let mut rig = spawn(ProcessorConfig::for_mode(ProcessorMode::Trading));

        rig.batches
            .send(TradeBatch::new("BTC-ETH", vec![fresh(100.0, 1.0)]))
            .await
            .unwrap();
        settled(&mut rig).await;
        rig.ticks.send(tick()).await.unwrap();
        settled(&mut rig).await;

        let surge = (1..=10).map(|i| fresh(100.0 + i as f64, 8.0)).collect();
        rig.batches.send(TradeBatch::new("BTC-ETH", surge)).await.unwrap();
        rig.batches
            .send(TradeBatch::new("BTC-ETH", vec![fresh(114.0, 1.0)]))
            .await
            .unwrap();

        assert_eq!(rig.events.recv().await.unwrap().kind.name(), "buy_opened");
        assert_eq!(rig.events.recv().await.unwrap().kind.name(), "sell_closed");

        rig.cancel.cancel();
        rig.task.await.unwrap();

        let last = rig.snapshots.borrow().clone();
        assert_eq!(last.success_count, 1);
        assert!(last.suppressed);
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let rig = spawn(ProcessorConfig::default());

        rig.cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), rig.task)
            .await
            .expect("processor must stop promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn dropping_router_side_stops_the_loop() {
        let rig = spawn(ProcessorConfig::default());

        drop(rig.batches);

        tokio::time::timeout(Duration::from_secs(1), rig.task)
            .await
            .expect("closed queue must end the processor")
            .unwrap();
    }

    #[tokio::test]
    async fn sink_failure_does_not_stop_processor() {
        let mut rig = spawn(ProcessorConfig::for_mode(ProcessorMode::AlertOnly));
        let Rig { events, .. } = &mut rig;
        events.close();

        rig.batches
            .send(TradeBatch::new("BTC-ETH", vec![fresh(1.0, 60.0)]))
            .await
            .unwrap();
        let snap = settled(&mut rig).await;
        assert_eq!(snap.alert_count, 1);

        rig.batches
            .send(TradeBatch::new("BTC-ETH", vec![fresh(1.0, 1.0)]))
            .await
            .unwrap();
        let snap = settled(&mut rig).await;
        assert_eq!(snap.accumulated_volume, 61.0);
        assert!(!rig.task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn alert_rearms_from_in_loop_timer() {
        let mut rig = spawn(ProcessorConfig {
            alert_rearm: Some(Duration::from_secs(3_600)),
            ..ProcessorConfig::for_mode(ProcessorMode::AlertOnly)
        });

        rig.batches
            .send(TradeBatch::new("BTC-ETH", vec![fresh(1.0, 60.0)]))
            .await
            .unwrap();
        assert_eq!(rig.events.recv().await.unwrap().kind.name(), "alert_fired");
        let snap = settled(&mut rig).await;
        assert!(!snap.alert_armed);

        // Virtual clock jumps to the re-arm deadline once the runtime idles.
        let snap = settled(&mut rig).await;
        assert!(snap.alert_armed);
    }
}
