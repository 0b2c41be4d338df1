//! Wall-clock aligned window ticker.
//!
//! Unlike `tokio::time::interval`, which counts from whenever it was created,
//! the ticker fires on clock boundaries: every minute at second zero, or every
//! five minutes when the minute is a multiple of five. It polls the clock once
//! per second and emits the first time it observes a new window index, so a
//! late poll still produces exactly one tick per boundary.
//!
//! Each subscriber gets a channel of depth 1. A tick that finds the buffer
//! full is dropped: the consumer has not processed the previous boundary yet,
//! and a missed tick only delays a window rollover.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::MarketError;

/// Clock source. Injected so tests can drive the ticker with virtual time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const POLL_EVERY: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    /// Fires at second zero of every minute.
    Minute,
    /// Fires at second zero of every minute divisible by five.
    FiveMinutes,
}

impl Alignment {
    pub fn period_secs(self) -> i64 {
        match self {
            Alignment::Minute => 60,
            Alignment::FiveMinutes => 300,
        }
    }

    /// Index of the window containing `unix_secs`.
    pub fn window_index(self, unix_secs: i64) -> i64 {
        unix_secs.div_euclid(self.period_secs())
    }
}

impl FromStr for Alignment {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" | "minute" => Ok(Alignment::Minute),
            "5m" | "five_minutes" => Ok(Alignment::FiveMinutes),
            other => Err(MarketError::UnknownAlignment(other.to_string())),
        }
    }
}

/// Signal that a new window has started at `boundary`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowTick {
    pub boundary: DateTime<Utc>,
}

/// Remembers the last window index seen and reports boundary crossings.
#[derive(Debug)]
struct BoundaryTracker {
    alignment: Alignment,
    last_index: Option<i64>,
}

impl BoundaryTracker {
    fn new(alignment: Alignment) -> Self {
        Self {
            alignment,
            last_index: None,
        }
    }

    /// The first observation only establishes the current window.
    fn observe(&mut self, now: DateTime<Utc>) -> Option<WindowTick> {
        let index = self.alignment.window_index(now.timestamp());

        match self.last_index {
            Some(prev) if index > prev => {
                self.last_index = Some(index);
                let boundary =
                    DateTime::from_timestamp(index * self.alignment.period_secs(), 0)?;
                Some(WindowTick { boundary })
            }
            Some(_) => None,
            None => {
                self.last_index = Some(index);
                None
            }
        }
    }
}

pub struct AlignedTicker {
    alignment: Alignment,
    clock: Clock,
    subscribers: Vec<Sender<WindowTick>>,
}

impl AlignedTicker {
    pub fn new(alignment: Alignment) -> Self {
        Self::with_clock(alignment, Arc::new(Utc::now))
    }

    pub fn with_clock(alignment: Alignment, clock: Clock) -> Self {
        Self {
            alignment,
            clock,
            subscribers: Vec::new(),
        }
    }

    /// Registers a new consumer. Must be called before `spawn`.
    pub fn subscribe(&mut self) -> Receiver<WindowTick> {
        let (tx, rx) = mpsc::channel(1);
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Polling loop. Exits on shutdown or once every subscriber is gone.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut poll = interval(POLL_EVERY);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut tracker = BoundaryTracker::new(self.alignment);

        info!(
            component = "ticker",
            alignment = ?self.alignment,
            subscribers = self.subscribers.len(),
            "aligned ticker started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = poll.tick() => {
                    if let Some(tick) = tracker.observe((self.clock)()) {
                        self.broadcast(tick);
                        if self.subscribers.is_empty() {
                            break;
                        }
                    }
                }
            }
        }

        info!(component = "ticker", alignment = ?self.alignment, "aligned ticker stopped");
    }

    /// Non-blocking fan-out. Full buffers drop the tick, closed ones are pruned.
    fn broadcast(&mut self, tick: WindowTick) {
        self.subscribers.retain(|tx| match tx.try_send(tick) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(
                    component = "ticker",
                    boundary = %tick.boundary,
                    "subscriber still holds previous tick; dropping"
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    #[test]
    fn first_observation_never_fires() {
        let mut t = BoundaryTracker::new(Alignment::Minute);
        assert_eq!(t.observe(at(0, 0, 0)), None);
    }

    #[test]
    fn minute_boundary_fires_once() {
        let mut t = BoundaryTracker::new(Alignment::Minute);
        t.observe(at(0, 0, 58));

        assert_eq!(t.observe(at(0, 0, 59)), None);
        assert_eq!(
            t.observe(at(0, 1, 0)),
            Some(WindowTick {
                boundary: at(0, 1, 0)
            })
        );
        assert_eq!(t.observe(at(0, 1, 0)), None);
        assert_eq!(t.observe(at(0, 1, 1)), None);
    }

    #[test]
    fn late_poll_still_reports_boundary() {
        let mut t = BoundaryTracker::new(Alignment::Minute);
        t.observe(at(0, 0, 59));

        // Poll slipped past second zero.
        assert_eq!(
            t.observe(at(0, 1, 2)),
            Some(WindowTick {
                boundary: at(0, 1, 0)
            })
        );
    }

    #[test]
    fn five_minute_alignment_ignores_other_minutes() {
        let mut t = BoundaryTracker::new(Alignment::FiveMinutes);
        t.observe(at(0, 3, 30));

        assert_eq!(t.observe(at(0, 4, 0)), None);
        assert_eq!(
            t.observe(at(0, 5, 0)),
            Some(WindowTick {
                boundary: at(0, 5, 0)
            })
        );
        assert_eq!(t.observe(at(0, 6, 0)), None);
    }

    #[test]
    fn parses_alignment() {
        assert_eq!("1m".parse::<Alignment>().unwrap(), Alignment::Minute);
        assert_eq!("5m".parse::<Alignment>().unwrap(), Alignment::FiveMinutes);
        assert!("2m".parse::<Alignment>().is_err());
    }

    #[tokio::test]
    async fn full_subscriber_drops_tick_instead_of_blocking() {
        let mut ticker = AlignedTicker::new(Alignment::Minute);
        let mut rx = ticker.subscribe();

        ticker.broadcast(WindowTick {
            boundary: at(0, 1, 0),
        });
        ticker.broadcast(WindowTick {
            boundary: at(0, 2, 0),
        });

        assert_eq!(rx.recv().await.unwrap().boundary, at(0, 1, 0));
        assert!(rx.try_recv().is_err());
        assert_eq!(ticker.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn closed_subscriber_is_pruned() {
        let mut ticker = AlignedTicker::new(Alignment::Minute);
        let rx = ticker.subscribe();
        let _keep = ticker.subscribe();
        drop(rx);

        ticker.broadcast(WindowTick {
            boundary: at(0, 1, 0),
        });

        assert_eq!(ticker.subscriber_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_fires_on_virtual_boundary() {
        let base = at(0, 0, 58);
        let started = tokio::time::Instant::now();
        let clock: Clock = Arc::new(move || {
            let elapsed = tokio::time::Instant::now() - started;
            base + chrono::Duration::from_std(elapsed).unwrap()
        });

        let mut ticker = AlignedTicker::with_clock(Alignment::Minute, clock);
        let mut rx = ticker.subscribe();
        let shutdown = CancellationToken::new();
        let handle = ticker.spawn(shutdown.clone());

        let tick = rx.recv().await.unwrap();
        assert_eq!(tick.boundary, at(0, 1, 0));

        shutdown.cancel();
        handle.await.unwrap();
    }
}
