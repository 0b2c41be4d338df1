//! Windowed volume / trend state machine for a single market.
//!
//! The machine is synchronous and owns its `ProcessorState`; the async
//! `MarketProcessor` feeds it batches and ticks one at a time, so no state is
//! ever shared.
//!
//! Trading mode:
//!
//! ```text
//!          volume > avg * mult  &&  rate_now > rate_prev_window
//!   Flat ─────────────────────────────────────────────────────▶ Open
//!    ▲                                                            │
//!    └──────────────── rate > target (suppress until tick) ◀──────┘
//! ```
//!
//! Alert mode fires `AlertFired` once per arming when volume crosses
//! `avg * mult`; it never opens a position.

use chrono::{DateTime, Utc};
use common::time::epoch_secs;
use market::{MarketKey, Rate, TradeBatch, WindowStats, WindowTick};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ProcessorConfig, ProcessorMode};
use crate::event::{EventKind, MarketEvent};
use crate::snapshot::ProcessorSnapshot;
use crate::state::{Position, ProcessorState, TradeRecord};

pub struct MarketMachine {
    market: MarketKey,
    stats: WindowStats,
    config: ProcessorConfig,
    state: ProcessorState,
}

impl MarketMachine {
    pub fn new(market: MarketKey, stats: WindowStats, config: ProcessorConfig) -> Self {
        Self {
            market,
            stats,
            config,
            state: ProcessorState::default(),
        }
    }

    pub fn market(&self) -> &MarketKey {
        &self.market
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn state(&self) -> &ProcessorState {
        &self.state
    }

    pub fn threshold(&self) -> f64 {
        self.stats.threshold(self.config.buy_multiplier)
    }

    pub fn snapshot(&self) -> ProcessorSnapshot {
        ProcessorSnapshot::capture(&self.market, self.config.mode, self.threshold(), &self.state)
    }

    /// Applies one batch and returns the events it produced, in order.
    ///
    /// Empty batches and batches arriving while suppressed leave the state
    /// untouched. Stale or unrepresentable trades are counted and skipped.
    pub fn on_batch(&mut self, batch: &TradeBatch, now: DateTime<Utc>) -> Vec<MarketEvent> {
        if batch.is_empty() {
            return Vec::new();
        }

        if self.state.suppress_until_next_window {
            debug!(market = %self.market, trades = batch.len(), "batch skipped until next window");
            return Vec::new();
        }

        let cutoff = self.config.stale_cutoff(epoch_secs(now));
        let mut events = Vec::new();

        for trade in &batch.trades {
            if !trade.timestamp.is_finite() {
                self.state.rejected_trades += 1;
                debug!(market = %self.market, ts = trade.timestamp, "trade with invalid timestamp rejected");
                continue;
            }

            if trade.timestamp < cutoff {
                self.state.stale_trades += 1;
                debug!(market = %self.market, ts = trade.timestamp, cutoff, "stale trade dropped");
                continue;
            }

            let rate = match Rate::from_f64(trade.rate) {
                Ok(rate) => rate,
                Err(e) => {
                    self.state.rejected_trades += 1;
                    debug!(market = %self.market, error = %e, "trade rejected");
                    continue;
                }
            };

            if !(trade.price.is_finite() && trade.price >= 0.0) {
                self.state.rejected_trades += 1;
                debug!(market = %self.market, price = trade.price, "trade with invalid price rejected");
                continue;
            }

            self.state.accumulated_volume += trade.price;
            self.state.current_window_rate = rate;

            if self.config.mode == ProcessorMode::Trading {
                if let Some(event) = self.try_close(rate, now) {
                    events.push(event);
                    // Rest of the batch falls in the suppressed part of the window.
                    break;
                }
            }
        }

        let closing = match self.config.mode {
            ProcessorMode::Trading => self.try_open(now),
            ProcessorMode::AlertOnly => self.try_alert(now),
        };
        events.extend(closing);

        events
    }

    /// Window boundary: reset volume, lift suppression, roll the trend baseline.
    pub fn on_tick(&mut self, tick: WindowTick) {
        debug!(
            market = %self.market,
            boundary = %tick.boundary,
            volume = self.state.accumulated_volume,
            closing_rate = %self.state.current_window_rate,
            "window closed"
        );

        self.state.accumulated_volume = 0.0;
        self.state.suppress_until_next_window = false;
        // No rate observed yet: the baseline stays unbounded.
        if !self.state.current_window_rate.is_zero() {
            self.state.previous_window_rate = self.state.current_window_rate;
        }
        self.state.windows_seen += 1;

        if self.config.alert_rearm.is_none() {
            self.state.alert_armed = true;
        }
    }

    /// Re-arms a fired alert. Driven by the processor's own timer.
    pub fn rearm_alert(&mut self) {
        if !self.state.alert_armed {
            info!(market = %self.market, "alert re-armed");
        }
        self.state.alert_armed = true;
    }

    fn try_open(&mut self, now: DateTime<Utc>) -> Option<MarketEvent> {
        let state = &self.state;
        if state.position.is_open() || state.suppress_until_next_window {
            return None;
        }

        let threshold = self.threshold();
        let volume = state.accumulated_volume;
        if volume <= threshold {
            return None;
        }

        let entry_rate = state.current_window_rate;
        if entry_rate <= state.previous_window_rate || entry_rate.is_zero() {
            return None;
        }

        let target_rate = entry_rate.with_markup_bps(self.config.target_markup_bps)?;
        if target_rate <= entry_rate {
            // Rate too small for the markup to register in fixed point.
            return None;
        }

        let record_id = Uuid::new_v4();
        self.state.history.push(TradeRecord {
            id: record_id,
            entry_rate,
            target_rate,
            opened_at: now,
            closed_at: None,
            exit_rate: None,
        });
        self.state.position = Position::Open {
            entry_rate,
            target_rate,
            entry_time: now,
            record: self.state.history.len() - 1,
        };
        self.state.open_count += 1;

        info!(
            market = %self.market,
            %entry_rate,
            %target_rate,
            volume,
            threshold,
            "simulated buy opened"
        );

        Some(MarketEvent {
            market: self.market.clone(),
            at: now,
            kind: EventKind::BuyOpened {
                record_id,
                entry_rate,
                target_rate,
                volume,
                threshold,
            },
        })
    }

    fn try_close(&mut self, rate: Rate, now: DateTime<Utc>) -> Option<MarketEvent> {
        let Position::Open {
            entry_rate,
            target_rate,
            record,
            ..
        } = self.state.position
        else {
            return None;
        };

        if rate <= target_rate {
            return None;
        }

        let record_id = match self.state.history.get_mut(record) {
            Some(r) => {
                r.closed_at = Some(now);
                r.exit_rate = Some(rate);
                r.id
            }
            None => Uuid::nil(),
        };

        self.state.position = Position::Flat;
        self.state.success_count += 1;
        self.state.suppress_until_next_window = true;

        info!(
            market = %self.market,
            %entry_rate,
            exit_rate = %rate,
            successes = self.state.success_count,
            "simulated sell closed"
        );

        Some(MarketEvent {
            market: self.market.clone(),
            at: now,
            kind: EventKind::SellClosed {
                record_id,
                entry_rate,
                exit_rate: rate,
            },
        })
    }

    fn try_alert(&mut self, now: DateTime<Utc>) -> Option<MarketEvent> {
        if !self.state.alert_armed {
            return None;
        }

        let threshold = self.threshold();
        let volume = self.state.accumulated_volume;
        if volume <= threshold {
            return None;
        }

        self.state.alert_armed = false;
        self.state.alert_count += 1;

        info!(market = %self.market, volume, threshold, "market passed average volume threshold");

        Some(MarketEvent {
            market: self.market.clone(),
            at: now,
            kind: EventKind::AlertFired { volume, threshold },
        })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::TimeZone;
    use market::{OrderType, Trade};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap()
    }

    fn machine() -> MarketMachine {
        // Threshold far above anything generated: no transitions interfere.
        MarketMachine::new(
            "BTC-ETH".into(),
            WindowStats::new(1e12),
            ProcessorConfig::default(),
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]
        #[test]
        fn volume_is_independent_of_batching(
            trades in prop::collection::vec((1u32..10_000, 0u32..1_000, any::<bool>()), 0..60),
            cuts in prop::collection::vec(0usize..60, 0..10),
        ) {
            let now_secs = now().timestamp() as f64;
            let trades: Vec<Trade> = trades
                .into_iter()
                .map(|(r, p, stale)| {
                    let ts = if stale { now_secs - 60.0 } else { now_secs };
                    Trade::new(f64::from(r) / 100.0, f64::from(p) / 8.0, OrderType::Buy, ts)
                })
                .collect();

            let expected: f64 = trades
                .iter()
                .filter(|t| t.timestamp >= now_secs - 5.0)
                .map(|t| t.price)
                .sum();

            // Single batch.
            let mut whole = machine();
            whole.on_batch(&TradeBatch::new("BTC-ETH", trades.clone()), now());

            // Same trades split at arbitrary points.
            let mut bounds: Vec<usize> = cuts.into_iter().map(|c| c.min(trades.len())).collect();
            bounds.push(0);
            bounds.push(trades.len());
            bounds.sort_unstable();
            bounds.dedup();

            let mut split = machine();
            for w in bounds.windows(2) {
                split.on_batch(&TradeBatch::new("BTC-ETH", trades[w[0]..w[1]].to_vec()), now());
            }

            prop_assert!((whole.state().accumulated_volume - expected).abs() < 1e-6);
            prop_assert!((split.state().accumulated_volume - expected).abs() < 1e-6);
            prop_assert_eq!(whole.state().current_window_rate, split.state().current_window_rate);
        }

        #[test]
        fn tick_always_resets_and_rolls_baseline(
            rates in prop::collection::vec(1u32..100_000, 1..20),
        ) {
            let now_secs = now().timestamp() as f64;
            let mut m = machine();
            let trades = rates
                .iter()
                .map(|r| Trade::new(f64::from(*r) / 100.0, 1.0, OrderType::Sell, now_secs))
                .collect();
            m.on_batch(&TradeBatch::new("BTC-ETH", trades), now());
            let closing = m.state().current_window_rate;

            m.on_tick(WindowTick { boundary: now() });

            prop_assert_eq!(m.state().accumulated_volume, 0.0);
            prop_assert_eq!(m.state().previous_window_rate, closing);
        }
    }
}
