use market::{MarketKey, Rate};
use serde::Serialize;

use crate::config::ProcessorMode;
use crate::state::{Position, ProcessorState, TradeRecord};

/// Read-only copy of a processor's state, published after every change.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessorSnapshot {
    pub market: MarketKey,
    pub mode: ProcessorMode,
    pub threshold: f64,
    pub accumulated_volume: f64,
    /// `None` until the first window boundary has been observed.
    pub previous_window_rate: Option<Rate>,
    pub current_window_rate: Rate,
    pub position: Position,
    pub suppressed: bool,
    pub open_count: u64,
    pub success_count: u64,
    pub alert_armed: bool,
    pub alert_count: u64,
    pub stale_trades: u64,
    pub rejected_trades: u64,
    pub windows_seen: u64,
    pub history: Vec<TradeRecord>,
}

impl ProcessorSnapshot {
    pub fn capture(
        market: &MarketKey,
        mode: ProcessorMode,
        threshold: f64,
        state: &ProcessorState,
    ) -> Self {
        Self {
            market: market.clone(),
            mode,
            threshold,
            accumulated_volume: state.accumulated_volume,
            previous_window_rate: (state.previous_window_rate != Rate::UNBOUNDED)
                .then_some(state.previous_window_rate),
            current_window_rate: state.current_window_rate,
            position: state.position.clone(),
            suppressed: state.suppress_until_next_window,
            open_count: state.open_count,
            success_count: state.success_count,
            alert_armed: state.alert_armed,
            alert_count: state.alert_count,
            stale_trades: state.stale_trades,
            rejected_trades: state.rejected_trades,
            windows_seen: state.windows_seen,
            history: state.history.clone(),
        }
    }
}
