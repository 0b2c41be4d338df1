use chrono::{DateTime, Utc};
use market::Rate;
use serde::Serialize;
use uuid::Uuid;

/// Simulated position.
///
/// Invariant: `Open` implies `entry_rate > 0` and `target_rate > entry_rate`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Position {
    Flat,
    Open {
        entry_rate: Rate,
        target_rate: Rate,
        entry_time: DateTime<Utc>,
        /// Index of the matching entry in `ProcessorState::history`.
        #[serde(skip)]
        record: usize,
    },
}

impl Position {
    pub fn is_open(&self) -> bool {
        matches!(self, Position::Open { .. })
    }
}

/// One simulated round trip. `closed_at`/`exit_rate` stay empty while open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub entry_rate: Rate,
    pub target_rate: Rate,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_rate: Option<Rate>,
}

impl TradeRecord {
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

/// Mutable per-market state. Owned by exactly one processor task.
#[derive(Clone, Debug)]
pub struct ProcessorState {
    /// Sum of trade prices in the current window.
    pub accumulated_volume: f64,

    /// Closing rate of the previous window. Starts at `Rate::UNBOUNDED` so
    /// the first window can never satisfy the trend condition.
    pub previous_window_rate: Rate,

    /// Last accepted trade rate; carried across window boundaries.
    pub current_window_rate: Rate,

    pub position: Position,

    /// Set by a simulated sell, cleared by the next window tick.
    pub suppress_until_next_window: bool,

    pub history: Vec<TradeRecord>,

    pub open_count: u64,
    pub success_count: u64,

    /// Alert mode: whether the next threshold crossing may fire.
    pub alert_armed: bool,
    pub alert_count: u64,

    pub stale_trades: u64,
    pub rejected_trades: u64,
    pub windows_seen: u64,
}

impl Default for ProcessorState {
    fn default() -> Self {
        Self {
            accumulated_volume: 0.0,
            previous_window_rate: Rate::UNBOUNDED,
            current_window_rate: Rate::ZERO,
            position: Position::Flat,
            suppress_until_next_window: false,
            history: Vec::new(),
            open_count: 0,
            success_count: 0,
            alert_armed: true,
            alert_count: 0,
            stale_trades: 0,
            rejected_trades: 0,
            windows_seen: 0,
        }
    }
}
