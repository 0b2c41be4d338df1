use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::ProcessorError;

/// Default capacity of a processor's inbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_000;

/// Target = entry * 1.03.
pub const DEFAULT_TARGET_MARKUP_BPS: u32 = 300;

pub const DEFAULT_STALE_SLACK_SECS: f64 = 5.0;

pub const TRADING_BUY_MULTIPLIER: f64 = 7.0;
pub const ALERT_MULTIPLIER: f64 = 5.0;

/// What a processor does when a window's volume crosses its threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorMode {
    /// Simulated buy/sell state machine.
    Trading,
    /// Emit a volume alert only; no position is ever opened.
    AlertOnly,
}

impl ProcessorMode {
    pub fn default_multiplier(self) -> f64 {
        match self {
            ProcessorMode::Trading => TRADING_BUY_MULTIPLIER,
            ProcessorMode::AlertOnly => ALERT_MULTIPLIER,
        }
    }
}

impl FromStr for ProcessorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trading" | "trade" => Ok(ProcessorMode::Trading),
            "alert" | "alert_only" => Ok(ProcessorMode::AlertOnly),
            other => Err(format!("unknown processor mode {other:?}")),
        }
    }
}

/// Per-processor knobs. Shared by every market in one process.
#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    pub mode: ProcessorMode,

    /// Window volume must exceed `average_volume * buy_multiplier`.
    pub buy_multiplier: f64,

    /// Profit target above the entry rate, in basis points.
    pub target_markup_bps: u32,

    /// Trades older than `now - stale_slack_secs - feed_clock_offset_secs`
    /// are ignored.
    pub stale_slack_secs: f64,

    /// Fixed correction for a feed that stamps trades in a shifted timezone.
    pub feed_clock_offset_secs: f64,

    /// Bounded inbound queue size. A full queue blocks the router.
    pub queue_capacity: usize,

    /// Alert mode only: delay before a fired alert may fire again.
    /// `None` re-arms the alert at the next window boundary.
    pub alert_rearm: Option<Duration>,
}

impl ProcessorConfig {
    pub fn for_mode(mode: ProcessorMode) -> Self {
        Self {
            mode,
            buy_multiplier: mode.default_multiplier(),
            target_markup_bps: DEFAULT_TARGET_MARKUP_BPS,
            stale_slack_secs: DEFAULT_STALE_SLACK_SECS,
            feed_clock_offset_secs: 0.0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            alert_rearm: None,
        }
    }

    /// Oldest trade timestamp still accepted at `now_secs`.
    pub fn stale_cutoff(&self, now_secs: f64) -> f64 {
        now_secs - self.stale_slack_secs - self.feed_clock_offset_secs
    }

    pub fn validate(&self) -> Result<(), ProcessorError> {
        if !(self.buy_multiplier.is_finite() && self.buy_multiplier > 0.0) {
            return Err(ProcessorError::InvalidConfig {
                field: "buy_multiplier",
                reason: "must be a positive number",
            });
        }
        if self.target_markup_bps == 0 {
            return Err(ProcessorError::InvalidConfig {
                field: "target_markup_bps",
                reason: "must be greater than zero",
            });
        }
        if !(self.stale_slack_secs.is_finite() && self.stale_slack_secs >= 0.0) {
            return Err(ProcessorError::InvalidConfig {
                field: "stale_slack_secs",
                reason: "must be a non-negative number",
            });
        }
        if !self.feed_clock_offset_secs.is_finite() {
            return Err(ProcessorError::InvalidConfig {
                field: "feed_clock_offset_secs",
                reason: "must be finite",
            });
        }
        if self.queue_capacity == 0 {
            return Err(ProcessorError::InvalidConfig {
                field: "queue_capacity",
                reason: "must be greater than zero",
            });
        }
        if self.alert_rearm == Some(Duration::ZERO) {
            return Err(ProcessorError::InvalidConfig {
                field: "alert_rearm",
                reason: "must be greater than zero when set",
            });
        }
        Ok(())
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::for_mode(ProcessorMode::Trading)
    }
}
