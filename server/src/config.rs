use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use market::Alignment;
use processor::{ProcessorConfig, ProcessorMode};

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Address the websocket trade feed listens on.
    pub listen_addr: SocketAddr,

    // =========================
    // Reference data
    // =========================
    /// JSON array of market keys to run processors for.
    pub markets_path: String,

    /// JSON object mapping market key to `{ "avg": <volume> }`.
    ///
    /// Markets listed in `markets_path` but missing here are skipped at
    /// startup with a warning.
    pub stats_path: String,

    // =========================
    // Processing
    // =========================
    /// Boundary the window ticker aligns to (`1m` or `5m`).
    pub window: Alignment,

    /// Knobs handed to every market processor.
    ///
    /// `BUY_MULTIPLIER` falls back to the mode's default (7 for trading,
    /// 5 for alerts) when unset.
    pub processor: ProcessorConfig,

    // =========================
    // Output
    // =========================
    /// SQLite URL for the event journal. Events are only logged when unset.
    pub events_db_url: Option<String>,

    /// Emit JSON logs (`APP_ENV=production`).
    pub json_logs: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr: SocketAddr =
            parse_or(&get, "LISTEN_ADDR", SocketAddr::from(([127, 0, 0, 1], 8080)))?;

        let mode: ProcessorMode = match get("PROCESSOR_MODE") {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| anyhow!(e))
                .context("PROCESSOR_MODE")?,
            None => ProcessorMode::Trading,
        };

        let defaults = ProcessorConfig::for_mode(mode);
        let processor = ProcessorConfig {
            mode,
            buy_multiplier: parse_or(&get, "BUY_MULTIPLIER", defaults.buy_multiplier)?,
            target_markup_bps: parse_or(&get, "TARGET_MARKUP_BPS", defaults.target_markup_bps)?,
            stale_slack_secs: parse_or(&get, "STALE_SLACK_SECS", defaults.stale_slack_secs)?,
            feed_clock_offset_secs: parse_or(
                &get,
                "FEED_CLOCK_OFFSET_SECS",
                defaults.feed_clock_offset_secs,
            )?,
            queue_capacity: parse_or(&get, "QUEUE_CAPACITY", defaults.queue_capacity)?,
            alert_rearm: get("ALERT_REARM_SECS")
                .map(|raw| raw.trim().parse::<u64>().map(Duration::from_secs))
                .transpose()
                .context("ALERT_REARM_SECS")?,
        };
        processor.validate()?;

        Ok(Self {
            listen_addr,
            markets_path: get("MARKETS_PATH").unwrap_or_else(|| "markets.json".to_string()),
            stats_path: get("STATS_PATH").unwrap_or_else(|| "stats.json".to_string()),
            window: parse_or(&get, "WINDOW", Alignment::FiveMinutes)?,
            processor,
            events_db_url: get("EVENTS_DB_URL"),
            json_logs: get("APP_ENV").is_some_and(|v| v == "production"),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| anyhow!("invalid {key}={raw:?}: {e}")),
        None => Ok(default),
    }
}
