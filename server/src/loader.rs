//! Startup reference data: the market list and per-market window stats.

use std::path::Path;

use anyhow::Context;
use market::{MarketKey, StatsTable};
use tracing::info;

pub fn parse_markets(raw: &str) -> anyhow::Result<Vec<MarketKey>> {
    let markets: Vec<MarketKey> =
        serde_json::from_str(raw).context("markets must be a JSON array of strings")?;
    Ok(markets)
}

pub fn parse_stats(raw: &str) -> anyhow::Result<StatsTable> {
    let stats: StatsTable = serde_json::from_str(raw)
        .context("stats must be a JSON object of market -> { \"avg\": number }")?;
    Ok(stats)
}

pub async fn load_markets(path: impl AsRef<Path>) -> anyhow::Result<Vec<MarketKey>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let markets = parse_markets(&raw).with_context(|| format!("parsing {}", path.display()))?;
    info!(component = "loader", path = %path.display(), count = markets.len(), "markets loaded");
    Ok(markets)
}

pub async fn load_stats(path: impl AsRef<Path>) -> anyhow::Result<StatsTable> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let stats = parse_stats(&raw).with_context(|| format!("parsing {}", path.display()))?;
    info!(component = "loader", path = %path.display(), count = stats.len(), "stats loaded");
    Ok(stats)
}
