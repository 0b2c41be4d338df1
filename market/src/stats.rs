use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::MarketKey;

/// Historical statistics for one market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Average volume (sum of trade prices) per window.
    #[serde(alias = "avg", alias = "Avg", alias = "averageVolume")]
    pub average_volume: f64,
}

impl WindowStats {
    pub fn new(average_volume: f64) -> Self {
        Self { average_volume }
    }

    /// Volume a window must exceed for `multiplier` to fire.
    pub fn threshold(&self, multiplier: f64) -> f64 {
        self.average_volume * multiplier
    }
}

/// Immutable lookup table `MarketKey -> WindowStats`, loaded once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsTable {
    entries: HashMap<MarketKey, WindowStats>,
}

impl StatsTable {
    pub fn get(&self, market: &str) -> Option<&WindowStats> {
        self.entries.get(market)
    }

    pub fn contains(&self, market: &str) -> bool {
        self.entries.contains_key(market)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(MarketKey, WindowStats)> for StatsTable {
    fn from_iter<I: IntoIterator<Item = (MarketKey, WindowStats)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
