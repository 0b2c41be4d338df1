use chrono::{DateTime, Utc};
use market::{MarketKey, Rate};
use serde::Serialize;
use uuid::Uuid;

/// Domain event emitted by a processor to its sink.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarketEvent {
    pub market: MarketKey,
    pub at: DateTime<Utc>,
    pub kind: EventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    BuyOpened {
        record_id: Uuid,
        entry_rate: Rate,
        target_rate: Rate,
        volume: f64,
        threshold: f64,
    },
    SellClosed {
        record_id: Uuid,
        entry_rate: Rate,
        exit_rate: Rate,
    },
    AlertFired {
        volume: f64,
        threshold: f64,
    },
}

impl EventKind {
    /// Stable short name, used as a log field and a storage column.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::BuyOpened { .. } => "buy_opened",
            EventKind::SellClosed { .. } => "sell_closed",
            EventKind::AlertFired { .. } => "alert_fired",
        }
    }
}
