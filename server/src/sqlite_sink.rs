//! SqliteEventSink
//! ---------------
//! Append-only journal of market events. Every buy, sell and alert becomes
//! one row in `market_events`, with the event body kept as JSON so new
//! event fields never need a schema change.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use processor::{EventSink, MarketEvent};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

/// One journal row, as read back.
#[derive(Clone, Debug)]
pub struct StoredEvent {
    pub market: String,
    pub kind: String,
    pub at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

pub struct SqliteEventSink {
    pool: SqlitePool,
}

impl SqliteEventSink {
    /// Opens (creating if needed) the database at `url` and ensures the
    /// schema exists.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS market_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                market TEXT NOT NULL,
                kind TEXT NOT NULL,
                at TEXT NOT NULL,
                payload TEXT NOT NULL
            );
        "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS market_events_market ON market_events (market, id);",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Events for `market`, oldest first.
    pub async fn events_for(&self, market: &str) -> anyhow::Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            "SELECT market, kind, at, payload FROM market_events WHERE market = ? ORDER BY id",
        )
        .bind(market)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.get("payload");
            events.push(StoredEvent {
                market: row.get("market"),
                kind: row.get("kind"),
                at: row.get("at"),
                payload: serde_json::from_str(&payload)?,
            });
        }
        Ok(events)
    }

    pub async fn count(&self) -> anyhow::Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM market_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

#[async_trait]
impl EventSink for SqliteEventSink {
    async fn publish(&self, event: MarketEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&event.kind)?;

        sqlx::query("INSERT INTO market_events (market, kind, at, payload) VALUES (?, ?, ?, ?)")
            .bind(event.market.as_str())
            .bind(event.kind.name())
            .bind(event.at)
            .bind(payload)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
