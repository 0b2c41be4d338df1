use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a trading pair, e.g. `BTC-ETH`.
///
/// Used both as the routing key and as the stats lookup key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, std::hash::Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketKey(String);

impl MarketKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for MarketKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MarketKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MarketKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Side tag reported by the feed. Unrecognised tags are kept as `Unknown`
/// instead of failing the whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum OrderType {
    Buy,
    Sell,
    Unknown,
}

impl From<String> for OrderType {
    fn from(s: String) -> Self {
        OrderType::from(s.as_str())
    }
}

impl From<&str> for OrderType {
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("buy") {
            OrderType::Buy
        } else if s.eq_ignore_ascii_case("sell") {
            OrderType::Sell
        } else {
            OrderType::Unknown
        }
    }
}

/// A single trade observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    /// Feed-assigned trade id, when the feed provides one.
    pub id: Option<u64>,
    pub quantity: f64,
    /// Exchange rate of the trade; converted to fixed point by the processor.
    pub rate: f64,
    /// Display price. Summed per window to form "volume".
    pub price: f64,
    pub order_type: OrderType,
    /// Seconds since the Unix epoch, fractional.
    pub timestamp: f64,
}

impl Trade {
    pub fn new(rate: f64, price: f64, order_type: OrderType, timestamp: f64) -> Self {
        Self {
            id: None,
            quantity: 0.0,
            rate,
            price,
            order_type,
            timestamp,
        }
    }
}

/// All trades of one feed message for a single market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeBatch {
    pub market: MarketKey,
    pub trades: Vec<Trade>,
}

impl TradeBatch {
    pub fn new(market: impl Into<MarketKey>, trades: Vec<Trade>) -> Self {
        Self {
            market: market.into(),
            trades,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn market_key_looks_up_by_str() {
        let mut map = HashMap::new();
        map.insert(MarketKey::from("BTC-ETH"), 1);

        assert_eq!(map.get("BTC-ETH"), Some(&1));
        assert_eq!(map.get("BTC-LTC"), None);
    }

    #[test]
    fn order_type_is_case_insensitive() {
        assert_eq!(OrderType::from("BUY"), OrderType::Buy);
        assert_eq!(OrderType::from("sell"), OrderType::Sell);
        assert_eq!(OrderType::from("FILL"), OrderType::Unknown);
    }

    #[test]
    fn empty_batch_reports_empty() {
        let batch = TradeBatch::new("BTC-ETH", vec![]);
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
