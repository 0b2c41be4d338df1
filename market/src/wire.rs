//! JSON shape of a feed message.
//!
//! ```json
//! { "pair": "BTC-ETH",
//!   "data": [ { "id": 1, "quantity": 0.5, "rate": 0.031, "price": 0.0155,
//!               "orderType": "BUY", "timestamp": 1514764800.25 } ] }
//! ```

use serde::Deserialize;

use crate::error::MarketError;
use crate::types::{MarketKey, OrderType, Trade, TradeBatch};

#[derive(Debug, Clone, Deserialize)]
pub struct TradeUpdate {
    pub pair: String,
    #[serde(default)]
    pub data: Vec<WireTrade>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTrade {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub quantity: f64,
    pub rate: f64,
    pub price: f64,
    #[serde(rename = "orderType", alias = "order_type")]
    pub order_type: OrderType,
    pub timestamp: f64,
}

impl From<WireTrade> for Trade {
    fn from(w: WireTrade) -> Self {
        Trade {
            id: w.id,
            quantity: w.quantity,
            rate: w.rate,
            price: w.price,
            order_type: w.order_type,
            timestamp: w.timestamp,
        }
    }
}

impl From<TradeUpdate> for TradeBatch {
    fn from(u: TradeUpdate) -> Self {
        TradeBatch {
            market: MarketKey::new(u.pair),
            trades: u.data.into_iter().map(Trade::from).collect(),
        }
    }
}

/// Decodes one feed frame into a batch.
pub fn decode_trade_update(frame: &[u8]) -> Result<TradeBatch, MarketError> {
    let update: TradeUpdate = serde_json::from_slice(frame)?;
    Ok(update.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_frame() {
        let frame = br#"{
            "pair": "BTC-ETH",
            "data": [
                { "id": 7, "quantity": 2.0, "rate": 0.05, "price": 0.1,
                  "orderType": "BUY", "timestamp": 1514764800.5 },
                { "rate": 0.06, "price": 0.2, "orderType": "SELL", "timestamp": 1514764801.0 }
            ]
        }"#;

        let batch = decode_trade_update(frame).unwrap();

        assert_eq!(batch.market.as_str(), "BTC-ETH");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.trades[0].id, Some(7));
        assert_eq!(batch.trades[0].order_type, OrderType::Buy);
        assert_eq!(batch.trades[1].id, None);
        assert_eq!(batch.trades[1].quantity, 0.0);
        assert_eq!(batch.trades[1].order_type, OrderType::Sell);
    }

    #[test]
    fn missing_data_is_an_empty_batch() {
        let batch = decode_trade_update(br#"{ "pair": "BTC-LTC" }"#).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn unknown_order_type_does_not_fail_batch() {
        let frame = br#"{ "pair": "BTC-ETH", "data": [
            { "rate": 1.0, "price": 1.0, "orderType": "FILL", "timestamp": 1.0 } ] }"#;

        let batch = decode_trade_update(frame).unwrap();
        assert_eq!(batch.trades[0].order_type, OrderType::Unknown);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_trade_update(b"not json").unwrap_err();
        assert!(matches!(err, MarketError::Decode(_)));
    }
}
