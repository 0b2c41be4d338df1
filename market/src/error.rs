use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("malformed trade update: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid rate {0}: must be finite, non-negative and fit the fixed-point scale")]
    InvalidRate(f64),

    #[error("unknown window alignment: {0:?} (expected \"1m\" or \"5m\")")]
    UnknownAlignment(String),
}
