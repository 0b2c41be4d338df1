use market::MarketKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("processor for {0} is no longer accepting batches")]
    ProcessorClosed(MarketKey),
}
