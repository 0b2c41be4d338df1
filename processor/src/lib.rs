pub mod config;
pub mod error;
pub mod event;
pub mod machine;
pub mod sink;
pub mod snapshot;
pub mod state;
pub mod worker;

pub use config::{ProcessorConfig, ProcessorMode};
pub use error::ProcessorError;
pub use event::{EventKind, MarketEvent};
pub use machine::MarketMachine;
pub use sink::{ChannelSink, EventSink, LogSink};
pub use snapshot::ProcessorSnapshot;
pub use state::{Position, ProcessorState, TradeRecord};
pub use worker::MarketProcessor;
