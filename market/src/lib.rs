pub mod error;
pub mod rate;
pub mod stats;
pub mod ticker;
pub mod types;
pub mod wire;

pub use error::MarketError;
pub use rate::Rate;
pub use stats::{StatsTable, WindowStats};
pub use ticker::{AlignedTicker, Alignment, WindowTick};
pub use types::{MarketKey, OrderType, Trade, TradeBatch};
