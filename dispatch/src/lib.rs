pub mod error;
pub mod registry;
pub mod router;

pub use error::RouteError;
pub use registry::{Handle, Registry, Supervisor, initialize};
pub use router::{RouteOutcome, Router, RouterCounters};
