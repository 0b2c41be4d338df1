use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("invalid processor config: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },

    #[error("event sink closed")]
    SinkClosed,
}
