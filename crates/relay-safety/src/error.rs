//! Safety error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SafetyError {
    #[error("Invalid safety configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown receiver: {0}")]
    UnknownReceiver(String),

    #[error("State persistence failed: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("State serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SafetyResult<T> = Result<T, SafetyError>;
