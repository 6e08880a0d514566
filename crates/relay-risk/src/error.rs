//! Risk sizing error types.

use relay_core::{CoreError, Lots};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("{symbol}: risk-based sizing requires a stop loss")]
    MissingStopLoss { symbol: String },

    #[error("{symbol}: stop distance is zero")]
    ZeroStopDistance { symbol: String },

    #[error("{symbol}: computed volume {computed} is below min lot {min}")]
    BelowMinLot {
        symbol: String,
        computed: Lots,
        min: Lots,
    },

    #[error("Invalid risk configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type RiskResult<T> = Result<T, RiskError>;
