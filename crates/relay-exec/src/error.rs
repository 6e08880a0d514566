//! Execution pipeline error types.

use relay_risk::RiskError;
use relay_safety::SafetyError;
use relay_symbols::SymbolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Mapping failed: {0}")]
    Mapping(#[from] SymbolError),

    #[error("Sizing failed: {0}")]
    Sizing(#[from] RiskError),

    #[error("Safety check failed: {0}")]
    Safety(#[from] SafetyError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] crate::gateway::GatewayError),

    #[error("No spec for symbol {symbol} in {account} catalog")]
    MissingSpec { account: String, symbol: String },

    #[error("Dispatch failed after {attempts} attempts: {reason}")]
    Transient { attempts: u32, reason: String },

    #[error("Dispatch rejected permanently: {reason}")]
    Fatal { reason: String },
}

pub type ExecResult<T> = Result<T, ExecError>;
