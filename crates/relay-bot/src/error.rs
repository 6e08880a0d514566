//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] relay_core::CoreError),

    #[error("Risk error: {0}")]
    Risk(#[from] relay_risk::RiskError),

    #[error("Safety error: {0}")]
    Safety(#[from] relay_safety::SafetyError),

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] relay_reconcile::ReconcileError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] relay_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
