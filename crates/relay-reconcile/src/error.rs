//! Reconciliation error types.

use relay_exec::{ExecError, GatewayError};
use relay_safety::SafetyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Snapshot fetch failed: {0}")]
    Snapshot(#[from] GatewayError),

    #[error("Safety gate error: {0}")]
    Safety(#[from] SafetyError),

    #[error("Corrective dispatch failed: {0}")]
    Dispatch(#[from] ExecError),

    #[error("Invalid reconcile policy: {0}")]
    InvalidPolicy(String),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
