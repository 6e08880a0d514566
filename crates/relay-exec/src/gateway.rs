//! Read-side boundary to account state.
//!
//! Balances, executable prices and position snapshots are pulled from each
//! account's execution agent over an external transport; this trait is the
//! seam the engine sees.

use crate::dispatcher::BoxFuture;
use relay_core::{AccountId, MasterPosition, Px, ReceiverPosition};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

/// Transport-level failure reading account state.
#[derive(Debug, Clone, Error)]
#[error("{account}: {message}")]
pub struct GatewayError {
    pub account: String,
    pub message: String,
}

impl GatewayError {
    pub fn new(account: &AccountId, message: impl Into<String>) -> Self {
        Self {
            account: account.to_string(),
            message: message.into(),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Pull-side account queries.
pub trait AccountGateway: Send + Sync {
    /// Current account balance in deposit currency.
    fn balance(&self, account: &AccountId) -> BoxFuture<'_, GatewayResult<Decimal>>;

    /// Current executable price for a symbol on this account.
    fn current_price(
        &self,
        account: &AccountId,
        symbol: &str,
    ) -> BoxFuture<'_, GatewayResult<Px>>;

    /// Open positions on the master account.
    fn master_positions(
        &self,
        account: &AccountId,
    ) -> BoxFuture<'_, GatewayResult<Vec<MasterPosition>>>;

    /// Open positions on a receiver account, with master linkage where the
    /// position was created by a copy.
    fn receiver_positions(
        &self,
        account: &AccountId,
    ) -> BoxFuture<'_, GatewayResult<Vec<ReceiverPosition>>>;
}

/// Arc wrapper for gateway trait objects.
pub type DynGateway = Arc<dyn AccountGateway>;
