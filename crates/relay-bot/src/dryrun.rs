//! Paper transport for dry runs.
//!
//! Stands in for the real execution transport: commands are logged and
//! acknowledged, never sent anywhere, and account state is synthetic. Lets
//! the full decision path run against live-shaped signals without touching
//! an account.

use dashmap::DashMap;
use relay_core::{AccountId, ExecutionCommand, MasterPosition, Px, ReceiverPosition};
use relay_exec::{
    AccountGateway, BoxFuture, DispatchResult, ExecutionDispatcher, GatewayError, GatewayResult,
};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Dispatcher that acknowledges every command without sending it.
#[derive(Default)]
pub struct PaperDispatcher {
    dispatched: AtomicU64,
}

impl PaperDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}

impl ExecutionDispatcher for PaperDispatcher {
    fn dispatch(&self, command: ExecutionCommand) -> BoxFuture<'_, DispatchResult> {
        Box::pin(async move {
            self.dispatched.fetch_add(1, Ordering::Relaxed);
            info!(
                receiver = %command.receiver,
                kind = command.kind.as_str(),
                symbol = command.kind.symbol(),
                "Paper dispatch"
            );
            DispatchResult::Ack
        })
    }
}

/// Gateway reporting a fixed balance and the last observed price.
///
/// Prices are fed from incoming signals, so paper-mode slippage checks see
/// the signal price itself. Position snapshots are always empty.
pub struct PaperGateway {
    balance: Decimal,
    prices: DashMap<String, Px>,
}

impl PaperGateway {
    #[must_use]
    pub fn new(balance: Decimal) -> Self {
        Self {
            balance,
            prices: DashMap::new(),
        }
    }

    pub fn observe_price(&self, symbol: &str, price: Px) {
        self.prices.insert(symbol.to_string(), price);
    }
}

impl AccountGateway for PaperGateway {
    fn balance(&self, _account: &AccountId) -> BoxFuture<'_, GatewayResult<Decimal>> {
        Box::pin(async move { Ok(self.balance) })
    }

    fn current_price(
        &self,
        account: &AccountId,
        symbol: &str,
    ) -> BoxFuture<'_, GatewayResult<Px>> {
        let account = account.clone();
        let symbol = symbol.to_string();
        Box::pin(async move {
            self.prices
                .get(&symbol)
                .map(|p| *p)
                .ok_or_else(|| GatewayError::new(&account, format!("no price observed for {symbol}")))
        })
    }

    fn master_positions(
        &self,
        _account: &AccountId,
    ) -> BoxFuture<'_, GatewayResult<Vec<MasterPosition>>> {
        Box::pin(async move { Ok(Vec::new()) })
    }

    fn receiver_positions(
        &self,
        _account: &AccountId,
    ) -> BoxFuture<'_, GatewayResult<Vec<ReceiverPosition>>> {
        Box::pin(async move { Ok(Vec::new()) })
    }
}
