//! End-to-end signal processing.
//!
//! One incoming master signal fans out to every configured receiver:
//! idempotency reservation, symbol mapping, risk sizing, safety gating,
//! then dispatch, with the terminal outcome committed back to the
//! idempotency store. Receivers are processed as independent tasks; a
//! failure or block on one never delays another.

use crate::dispatcher::{dispatch_with_retry, DynDispatcher, RetryPolicy};
use crate::error::{ExecError, ExecResult};
use crate::gateway::DynGateway;
use crate::idempotency::{IdempotencyKey, IdempotencyStore, Outcome, Reservation};
use crate::locks::KeyedLocks;
use chrono::Utc;
use relay_core::{
    AccountId, CommandKind, ExecutionCommand, Px, ReceiverPosition, SignalEvent, TradeSignal,
};
use relay_risk::{RiskSizer, SizeRequest};
use relay_safety::{SafetyGate, Verdict};
use relay_symbols::{MappingTable, SymbolCatalog};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Everything the pipeline needs about one receiver.
pub struct ReceiverContext {
    pub id: AccountId,
    pub sizer: RiskSizer,
    pub mappings: Arc<MappingTable>,
    pub catalog: Arc<SymbolCatalog>,
}

/// Terminal result of processing one signal for one receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Dispatched,
    /// Same key already handled; nothing dispatched.
    Duplicate,
    /// Same key currently reserved by another delivery.
    InFlight,
    /// Dropped by mapping, sizing or safety; reason reported.
    Rejected(String),
    /// Deliberately not acted on.
    Skipped(String),
    /// Awaiting manual confirmation.
    Queued(u64),
    Failed(String),
}

impl SignalOutcome {
    fn metrics_label(&self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::Duplicate => "duplicate",
            Self::InFlight => "in_flight",
            Self::Rejected(_) => "rejected",
            Self::Skipped(_) => "skipped",
            Self::Queued(_) => "queued",
            Self::Failed(_) => "failed",
        }
    }
}

/// The signal-side decision engine.
pub struct SignalPipeline {
    master_catalog: Arc<SymbolCatalog>,
    receivers: Vec<Arc<ReceiverContext>>,
    gate: Arc<SafetyGate>,
    store: Arc<IdempotencyStore>,
    dispatcher: DynDispatcher,
    gateway: DynGateway,
    locks: Arc<KeyedLocks>,
    retry_policy: RetryPolicy,
}

impl SignalPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        master_catalog: Arc<SymbolCatalog>,
        receivers: Vec<Arc<ReceiverContext>>,
        gate: Arc<SafetyGate>,
        store: Arc<IdempotencyStore>,
        dispatcher: DynDispatcher,
        gateway: DynGateway,
        locks: Arc<KeyedLocks>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            master_catalog,
            receivers,
            gate,
            store,
            dispatcher,
            gateway,
            locks,
            retry_policy,
        }
    }

    #[must_use]
    pub fn idempotency(&self) -> &Arc<IdempotencyStore> {
        &self.store
    }

    /// Process one signal for all receivers concurrently.
    pub async fn process(self: Arc<Self>, signal: TradeSignal) -> Vec<(AccountId, SignalOutcome)> {
        let mut tasks = JoinSet::new();
        for ctx in &self.receivers {
            let pipeline = Arc::clone(&self);
            let ctx = ctx.clone();
            let signal = signal.clone();
            tasks.spawn(async move {
                let outcome = pipeline.process_for_receiver(&signal, &ctx).await;
                (ctx.id.clone(), outcome)
            });
        }

        let mut results = Vec::with_capacity(self.receivers.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!(error = %e, "Receiver task panicked"),
            }
        }
        results
    }

    /// Process one signal for one receiver.
    pub async fn process_for_receiver(
        &self,
        signal: &TradeSignal,
        ctx: &ReceiverContext,
    ) -> SignalOutcome {
        let key = IdempotencyKey::new(&signal.event_id, &ctx.id, signal.event);
        let outcome = match self.store.check_and_reserve(key) {
            Reservation::AlreadyHandled(prior) => {
                debug!(
                    receiver = %ctx.id,
                    event = %signal.event_id,
                    ?prior,
                    "Duplicate delivery suppressed"
                );
                SignalOutcome::Duplicate
            }
            Reservation::InFlight => SignalOutcome::InFlight,
            Reservation::Fresh => {
                let outcome = match self.handle_fresh(signal, ctx).await {
                    Ok(outcome) => outcome,
                    Err(e) => outcome_for_error(e),
                };
                self.store.record_outcome(key, commit_record(&outcome));
                outcome
            }
        };

        relay_telemetry::SIGNALS_TOTAL
            .with_label_values(&[outcome.metrics_label()])
            .inc();
        if let SignalOutcome::Rejected(reason) | SignalOutcome::Failed(reason) = &outcome {
            warn!(
                receiver = %ctx.id,
                symbol = %signal.symbol,
                event = %signal.event_id,
                reason = %reason,
                "Signal not executed"
            );
        }
        outcome
    }

    async fn handle_fresh(
        &self,
        signal: &TradeSignal,
        ctx: &ReceiverContext,
    ) -> ExecResult<SignalOutcome> {
        let master_spec =
            self.master_catalog
                .get(&signal.symbol)
                .ok_or_else(|| ExecError::MissingSpec {
                    account: signal.master_account.to_string(),
                    symbol: signal.symbol.clone(),
                })?;
        let mapping = ctx.mappings.resolve(&master_spec, &ctx.catalog)?;
        let receiver_spec =
            ctx.catalog
                .get(&mapping.receiver_symbol)
                .ok_or_else(|| ExecError::MissingSpec {
                    account: ctx.id.to_string(),
                    symbol: mapping.receiver_symbol.clone(),
                })?;

        // Build the receiver instruction.
        let kind = match signal.event {
            SignalEvent::Open => {
                let balance = self.gateway.balance(&ctx.id).await?;
                let symbol_override = ctx.mappings.override_for(&mapping.receiver_symbol);
                let volume = ctx.sizer.size(&SizeRequest {
                    master_volume: signal.volume,
                    entry_price: signal.price,
                    sl: signal.sl,
                    receiver_balance: balance,
                    spec: &receiver_spec,
                    symbol_override: symbol_override.as_ref(),
                })?;
                CommandKind::Open {
                    symbol: mapping.receiver_symbol.clone(),
                    direction: signal.direction,
                    volume,
                    price: signal.price,
                    sl: signal.sl,
                    tp: signal.tp,
                    master_position: signal.master_position,
                }
            }
            SignalEvent::Close => {
                let Some(position) = self.find_linked(ctx, signal).await? else {
                    return Ok(SignalOutcome::Skipped(
                        "no linked position to close".to_string(),
                    ));
                };
                CommandKind::Close {
                    position: position.id,
                    symbol: mapping.receiver_symbol.clone(),
                }
            }
            SignalEvent::ModifyVolume => {
                let Some(position) = self.find_linked(ctx, signal).await? else {
                    return Ok(SignalOutcome::Skipped(
                        "no linked position to resize".to_string(),
                    ));
                };
                let balance = self.gateway.balance(&ctx.id).await?;
                let symbol_override = ctx.mappings.override_for(&mapping.receiver_symbol);
                let target_volume = ctx.sizer.size(&SizeRequest {
                    master_volume: signal.volume,
                    entry_price: position.open_price,
                    sl: position.sl,
                    receiver_balance: balance,
                    spec: &receiver_spec,
                    symbol_override: symbol_override.as_ref(),
                })?;
                CommandKind::ModifyVolume {
                    position: position.id,
                    symbol: mapping.receiver_symbol.clone(),
                    target_volume,
                }
            }
            SignalEvent::ModifySlTp => {
                let Some(position) = self.find_linked(ctx, signal).await? else {
                    return Ok(SignalOutcome::Skipped(
                        "no linked position to modify".to_string(),
                    ));
                };
                CommandKind::ModifySlTp {
                    position: position.id,
                    symbol: mapping.receiver_symbol.clone(),
                    sl: signal.sl,
                    tp: signal.tp,
                }
            }
        };
        let command = ExecutionCommand::new(ctx.id.clone(), kind);

        // Gate, with bounded re-checks on retryable slippage rejections.
        let (_, max_attempts) = self.gate.retry_settings(&ctx.id)?;
        let signal_px = match signal.event {
            SignalEvent::Open => Some(signal.price),
            _ => None,
        };
        let mut attempt = 0u32;
        let verdict = loop {
            let current_px = match signal_px {
                Some(_) => Some(
                    self.gateway
                        .current_price(&ctx.id, &mapping.receiver_symbol)
                        .await?,
                ),
                None => None,
            };
            let verdict =
                self.gate
                    .evaluate(&command, &receiver_spec, signal_px, current_px, Utc::now())?;
            match verdict {
                Verdict::Rejected(rejection)
                    if rejection.is_retryable() && attempt + 1 < max_attempts.max(1) =>
                {
                    attempt += 1;
                    relay_telemetry::RETRY_TOTAL.inc();
                    tokio::time::sleep(self.retry_policy.delay_for(attempt - 1)).await;
                }
                other => break other,
            }
        };

        match verdict {
            Verdict::Approved => {
                let _guard = self.locks.acquire(&ctx.id, signal.master_position).await;
                dispatch_with_retry(&self.dispatcher, &command, max_attempts, &self.retry_policy)
                    .await?;
                info!(
                    receiver = %ctx.id,
                    symbol = %mapping.receiver_symbol,
                    kind = command.kind.as_str(),
                    "Command dispatched"
                );
                Ok(SignalOutcome::Dispatched)
            }
            Verdict::Queued(id) => Ok(SignalOutcome::Queued(id)),
            Verdict::Skipped(_) => Ok(SignalOutcome::Skipped("outside session".to_string())),
            Verdict::Rejected(rejection) => Ok(SignalOutcome::Rejected(rejection.to_string())),
        }
    }

    async fn find_linked(
        &self,
        ctx: &ReceiverContext,
        signal: &TradeSignal,
    ) -> ExecResult<Option<ReceiverPosition>> {
        let positions = self.gateway.receiver_positions(&ctx.id).await?;
        Ok(positions
            .into_iter()
            .find(|p| p.master_position == Some(signal.master_position)))
    }
}

/// Map a pipeline error to its terminal outcome class.
///
/// Mapping and sizing failures drop the signal (reported, not fatal);
/// everything else is a processing failure.
fn outcome_for_error(e: ExecError) -> SignalOutcome {
    match e {
        ExecError::Mapping(_) | ExecError::Sizing(_) => SignalOutcome::Rejected(e.to_string()),
        _ => SignalOutcome::Failed(e.to_string()),
    }
}

/// Outcome record committed to the idempotency store.
fn commit_record(outcome: &SignalOutcome) -> Outcome {
    match outcome {
        SignalOutcome::Dispatched => Outcome::Dispatched,
        SignalOutcome::Rejected(r) => Outcome::Rejected(r.clone()),
        SignalOutcome::Skipped(r) => Outcome::Skipped(r.clone()),
        SignalOutcome::Queued(id) => Outcome::Queued(*id),
        SignalOutcome::Failed(r) => Outcome::Failed(r.clone()),
        // Duplicate/InFlight never reach the commit path.
        SignalOutcome::Duplicate | SignalOutcome::InFlight => Outcome::Skipped("noop".to_string()),
    }
}
