//! The reconciliation cycle.
//!
//! Idle → Fetching → Classifying → Acting → Idle, driven by an external
//! timer. Cycles never overlap: a tick arriving while a cycle is still
//! running is skipped. Corrective commands go through the same safety gate,
//! per-pair locks and retry policy as live signal dispatch.

use crate::classify::{classify_receiver, Discrepancy, LinkedExpectation};
use crate::error::ReconcileResult;
use crate::history::{ActionHistory, ReconcileAction};
use crate::policy::ReconcilePolicy;
use chrono::Utc;
use relay_core::{AccountId, CommandKind, ExecutionCommand, MasterPosition, PositionId};
use relay_exec::{
    dispatch_with_retry, DynDispatcher, DynGateway, KeyedLocks, ReceiverContext, RetryPolicy,
};
use relay_risk::SizeRequest;
use relay_safety::{SafetyGate, Verdict};
use relay_symbols::SymbolCatalog;
use relay_telemetry::Metrics;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the engine currently is in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle = 0,
    Fetching = 1,
    Classifying = 2,
    Acting = 3,
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub discrepancies: usize,
    pub actions_attempted: usize,
    pub actions_failed: usize,
    pub receivers_failed: usize,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleResult {
    Completed(CycleStats),
    /// Previous cycle still running, or reconciliation disabled.
    Skipped,
}

struct ReceiverOutcome {
    discrepancies: usize,
    attempted: usize,
    failed: usize,
}

/// Timer-driven drift detector and corrector.
pub struct ReconcileEngine {
    policy: ReconcilePolicy,
    master_account: AccountId,
    master_catalog: Arc<SymbolCatalog>,
    receivers: Vec<Arc<ReceiverContext>>,
    gate: Arc<SafetyGate>,
    dispatcher: DynDispatcher,
    gateway: DynGateway,
    locks: Arc<KeyedLocks>,
    retry_policy: RetryPolicy,
    history: Arc<ActionHistory>,
    in_flight: AtomicBool,
    phase: AtomicU8,
}

impl ReconcileEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        policy: ReconcilePolicy,
        master_account: AccountId,
        master_catalog: Arc<SymbolCatalog>,
        receivers: Vec<Arc<ReceiverContext>>,
        gate: Arc<SafetyGate>,
        dispatcher: DynDispatcher,
        gateway: DynGateway,
        locks: Arc<KeyedLocks>,
        retry_policy: RetryPolicy,
    ) -> ReconcileResult<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            master_account,
            master_catalog,
            receivers,
            gate,
            dispatcher,
            gateway,
            locks,
            retry_policy,
            history: Arc::new(ActionHistory::default()),
            in_flight: AtomicBool::new(false),
            phase: AtomicU8::new(CyclePhase::Idle as u8),
        })
    }

    #[must_use]
    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// Action history, read-only for the presentation layer.
    #[must_use]
    pub fn history(&self) -> &Arc<ActionHistory> {
        &self.history
    }

    #[must_use]
    pub fn phase(&self) -> CyclePhase {
        match self.phase.load(Ordering::Acquire) {
            1 => CyclePhase::Fetching,
            2 => CyclePhase::Classifying,
            3 => CyclePhase::Acting,
            _ => CyclePhase::Idle,
        }
    }

    fn set_phase(&self, phase: CyclePhase) {
        self.phase.store(phase as u8, Ordering::Release);
        relay_telemetry::RECONCILE_PHASE.set(phase as i64);
    }

    /// Run one cycle, or skip if the previous one is still in flight.
    pub async fn run_cycle(&self) -> ReconcileResult<CycleResult> {
        if !self.policy.enabled {
            return Ok(CycleResult::Skipped);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Previous reconcile cycle still running, tick skipped");
            Metrics::reconcile_cycle("skipped");
            return Ok(CycleResult::Skipped);
        }

        let result = self.run_cycle_inner().await;
        self.set_phase(CyclePhase::Idle);
        self.in_flight.store(false, Ordering::Release);

        match &result {
            Ok(stats) => {
                let label = if stats.discrepancies == 0 {
                    "clean"
                } else {
                    "discrepancies"
                };
                Metrics::reconcile_cycle(label);
                info!(
                    discrepancies = stats.discrepancies,
                    attempted = stats.actions_attempted,
                    failed = stats.actions_failed,
                    receivers_failed = stats.receivers_failed,
                    "Reconcile cycle complete"
                );
            }
            Err(e) => {
                Metrics::reconcile_cycle("error");
                warn!(error = %e, "Reconcile cycle failed");
            }
        }
        result.map(CycleResult::Completed)
    }

    async fn run_cycle_inner(&self) -> ReconcileResult<CycleStats> {
        self.set_phase(CyclePhase::Fetching);
        let masters = self.gateway.master_positions(&self.master_account).await?;

        let mut stats = CycleStats::default();
        for ctx in &self.receivers {
            match self.reconcile_receiver(ctx, &masters).await {
                Ok(outcome) => {
                    stats.discrepancies += outcome.discrepancies;
                    stats.actions_attempted += outcome.attempted;
                    stats.actions_failed += outcome.failed;
                }
                Err(e) => {
                    // One receiver's failure never aborts the cycle.
                    stats.receivers_failed += 1;
                    warn!(receiver = %ctx.id, error = %e, "Receiver reconcile failed");
                }
            }
        }
        Ok(stats)
    }

    async fn reconcile_receiver(
        &self,
        ctx: &ReceiverContext,
        masters: &[MasterPosition],
    ) -> ReconcileResult<ReceiverOutcome> {
        let positions = self.gateway.receiver_positions(&ctx.id).await?;
        let balance = self.gateway.balance(&ctx.id).await?;

        self.set_phase(CyclePhase::Classifying);
        let discrepancies = classify_receiver(masters, &positions, |master| {
            self.expectation_for(ctx, master, balance)
        });
        for d in &discrepancies {
            Metrics::discrepancy(d.kind());
            debug!(receiver = %ctx.id, kind = d.kind(), "Discrepancy detected");
        }

        self.set_phase(CyclePhase::Acting);
        let mut outcome = ReceiverOutcome {
            discrepancies: discrepancies.len(),
            attempted: 0,
            failed: 0,
        };
        for discrepancy in &discrepancies {
            if let Some(action) = self.act(ctx, discrepancy, balance).await {
                outcome.attempted += 1;
                if !action.success {
                    outcome.failed += 1;
                }
                self.history.append(action);
            }
        }
        Ok(outcome)
    }

    /// Expected receiver state for a master position. `None` when mapping
    /// or sizing is unavailable; direction checks still apply without it.
    fn expectation_for(
        &self,
        ctx: &ReceiverContext,
        master: &MasterPosition,
        balance: Decimal,
    ) -> Option<LinkedExpectation> {
        let master_spec = self.master_catalog.get(&master.symbol)?;
        let mapping = ctx.mappings.resolve(&master_spec, &ctx.catalog).ok()?;
        let spec = ctx.catalog.get(&mapping.receiver_symbol)?;
        let symbol_override = ctx.mappings.override_for(&mapping.receiver_symbol);
        let expected_volume = ctx
            .sizer
            .size(&SizeRequest {
                master_volume: master.volume,
                entry_price: master.open_price,
                sl: master.sl,
                receiver_balance: balance,
                spec: &spec,
                symbol_override: symbol_override.as_ref(),
            })
            .ok()?;
        Some(LinkedExpectation {
            expected_volume,
            expected_sl: master.sl,
            expected_tp: master.tp,
            lot_step: spec.lot_step,
            tick_size: spec.tick_size,
        })
    }

    /// Apply one discrepancy under the policy. `None` means the policy
    /// leaves this kind detect-only and no action was attempted.
    async fn act(
        &self,
        ctx: &ReceiverContext,
        discrepancy: &Discrepancy,
        balance: Decimal,
    ) -> Option<ReconcileAction> {
        match discrepancy {
            Discrepancy::MissingOnReceiver { master } => {
                if !self.policy.auto_open_missing {
                    return None;
                }
                Some(self.open_missing(ctx, master, balance).await)
            }
            Discrepancy::OrphanedOnReceiver { position } => {
                if !self.policy.auto_close_orphaned {
                    return None;
                }
                let kind = CommandKind::Close {
                    position: position.id,
                    symbol: position.symbol.clone(),
                };
                // Orphans always carry a master link; the classifier skips
                // manual positions.
                let lock_key = position.master_position?;
                Some(
                    self.correct(ctx, kind, &position.symbol, lock_key, "close")
                        .await,
                )
            }
            Discrepancy::VolumeMismatch {
                master,
                position,
                expected_volume,
            } => {
                if !self.policy.auto_adjust_volume {
                    return None;
                }
                let kind = CommandKind::ModifyVolume {
                    position: position.id,
                    symbol: position.symbol.clone(),
                    target_volume: *expected_volume,
                };
                Some(
                    self.correct(ctx, kind, &position.symbol, master.id, "modify_volume")
                        .await,
                )
            }
            Discrepancy::SlMismatch { master, position }
            | Discrepancy::TpMismatch { master, position } => {
                if !self.policy.auto_sync_sl_tp {
                    return None;
                }
                let kind = CommandKind::ModifySlTp {
                    position: position.id,
                    symbol: position.symbol.clone(),
                    sl: master.sl,
                    tp: master.tp,
                };
                Some(
                    self.correct(ctx, kind, &position.symbol, master.id, "modify_sltp")
                        .await,
                )
            }
            Discrepancy::DirectionMismatch { master, position } => {
                // Automatic correction could mask a race or external
                // interference; always a manual-review item.
                warn!(
                    receiver = %ctx.id,
                    symbol = %position.symbol,
                    master_position = master.id.0,
                    "Direction mismatch, manual review required"
                );
                Some(ReconcileAction::success(
                    &ctx.id,
                    "manual_review",
                    &position.symbol,
                    format!(
                        "direction mismatch on master position {}: master {:?}, receiver {:?}",
                        master.id.0, master.direction, position.direction
                    ),
                ))
            }
        }
    }

    async fn open_missing(
        &self,
        ctx: &ReceiverContext,
        master: &MasterPosition,
        balance: Decimal,
    ) -> ReconcileAction {
        let built = self.build_open(ctx, master, balance);
        match built {
            Ok(kind) => {
                let symbol = kind.symbol().to_string();
                self.correct(ctx, kind, &symbol, master.id, "open").await
            }
            Err(reason) => ReconcileAction::failure(
                &ctx.id,
                "open",
                &master.symbol,
                format!("open for master position {}", master.id.0),
                reason,
            ),
        }
    }

    fn build_open(
        &self,
        ctx: &ReceiverContext,
        master: &MasterPosition,
        balance: Decimal,
    ) -> Result<CommandKind, String> {
        let master_spec = self
            .master_catalog
            .get(&master.symbol)
            .ok_or_else(|| format!("unknown master symbol {}", master.symbol))?;
        let mapping = ctx
            .mappings
            .resolve(&master_spec, &ctx.catalog)
            .map_err(|e| e.to_string())?;
        let spec = ctx
            .catalog
            .get(&mapping.receiver_symbol)
            .ok_or_else(|| format!("unknown receiver symbol {}", mapping.receiver_symbol))?;
        let symbol_override = ctx.mappings.override_for(&mapping.receiver_symbol);
        let volume = ctx
            .sizer
            .size(&SizeRequest {
                master_volume: master.volume,
                entry_price: master.open_price,
                sl: master.sl,
                receiver_balance: balance,
                spec: &spec,
                symbol_override: symbol_override.as_ref(),
            })
            .map_err(|e| e.to_string())?;
        Ok(CommandKind::Open {
            symbol: mapping.receiver_symbol,
            direction: master.direction,
            volume,
            price: master.open_price,
            sl: master.sl,
            tp: master.tp,
            master_position: master.id,
        })
    }

    /// Gate and dispatch one corrective command, recording the attempt.
    async fn correct(
        &self,
        ctx: &ReceiverContext,
        kind: CommandKind,
        symbol: &str,
        lock_key: PositionId,
        action_type: &str,
    ) -> ReconcileAction {
        let details = format!("corrective {} for master position {}", action_type, lock_key.0);
        let Some(spec) = ctx.catalog.get(symbol) else {
            return ReconcileAction::failure(
                &ctx.id,
                action_type,
                symbol,
                details,
                format!("unknown symbol spec {}", symbol),
            );
        };

        let command = ExecutionCommand::new(ctx.id.clone(), kind);
        let verdict = match self
            .gate
            .evaluate(&command, &spec, None, None, Utc::now())
        {
            Ok(verdict) => verdict,
            Err(e) => {
                return ReconcileAction::failure(&ctx.id, action_type, symbol, details, e.to_string())
            }
        };

        match verdict {
            Verdict::Approved => {
                let max_attempts = match self.gate.retry_settings(&ctx.id) {
                    Ok((_, attempts)) => attempts,
                    Err(e) => {
                        return ReconcileAction::failure(
                            &ctx.id,
                            action_type,
                            symbol,
                            details,
                            e.to_string(),
                        )
                    }
                };
                let _guard = self.locks.acquire(&ctx.id, lock_key).await;
                match dispatch_with_retry(
                    &self.dispatcher,
                    &command,
                    max_attempts,
                    &self.retry_policy,
                )
                .await
                {
                    Ok(()) => ReconcileAction::success(&ctx.id, action_type, symbol, details),
                    Err(e) => ReconcileAction::failure(
                        &ctx.id,
                        action_type,
                        symbol,
                        details,
                        e.to_string(),
                    ),
                }
            }
            Verdict::Queued(id) => ReconcileAction::success(
                &ctx.id,
                action_type,
                symbol,
                format!("{} (queued for confirmation #{})", details, id),
            ),
            Verdict::Skipped(_) => ReconcileAction::failure(
                &ctx.id,
                action_type,
                symbol,
                details,
                "outside trading session",
            ),
            Verdict::Rejected(rejection) => ReconcileAction::failure(
                &ctx.id,
                action_type,
                symbol,
                details,
                rejection.to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use relay_core::{Direction, Lots, Px, ReceiverPosition, SymbolSpec};
    use relay_exec::{
        AccountGateway, BoxFuture, DispatchResult, ExecutionDispatcher, GatewayError,
        GatewayResult,
    };
    use relay_risk::{RUnitPolicy, RiskConfig, RiskMode, RiskSizer};
    use relay_safety::{SafetyConfig, SessionFilter};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    // === Fakes ===

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<ExecutionCommand>>,
    }

    impl RecordingDispatcher {
        fn sent(&self) -> Vec<ExecutionCommand> {
            self.sent.lock().clone()
        }
    }

    impl ExecutionDispatcher for RecordingDispatcher {
        fn dispatch(&self, command: ExecutionCommand) -> BoxFuture<'_, DispatchResult> {
            Box::pin(async move {
                self.sent.lock().push(command);
                DispatchResult::Ack
            })
        }
    }

    struct FakeGateway {
        masters: Mutex<Vec<MasterPosition>>,
        receivers: Mutex<Vec<ReceiverPosition>>,
        fail_positions_for: Mutex<Option<AccountId>>,
    }

    impl FakeGateway {
        fn new() -> Self {
            Self {
                masters: Mutex::new(Vec::new()),
                receivers: Mutex::new(Vec::new()),
                fail_positions_for: Mutex::new(None),
            }
        }
    }

    impl AccountGateway for FakeGateway {
        fn balance(&self, _account: &AccountId) -> BoxFuture<'_, GatewayResult<Decimal>> {
            Box::pin(async move { Ok(dec!(10000)) })
        }

        fn current_price(
            &self,
            _account: &AccountId,
            _symbol: &str,
        ) -> BoxFuture<'_, GatewayResult<Px>> {
            Box::pin(async move { Ok(Px::new(dec!(1.1000))) })
        }

        fn master_positions(
            &self,
            _account: &AccountId,
        ) -> BoxFuture<'_, GatewayResult<Vec<MasterPosition>>> {
            Box::pin(async move { Ok(self.masters.lock().clone()) })
        }

        fn receiver_positions(
            &self,
            account: &AccountId,
        ) -> BoxFuture<'_, GatewayResult<Vec<ReceiverPosition>>> {
            let account = account.clone();
            Box::pin(async move {
                if self.fail_positions_for.lock().as_ref() == Some(&account) {
                    return Err(GatewayError::new(&account, "terminal unreachable"));
                }
                Ok(self.receivers.lock().clone())
            })
        }
    }

    // === Fixtures ===

    fn eurusd() -> SymbolSpec {
        SymbolSpec {
            name: "EURUSD".to_string(),
            tick_value: dec!(1),
            tick_size: dec!(0.00001),
            contract_size: dec!(100000),
            digits: 5,
            min_lot: Lots::new(dec!(0.01)),
            lot_step: Lots::new(dec!(0.01)),
            max_lot: Lots::new(dec!(100)),
            profit_currency: "USD".to_string(),
        }
    }

    fn master_position(id: u64) -> MasterPosition {
        MasterPosition {
            id: PositionId(id),
            symbol: "EURUSD".to_string(),
            direction: Direction::Buy,
            volume: Lots::new(dec!(0.20)),
            open_price: Px::new(dec!(1.1000)),
            sl: Some(Px::new(dec!(1.0950))),
            tp: None,
        }
    }

    fn linked_position(id: u64, master_id: u64) -> ReceiverPosition {
        ReceiverPosition {
            id: PositionId(id),
            symbol: "EURUSD".to_string(),
            direction: Direction::Buy,
            volume: Lots::new(dec!(0.20)),
            open_price: Px::new(dec!(1.1000)),
            sl: Some(Px::new(dec!(1.0950))),
            tp: None,
            master_position: Some(PositionId(master_id)),
        }
    }

    struct Harness {
        engine: Arc<ReconcileEngine>,
        dispatcher: Arc<RecordingDispatcher>,
        gateway: Arc<FakeGateway>,
    }

    fn harness(policy: ReconcilePolicy, receiver_ids: &[&str]) -> Harness {
        let master_catalog = Arc::new(SymbolCatalog::new());
        master_catalog.replace_all(vec![eurusd()]);

        let gate = Arc::new(SafetyGate::new(SessionFilter::default(), None).unwrap());
        let mut receivers = Vec::new();
        for id in receiver_ids {
            let catalog = Arc::new(SymbolCatalog::new());
            catalog.replace_all(vec![eurusd()]);
            gate.register_receiver(AccountId::from(*id), SafetyConfig::default())
                .unwrap();
            receivers.push(Arc::new(ReceiverContext {
                id: AccountId::from(*id),
                sizer: RiskSizer::new(RiskConfig {
                    mode: RiskMode::LotMultiplier,
                    value: dec!(1),
                    r_unit: RUnitPolicy::default(),
                })
                .unwrap(),
                mappings: Arc::new(relay_symbols::MappingTable::new()),
                catalog,
            }));
        }

        let dispatcher = Arc::new(RecordingDispatcher::default());
        let gateway = Arc::new(FakeGateway::new());
        let engine = Arc::new(
            ReconcileEngine::new(
                policy,
                AccountId::from("master-1"),
                master_catalog,
                receivers,
                gate,
                dispatcher.clone(),
                gateway.clone(),
                Arc::new(KeyedLocks::new()),
                RetryPolicy {
                    base_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(2),
                },
            )
            .unwrap(),
        );

        Harness {
            engine,
            dispatcher,
            gateway,
        }
    }

    fn stats(result: CycleResult) -> CycleStats {
        match result {
            CycleResult::Completed(stats) => stats,
            CycleResult::Skipped => panic!("cycle unexpectedly skipped"),
        }
    }

    // === Tests ===

    #[tokio::test]
    async fn test_clean_state_yields_no_actions() {
        let h = harness(ReconcilePolicy::default(), &["recv-1"]);
        h.gateway.masters.lock().push(master_position(42));
        h.gateway.receivers.lock().push(linked_position(700, 42));

        let stats = stats(h.engine.run_cycle().await.unwrap());
        assert_eq!(stats.discrepancies, 0);
        assert!(h.dispatcher.sent().is_empty());
        assert!(h.engine.history().is_empty());
    }

    #[tokio::test]
    async fn test_orphan_closed_once_when_enabled() {
        let policy = ReconcilePolicy {
            auto_close_orphaned: true,
            ..Default::default()
        };
        let h = harness(policy, &["recv-1"]);
        // Receiver holds a position linked to master 42, which is gone.
        h.gateway.receivers.lock().push(linked_position(700, 42));

        let stats = stats(h.engine.run_cycle().await.unwrap());
        assert_eq!(stats.discrepancies, 1);
        assert_eq!(stats.actions_attempted, 1);
        assert_eq!(stats.actions_failed, 0);

        let sent = h.dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            sent[0].kind,
            CommandKind::Close {
                position: PositionId(700),
                ..
            }
        ));

        let actions = h.engine.history().recent(10);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, "close");
        assert!(actions[0].success);
    }

    #[tokio::test]
    async fn test_orphan_detect_only_by_default() {
        let h = harness(ReconcilePolicy::default(), &["recv-1"]);
        h.gateway.receivers.lock().push(linked_position(700, 42));

        let stats = stats(h.engine.run_cycle().await.unwrap());
        assert_eq!(stats.discrepancies, 1);
        assert_eq!(stats.actions_attempted, 0);
        assert!(h.dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_not_opened_until_enabled() {
        let h = harness(ReconcilePolicy::default(), &["recv-1"]);
        h.gateway.masters.lock().push(master_position(42));

        for _ in 0..3 {
            let stats = stats(h.engine.run_cycle().await.unwrap());
            assert_eq!(stats.discrepancies, 1);
        }
        assert!(h.dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_opened_once_then_linked() {
        let policy = ReconcilePolicy {
            auto_open_missing: true,
            ..Default::default()
        };
        let h = harness(policy, &["recv-1"]);
        h.gateway.masters.lock().push(master_position(42));

        let first = stats(h.engine.run_cycle().await.unwrap());
        assert_eq!(first.discrepancies, 1);
        let sent = h.dispatcher.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0].kind {
            CommandKind::Open {
                volume,
                master_position,
                ..
            } => {
                assert_eq!(*volume, Lots::new(dec!(0.20)));
                assert_eq!(*master_position, PositionId(42));
            }
            other => panic!("expected open command, got {:?}", other),
        }

        // Linkage now recorded: the next cycle sees a clean pair.
        h.gateway.receivers.lock().push(linked_position(700, 42));
        let second = stats(h.engine.run_cycle().await.unwrap());
        assert_eq!(second.discrepancies, 0);
        assert_eq!(h.dispatcher.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_volume_drift_adjusted_when_enabled() {
        let policy = ReconcilePolicy {
            auto_adjust_volume: true,
            ..Default::default()
        };
        let h = harness(policy, &["recv-1"]);
        h.gateway.masters.lock().push(master_position(42));
        let mut pos = linked_position(700, 42);
        pos.volume = Lots::new(dec!(0.50));
        h.gateway.receivers.lock().push(pos);

        let stats = stats(h.engine.run_cycle().await.unwrap());
        assert_eq!(stats.discrepancies, 1);
        let sent = h.dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            sent[0].kind,
            CommandKind::ModifyVolume {
                position: PositionId(700),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_direction_mismatch_never_corrected() {
        let policy = ReconcilePolicy {
            auto_close_orphaned: true,
            auto_open_missing: true,
            auto_adjust_volume: true,
            auto_sync_sl_tp: true,
            ..Default::default()
        };
        let h = harness(policy, &["recv-1"]);
        h.gateway.masters.lock().push(master_position(42));
        let mut pos = linked_position(700, 42);
        pos.direction = Direction::Sell;
        h.gateway.receivers.lock().push(pos);

        let stats = stats(h.engine.run_cycle().await.unwrap());
        assert_eq!(stats.discrepancies, 1);
        assert!(h.dispatcher.sent().is_empty());

        let actions = h.engine.history().recent(10);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, "manual_review");
    }

    #[tokio::test]
    async fn test_receiver_failure_does_not_abort_cycle() {
        let policy = ReconcilePolicy {
            auto_close_orphaned: true,
            ..Default::default()
        };
        let h = harness(policy, &["recv-1", "recv-2"]);
        *h.gateway.fail_positions_for.lock() = Some(AccountId::from("recv-1"));
        h.gateway.receivers.lock().push(linked_position(700, 42));

        let stats = stats(h.engine.run_cycle().await.unwrap());
        assert_eq!(stats.receivers_failed, 1);
        // recv-2 still reconciled and closed its orphan.
        assert_eq!(h.dispatcher.sent().len(), 1);
        assert_eq!(h.dispatcher.sent()[0].receiver, AccountId::from("recv-2"));
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let h = harness(ReconcilePolicy::default(), &["recv-1"]);
        assert!(h
            .engine
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok());
        let result = h.engine.run_cycle().await.unwrap();
        assert_eq!(result, CycleResult::Skipped);
        h.engine.in_flight.store(false, Ordering::Release);
    }

    #[tokio::test]
    async fn test_disabled_policy_skips() {
        let policy = ReconcilePolicy {
            enabled: false,
            ..Default::default()
        };
        let h = harness(policy, &["recv-1"]);
        h.gateway.receivers.lock().push(linked_position(700, 42));
        assert_eq!(h.engine.run_cycle().await.unwrap(), CycleResult::Skipped);
        assert!(h.dispatcher.sent().is_empty());
    }
}
