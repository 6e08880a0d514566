//! Main application orchestration.
//!
//! Builds catalogs, per-receiver sizing and safety state, the signal
//! pipeline and the reconcile engine, then runs the event loop: signal
//! channel, reconcile timer, idempotency eviction, ctrl_c shutdown.

use crate::config::AppConfig;
use crate::error::AppResult;
use chrono::Utc;
use relay_core::{AccountId, TradeSignal};
use relay_exec::{
    DynDispatcher, DynGateway, IdempotencyStore, KeyedLocks, ReceiverContext, RetentionConfig,
    RetryPolicy, SignalPipeline,
};
use relay_reconcile::ReconcileEngine;
use relay_risk::RiskSizer;
use relay_safety::{SafetyGate, StateStore};
use relay_symbols::{MappingTable, SymbolCatalog};
use relay_telemetry::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Idempotency eviction sweep interval.
const EVICT_INTERVAL: Duration = Duration::from_secs(60);

/// The wired-up relay.
pub struct Application {
    config: AppConfig,
    master_catalog: Arc<SymbolCatalog>,
    receivers: Vec<Arc<ReceiverContext>>,
    gate: Arc<SafetyGate>,
    store: Arc<IdempotencyStore>,
    pipeline: Arc<SignalPipeline>,
    engine: Arc<ReconcileEngine>,
    signal_tx: mpsc::Sender<TradeSignal>,
    signal_rx: Option<mpsc::Receiver<TradeSignal>>,
}

impl Application {
    /// Build the engine from a validated config and a transport pair.
    pub fn new(
        config: AppConfig,
        dispatcher: DynDispatcher,
        gateway: DynGateway,
    ) -> AppResult<Self> {
        config.validate()?;

        let state_store = config.state_file.as_ref().map(StateStore::new);
        let gate = Arc::new(SafetyGate::new(config.session.clone(), state_store)?);

        let master_catalog = Arc::new(SymbolCatalog::new());
        let mut receivers = Vec::with_capacity(config.receivers.len());
        for receiver in &config.receivers {
            let id = AccountId::from(receiver.id.as_str());
            gate.register_receiver(id.clone(), config.safety_for(receiver))?;
            receivers.push(Arc::new(ReceiverContext {
                id,
                sizer: RiskSizer::new(config.risk_for(receiver))?,
                mappings: Arc::new(MappingTable::load(
                    receiver.mappings.clone(),
                    receiver.overrides.clone(),
                )),
                catalog: Arc::new(SymbolCatalog::new()),
            }));
        }

        let store = Arc::new(IdempotencyStore::new(RetentionConfig::default()));
        let locks = Arc::new(KeyedLocks::new());
        let retry_policy = RetryPolicy::default();

        let pipeline = Arc::new(SignalPipeline::new(
            master_catalog.clone(),
            receivers.clone(),
            gate.clone(),
            store.clone(),
            dispatcher.clone(),
            gateway.clone(),
            locks.clone(),
            retry_policy.clone(),
        ));

        let engine = Arc::new(ReconcileEngine::new(
            config.reconcile.clone(),
            AccountId::from(config.master_account.as_str()),
            master_catalog.clone(),
            receivers.clone(),
            gate.clone(),
            dispatcher,
            gateway,
            locks,
            retry_policy,
        )?);

        let (signal_tx, signal_rx) = mpsc::channel(config.channel_capacity);

        Ok(Self {
            config,
            master_catalog,
            receivers,
            gate,
            store,
            pipeline,
            engine,
            signal_tx,
            signal_rx: Some(signal_rx),
        })
    }

    /// Sender the transport feeds incoming master signals into.
    #[must_use]
    pub fn signal_sender(&self) -> mpsc::Sender<TradeSignal> {
        self.signal_tx.clone()
    }

    /// Master symbol catalog, to be populated by the transport.
    #[must_use]
    pub fn master_catalog(&self) -> &Arc<SymbolCatalog> {
        &self.master_catalog
    }

    /// A receiver's symbol catalog, to be populated by the transport.
    #[must_use]
    pub fn receiver_catalog(&self, id: &AccountId) -> Option<Arc<SymbolCatalog>> {
        self.receivers
            .iter()
            .find(|r| &r.id == id)
            .map(|r| r.catalog.clone())
    }

    #[must_use]
    pub fn safety_gate(&self) -> &Arc<SafetyGate> {
        &self.gate
    }

    #[must_use]
    pub fn reconcile_engine(&self) -> &Arc<ReconcileEngine> {
        &self.engine
    }

    /// Run the event loop until ctrl_c.
    pub async fn run(mut self) -> AppResult<()> {
        let mut signal_rx = self
            .signal_rx
            .take()
            .expect("run called twice on the same application");

        info!(
            master = %self.config.master_account,
            receivers = self.receivers.len(),
            reconcile_enabled = self.config.reconcile.enabled,
            "Starting relay"
        );

        let mut reconcile_interval =
            tokio::time::interval(Duration::from_secs(self.config.reconcile.interval_secs));
        let mut evict_interval = tokio::time::interval(EVICT_INTERVAL);
        let mut signal_count = 0u64;

        loop {
            tokio::select! {
                Some(signal) = signal_rx.recv() => {
                    signal_count += 1;
                    debug!(
                        event = %signal.event_id,
                        symbol = %signal.symbol,
                        kind = signal.event.as_str(),
                        "Signal received (#{signal_count})"
                    );
                    let results = self.pipeline.clone().process(signal).await;
                    for (receiver, outcome) in &results {
                        debug!(receiver = %receiver, ?outcome, "Receiver outcome");
                    }
                }

                _ = reconcile_interval.tick() => {
                    if let Err(e) = self.engine.run_cycle().await {
                        warn!(error = %e, "Reconcile cycle error");
                    }
                    self.refresh_safety_metrics();
                }

                _ = evict_interval.tick() => {
                    self.store.evict();
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!(signal_count, "Shutting down");
        Ok(())
    }

    fn refresh_safety_metrics(&self) {
        let now = Utc::now();
        for receiver in &self.receivers {
            Metrics::receiver_halted(receiver.id.as_str(), self.gate.is_halted(&receiver.id, now));
        }
        Metrics::pending_confirms(self.gate.pending_confirms().len() as i64);
    }
}
