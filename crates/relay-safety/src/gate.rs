//! Per-receiver safety gate.

use crate::config::SafetyConfig;
use crate::error::{SafetyError, SafetyResult};
use crate::session::SessionFilter;
use crate::store::StateStore;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use relay_core::{AccountId, ExecutionCommand, Px, SymbolSpec};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// HaltReason
// ============================================================================

/// Why a receiver was flipped to Halted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaltReason {
    /// Cumulative daily realized loss reached the limit.
    DailyLoss { loss_r: Decimal, limit: Decimal },
    /// Equity drawdown reached the limit.
    Drawdown { percent: Decimal, limit: Decimal },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DailyLoss { loss_r, limit } => {
                write!(f, "daily loss {}R reached limit {}R", loss_r, limit)
            }
            Self::Drawdown { percent, limit } => {
                write!(f, "drawdown {}% reached limit {}%", percent, limit)
            }
        }
    }
}

// ============================================================================
// ReceiverSnapshot
// ============================================================================

/// Persisted per-receiver counters and halt state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiverSnapshot {
    /// Trading-day key the counters belong to; a new key resets them.
    pub period_key: String,
    /// Net realized loss this period, in R-multiples (profit reduces it).
    pub realized_loss_r: Decimal,
    /// Balance at period start, seeded by the first equity update.
    pub period_start_balance: Option<Decimal>,
    /// Equity high-water mark; survives rollover for trailing drawdown.
    pub equity_high_water: Option<Decimal>,
    pub halt: Option<HaltReason>,
    pub halted_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Verdicts
// ============================================================================

/// Safety rejection of a single instruction. A verdict, not an exception:
/// the signal is dropped and reported.
#[derive(Debug, Clone, PartialEq)]
pub enum SafetyRejection {
    /// Receiver is halted; new-open instructions are refused.
    Halted {
        receiver: AccountId,
        reason: HaltReason,
    },
    /// Price moved too far from the signal price.
    Slippage {
        receiver: AccountId,
        symbol: String,
        observed_pips: Decimal,
        max_pips: Decimal,
        /// Retry allowed per the receiver's retry settings.
        retryable: bool,
    },
}

impl SafetyRejection {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Slippage { retryable: true, .. })
    }
}

impl fmt::Display for SafetyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Halted { receiver, reason } => {
                write!(f, "receiver {} halted: {}", receiver, reason)
            }
            Self::Slippage {
                receiver,
                symbol,
                observed_pips,
                max_pips,
                ..
            } => write!(
                f,
                "receiver {} {}: slippage {} pips exceeds {} pips",
                receiver, symbol, observed_pips, max_pips
            ),
        }
    }
}

/// Why an instruction was silently skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OutsideSession,
}

/// Gate decision for one instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Approved,
    /// Queued for manual approval under this confirmation id.
    Queued(u64),
    /// Silently skipped; not an error and not reported as one.
    Skipped(SkipReason),
    Rejected(SafetyRejection),
}

/// An instruction awaiting manual approval.
#[derive(Debug, Clone)]
pub struct PendingConfirm {
    pub id: u64,
    pub receiver: AccountId,
    pub command: ExecutionCommand,
    pub queued_at: DateTime<Utc>,
}

// ============================================================================
// SafetyGate
// ============================================================================

struct ReceiverEntry {
    config: SafetyConfig,
    state: Mutex<ReceiverSnapshot>,
}

/// Per-receiver Active/Halted state machine plus instruction checks.
///
/// Each receiver's counters live behind their own lock in a concurrent map,
/// so a halted or slow receiver never contends with the others.
pub struct SafetyGate {
    receivers: DashMap<AccountId, Arc<ReceiverEntry>>,
    session: SessionFilter,
    store: Option<StateStore>,
    pending: DashMap<u64, PendingConfirm>,
    next_confirm_id: AtomicU64,
    /// State loaded from disk, applied as receivers register.
    restored: Mutex<HashMap<AccountId, ReceiverSnapshot>>,
}

impl SafetyGate {
    /// Create a gate, restoring any persisted halt state from the store.
    pub fn new(session: SessionFilter, store: Option<StateStore>) -> SafetyResult<Self> {
        let restored = match &store {
            Some(s) => s.load()?,
            None => HashMap::new(),
        };
        Ok(Self {
            receivers: DashMap::new(),
            session,
            store,
            pending: DashMap::new(),
            next_confirm_id: AtomicU64::new(1),
            restored: Mutex::new(restored),
        })
    }

    /// Register a receiver with its resolved safety config.
    ///
    /// Persisted state for the receiver, if any, is restored here — a
    /// receiver halted before a restart comes back halted.
    pub fn register_receiver(&self, receiver: AccountId, config: SafetyConfig) -> SafetyResult<()> {
        config.validate()?;
        let snapshot = self
            .restored
            .lock()
            .remove(&receiver)
            .unwrap_or_default();
        if let Some(reason) = &snapshot.halt {
            warn!(receiver = %receiver, %reason, "Receiver restored in halted state");
        }
        self.receivers.insert(
            receiver,
            Arc::new(ReceiverEntry {
                config,
                state: Mutex::new(snapshot),
            }),
        );
        Ok(())
    }

    fn entry(&self, receiver: &AccountId) -> SafetyResult<Arc<ReceiverEntry>> {
        self.receivers
            .get(receiver)
            .map(|e| e.clone())
            .ok_or_else(|| SafetyError::UnknownReceiver(receiver.to_string()))
    }

    /// Evaluate one instruction.
    ///
    /// `signal_price`/`current_price` drive the slippage check and may be
    /// omitted for instructions without a reference price (close, SL/TP
    /// sync).
    pub fn evaluate(
        &self,
        command: &ExecutionCommand,
        spec: &SymbolSpec,
        signal_price: Option<Px>,
        current_price: Option<Px>,
        now: DateTime<Utc>,
    ) -> SafetyResult<Verdict> {
        let entry = self.entry(&command.receiver)?;

        // Halt check, with rollover applied first.
        let halt = {
            let mut state = entry.state.lock();
            self.roll_period(&command.receiver, &entry.config, &mut state, now);
            state.halt.clone()
        };
        if let Some(reason) = halt {
            if command.kind.opens_exposure() {
                return Ok(Verdict::Rejected(SafetyRejection::Halted {
                    receiver: command.receiver.clone(),
                    reason,
                }));
            }
            // Close/modify of existing positions pass through while halted.
        }

        // Session filter: outside all allowed windows is a silent skip.
        if !self.session.in_session(now) {
            debug!(
                receiver = %command.receiver,
                kind = command.kind.as_str(),
                "Instruction outside allowed sessions, skipped"
            );
            return Ok(Verdict::Skipped(SkipReason::OutsideSession));
        }

        // Slippage check, independent of halt state.
        if let (Some(signal), Some(current)) = (signal_price, current_price) {
            let observed = spec.pips_between(signal, current);
            if observed > entry.config.max_slippage_pips {
                return Ok(Verdict::Rejected(SafetyRejection::Slippage {
                    receiver: command.receiver.clone(),
                    symbol: spec.name.clone(),
                    observed_pips: observed,
                    max_pips: entry.config.max_slippage_pips,
                    retryable: entry.config.enable_retry,
                }));
            }
        }

        if entry.config.manual_confirm {
            let id = self.next_confirm_id.fetch_add(1, Ordering::SeqCst);
            self.pending.insert(
                id,
                PendingConfirm {
                    id,
                    receiver: command.receiver.clone(),
                    command: command.clone(),
                    queued_at: now,
                },
            );
            info!(
                receiver = %command.receiver,
                confirm_id = id,
                kind = command.kind.as_str(),
                "Instruction queued for manual confirmation"
            );
            return Ok(Verdict::Queued(id));
        }

        Ok(Verdict::Approved)
    }

    /// Record a confirmed realized outcome, in R-multiples.
    ///
    /// Losses accumulate toward the daily limit; profit offsets them.
    /// Called only on confirmed execution outcomes.
    pub fn record_realized(
        &self,
        receiver: &AccountId,
        realized_r: Decimal,
        now: DateTime<Utc>,
    ) -> SafetyResult<()> {
        let entry = self.entry(receiver)?;
        {
            let mut state = entry.state.lock();
            self.roll_period(receiver, &entry.config, &mut state, now);
            state.realized_loss_r -= realized_r;
            if state.halt.is_none() && state.realized_loss_r >= entry.config.max_daily_loss_r {
                let reason = HaltReason::DailyLoss {
                    loss_r: state.realized_loss_r,
                    limit: entry.config.max_daily_loss_r,
                };
                warn!(receiver = %receiver, %reason, "Receiver halted");
                state.halt = Some(reason);
                state.halted_at = Some(now);
            }
        }
        self.persist();
        Ok(())
    }

    /// Record a receiver equity observation and apply the drawdown limit.
    pub fn record_equity(
        &self,
        receiver: &AccountId,
        equity: Decimal,
        now: DateTime<Utc>,
    ) -> SafetyResult<()> {
        let entry = self.entry(receiver)?;
        {
            let mut state = entry.state.lock();
            self.roll_period(receiver, &entry.config, &mut state, now);

            if state.period_start_balance.is_none() {
                state.period_start_balance = Some(equity);
            }
            let hwm = state.equity_high_water.get_or_insert(equity);
            if equity > *hwm {
                *hwm = equity;
            }

            let reference = if entry.config.trailing_drawdown {
                state.equity_high_water.unwrap_or(equity)
            } else {
                state.period_start_balance.unwrap_or(equity)
            };
            if reference > Decimal::ZERO && state.halt.is_none() {
                let drawdown = (reference - equity) / reference * Decimal::from(100);
                if drawdown >= entry.config.max_drawdown_percent {
                    let reason = HaltReason::Drawdown {
                        percent: drawdown.round_dp(2),
                        limit: entry.config.max_drawdown_percent,
                    };
                    warn!(receiver = %receiver, %reason, "Receiver halted");
                    state.halt = Some(reason);
                    state.halted_at = Some(now);
                }
            }
        }
        self.persist();
        Ok(())
    }

    /// Whether a receiver is currently halted (after rollover at `now`).
    pub fn is_halted(&self, receiver: &AccountId, now: DateTime<Utc>) -> bool {
        match self.entry(receiver) {
            Ok(entry) => {
                let mut state = entry.state.lock();
                self.roll_period(receiver, &entry.config, &mut state, now);
                state.halt.is_some()
            }
            Err(_) => false,
        }
    }

    /// Resolved retry settings for a receiver.
    pub fn retry_settings(&self, receiver: &AccountId) -> SafetyResult<(bool, u32)> {
        let entry = self.entry(receiver)?;
        Ok((entry.config.enable_retry, entry.config.max_retry_attempts))
    }

    /// Instructions currently queued for manual approval.
    pub fn pending_confirms(&self) -> Vec<PendingConfirm> {
        let mut items: Vec<_> = self.pending.iter().map(|e| e.value().clone()).collect();
        items.sort_by_key(|p| p.id);
        items
    }

    /// Approve a queued instruction, handing it back for dispatch.
    pub fn approve(&self, confirm_id: u64) -> Option<ExecutionCommand> {
        self.pending.remove(&confirm_id).map(|(_, p)| {
            info!(confirm_id, receiver = %p.receiver, "Manual confirmation approved");
            p.command
        })
    }

    /// Discard a queued instruction.
    pub fn reject(&self, confirm_id: u64) -> bool {
        let removed = self.pending.remove(&confirm_id).is_some();
        if removed {
            info!(confirm_id, "Manual confirmation rejected");
        }
        removed
    }

    /// Trading-day key for a timestamp under the receiver's rollover hour.
    fn period_key(rollover_hour_utc: u32, now: DateTime<Utc>) -> String {
        (now - Duration::hours(rollover_hour_utc as i64))
            .date_naive()
            .to_string()
    }

    /// Apply period rollover: a new trading day clears halt state and the
    /// daily counters. The equity high-water mark survives.
    fn roll_period(
        &self,
        receiver: &AccountId,
        config: &SafetyConfig,
        state: &mut ReceiverSnapshot,
        now: DateTime<Utc>,
    ) {
        let key = Self::period_key(config.rollover_hour_utc, now);
        if state.period_key == key {
            return;
        }
        if !state.period_key.is_empty() {
            info!(
                receiver = %receiver,
                previous = %state.period_key,
                current = %key,
                was_halted = state.halt.is_some(),
                "Period rollover"
            );
        }
        state.period_key = key;
        state.realized_loss_r = Decimal::ZERO;
        state.period_start_balance = None;
        state.halt = None;
        state.halted_at = None;
    }

    /// Write the current state of all receivers through the store.
    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let mut states = HashMap::new();
        for entry in self.receivers.iter() {
            states.insert(entry.key().clone(), entry.value().state.lock().clone());
        }
        if let Err(e) = store.save(&states) {
            warn!(error = %e, "Failed to persist safety state");
        }
    }
}
