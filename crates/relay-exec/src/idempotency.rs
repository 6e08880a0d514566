//! Signal deduplication via reserve-then-commit.
//!
//! `check_and_reserve` is atomic per key: concurrent callers with the same
//! key cannot both observe `Fresh`. The caller that wins the reservation
//! proceeds and later records the outcome as a separate step, so a crash
//! between reserve and commit leaves a detectable in-flight entry rather
//! than a silent duplicate or loss.
//!
//! Retention is bounded (TTL plus an entry cap). Once a key is evicted, a
//! repeated signal with the same key is treated as fresh again — an accepted
//! tradeoff for bounded memory, not a bug.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use relay_core::{AccountId, EventId, SignalEvent};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Dedup key: stable hash of (event id, receiver id, event kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(u64);

impl IdempotencyKey {
    #[must_use]
    pub fn new(event_id: &EventId, receiver: &AccountId, event: SignalEvent) -> Self {
        let mut hasher = DefaultHasher::new();
        event_id.as_str().hash(&mut hasher);
        receiver.as_str().hash(&mut hasher);
        event.as_str().hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Terminal outcome of handling a signal for one receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Dispatched,
    /// Dropped by mapping, sizing or safety; reason recorded for reporting.
    Rejected(String),
    /// Deliberately not acted on (e.g. outside session).
    Skipped(String),
    /// Queued for manual confirmation under this id.
    Queued(u64),
    Failed(String),
}

/// Result of a reservation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// Key unseen (or evicted); caller owns it and must record an outcome.
    Fresh,
    /// Another caller holds a live reservation for this key.
    InFlight,
    /// Key already completed within the retention window.
    AlreadyHandled(Outcome),
}

#[derive(Debug, Clone)]
enum EntryState {
    Reserved { at: Instant },
    Completed { outcome: Outcome, at: Instant },
}

/// Retention bounds for the store.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// How long completed outcomes are remembered.
    pub ttl: Duration,
    /// Reservations older than this are considered abandoned (crash between
    /// reserve and commit) and are re-opened.
    pub stale_reservation_ttl: Duration,
    /// Hard cap on stored keys; oldest completed entries evict first.
    pub max_entries: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            stale_reservation_ttl: Duration::from_secs(120),
            max_entries: 100_000,
        }
    }
}

/// Bounded dedup store.
pub struct IdempotencyStore {
    entries: DashMap<IdempotencyKey, EntryState>,
    retention: RetentionConfig,
}

impl IdempotencyStore {
    #[must_use]
    pub fn new(retention: RetentionConfig) -> Self {
        Self {
            entries: DashMap::new(),
            retention,
        }
    }

    /// Atomically reserve a key.
    ///
    /// The entry lock is held for the duration of the check, so two callers
    /// racing on the same key serialize here and only one sees `Fresh`.
    pub fn check_and_reserve(&self, key: IdempotencyKey) -> Reservation {
        let now = Instant::now();
        match self.entries.entry(key) {
            Entry::Vacant(vacant) => {
                vacant.insert(EntryState::Reserved { at: now });
                trace!(?key, "Reserved fresh key");
                Reservation::Fresh
            }
            Entry::Occupied(mut occupied) => match occupied.get().clone() {
                EntryState::Reserved { at } => {
                    if now.duration_since(at) > self.retention.stale_reservation_ttl {
                        warn!(?key, "Re-opening stale reservation");
                        occupied.insert(EntryState::Reserved { at: now });
                        Reservation::Fresh
                    } else {
                        Reservation::InFlight
                    }
                }
                EntryState::Completed { outcome, at } => {
                    if now.duration_since(at) > self.retention.ttl {
                        occupied.insert(EntryState::Reserved { at: now });
                        Reservation::Fresh
                    } else {
                        Reservation::AlreadyHandled(outcome)
                    }
                }
            },
        }
    }

    /// Commit the outcome for a reserved key.
    pub fn record_outcome(&self, key: IdempotencyKey, outcome: Outcome) {
        self.entries.insert(
            key,
            EntryState::Completed {
                outcome,
                at: Instant::now(),
            },
        );
        relay_telemetry::IDEMPOTENCY_KEYS.set(self.entries.len() as i64);
    }

    /// Number of keys currently retained. Part of the observability surface.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Drop expired entries and enforce the entry cap.
    ///
    /// Intended to run periodically; dispatch paths never pay for it.
    pub fn evict(&self) {
        let now = Instant::now();
        let before = self.entries.len();

        self.entries.retain(|_, state| match state {
            EntryState::Completed { at, .. } => {
                now.duration_since(*at) <= self.retention.ttl
            }
            EntryState::Reserved { at } => {
                now.duration_since(*at) <= self.retention.stale_reservation_ttl
            }
        });

        let len = self.entries.len();
        if len > self.retention.max_entries {
            // Over cap even after TTL expiry: shed the oldest completed
            // entries first.
            let mut completed: Vec<(IdempotencyKey, Instant)> = self
                .entries
                .iter()
                .filter_map(|e| match e.value() {
                    EntryState::Completed { at, .. } => Some((*e.key(), *at)),
                    EntryState::Reserved { .. } => None,
                })
                .collect();
            completed.sort_by_key(|(_, at)| *at);
            let excess = len - self.retention.max_entries;
            for (key, _) in completed.into_iter().take(excess) {
                self.entries.remove(&key);
            }
        }

        let after = self.entries.len();
        if after != before {
            debug!(before, after, "Idempotency eviction pass");
        }
        relay_telemetry::IDEMPOTENCY_KEYS.set(after as i64);
    }
}
