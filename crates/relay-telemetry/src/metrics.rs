//! Prometheus metrics for the relay.
//!
//! Covers the observability surface:
//! - Signal outcomes per receiver decision
//! - Dispatch results and retries
//! - Idempotency store size
//! - Reconciliation cycles and discrepancies
//! - Safety gate state and manual-confirm queue depth
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration
//! failure means a duplicate metric name, a fatal configuration error
//! that should crash at startup rather than fail silently. These panics
//! only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_counter,
    register_int_gauge, CounterVec, GaugeVec, HistogramVec, IntCounter, IntGauge,
};

/// Signal outcomes per receiver.
/// Labels: result (dispatched/duplicate/in_flight/rejected/skipped/queued/failed)
pub static SIGNALS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_signals_total",
        "Total per-receiver signal outcomes",
        &["result"]
    )
    .unwrap()
});

/// Dispatch attempts reaching a terminal result.
/// Labels: kind (open/close/modify_volume/modify_sltp), result (ack/fatal/exhausted)
pub static DISPATCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_dispatch_total",
        "Total dispatched commands by terminal result",
        &["kind", "result"]
    )
    .unwrap()
});

/// Total retry attempts (dispatch transients and slippage re-checks).
pub static RETRY_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("relay_retry_total", "Total retry attempts").unwrap()
});

/// Keys currently held in the idempotency store.
pub static IDEMPOTENCY_KEYS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "relay_idempotency_keys",
        "Keys currently retained in the idempotency store"
    )
    .unwrap()
});

/// Reconciliation cycles completed.
/// Labels: result (clean/discrepancies/error/skipped)
pub static RECONCILE_CYCLES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_reconcile_cycles_total",
        "Total reconciliation cycles by result",
        &["result"]
    )
    .unwrap()
});

/// Discrepancies detected during reconciliation.
/// Labels: kind (missing_on_receiver/orphan_on_receiver/volume_mismatch/
/// sltp_mismatch/direction_mismatch)
pub static DISCREPANCIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_discrepancies_total",
        "Total discrepancies detected during reconciliation",
        &["kind"]
    )
    .unwrap()
});

/// Current reconciliation phase (0=idle, 1=fetching, 2=classifying, 3=acting).
pub static RECONCILE_PHASE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "relay_reconcile_phase",
        "Current reconciliation cycle phase (0=idle, 1=fetching, 2=classifying, 3=acting)"
    )
    .unwrap()
});

/// Halt state per receiver (1=halted, 0=active).
pub static RECEIVER_HALTED: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "relay_receiver_halted",
        "Safety gate halt state per receiver (1=halted)",
        &["receiver"]
    )
    .unwrap()
});

/// Commands awaiting manual confirmation.
pub static PENDING_CONFIRMS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "relay_pending_confirms",
        "Commands queued for manual confirmation"
    )
    .unwrap()
});

/// Dispatch latency in milliseconds, from gate approval to terminal result.
pub static DISPATCH_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "relay_dispatch_latency_ms",
        "Dispatch latency in milliseconds",
        &["kind"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a per-receiver signal outcome.
    pub fn signal_outcome(result: &str) {
        SIGNALS_TOTAL.with_label_values(&[result]).inc();
    }

    /// Record a reconciliation cycle result.
    pub fn reconcile_cycle(result: &str) {
        RECONCILE_CYCLES_TOTAL.with_label_values(&[result]).inc();
    }

    /// Record a detected discrepancy.
    pub fn discrepancy(kind: &str) {
        DISCREPANCIES_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Set a receiver's halt state.
    pub fn receiver_halted(receiver: &str, halted: bool) {
        RECEIVER_HALTED
            .with_label_values(&[receiver])
            .set(if halted { 1.0 } else { 0.0 });
    }

    /// Update the manual-confirm queue depth.
    pub fn pending_confirms(count: i64) {
        PENDING_CONFIRMS.set(count);
    }

    /// Record dispatch latency.
    pub fn dispatch_latency(kind: &str, latency_ms: f64) {
        DISPATCH_LATENCY_MS
            .with_label_values(&[kind])
            .observe(latency_ms);
    }
}
