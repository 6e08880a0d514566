//! Prometheus metrics and structured logging for the relay.
//!
//! - Counters and gauges for signal outcomes, dispatch results,
//!   reconciliation cycles and safety state
//! - Structured JSON logging with tracing

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{
    Metrics, DISCREPANCIES_TOTAL, DISPATCH_LATENCY_MS, DISPATCH_TOTAL, IDEMPOTENCY_KEYS,
    PENDING_CONFIRMS, RECEIVER_HALTED, RECONCILE_CYCLES_TOTAL, RECONCILE_PHASE, RETRY_TOTAL,
    SIGNALS_TOTAL,
};
