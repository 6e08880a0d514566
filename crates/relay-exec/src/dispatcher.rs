//! Execution dispatcher trait and retry wrapper.
//!
//! The transport that carries commands to each account's execution agent is
//! external; this module defines the boundary and the bounded retry policy
//! applied in front of it.

use crate::error::{ExecError, ExecResult};
use relay_core::ExecutionCommand;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Result of a single dispatch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    /// Command accepted by the execution agent.
    Ack,
    /// Temporary failure (timeout, agent busy); eligible for retry.
    Transient(String),
    /// Permanent rejection (e.g. invalid stops); never retried.
    Fatal(String),
}

impl DispatchResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ack)
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Outbound command boundary.
///
/// Implementations deliver a command to one receiver's execution agent and
/// report the attempt result. They must be safe to call concurrently for
/// different receivers.
pub trait ExecutionDispatcher: Send + Sync {
    fn dispatch(&self, command: ExecutionCommand) -> BoxFuture<'_, DispatchResult>;
}

/// Arc wrapper for dispatcher trait objects.
pub type DynDispatcher = Arc<dyn ExecutionDispatcher>;

/// Exponential backoff settings for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        exp.min(self.max_delay)
    }
}

/// Dispatch a command, retrying transient failures up to `max_attempts`.
///
/// Fatal results surface immediately. The retry loop only delays the signal
/// it belongs to; callers run per-receiver, so one receiver's retries never
/// stall another's dispatches.
pub async fn dispatch_with_retry(
    dispatcher: &DynDispatcher,
    command: &ExecutionCommand,
    max_attempts: u32,
    policy: &RetryPolicy,
) -> ExecResult<()> {
    let attempts = max_attempts.max(1);
    let mut last_reason = String::new();
    let started = std::time::Instant::now();

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = policy.delay_for(attempt - 1);
            debug!(
                receiver = %command.receiver,
                kind = command.kind.as_str(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying dispatch"
            );
            tokio::time::sleep(delay).await;
        }

        match dispatcher.dispatch(command.clone()).await {
            DispatchResult::Ack => {
                relay_telemetry::DISPATCH_TOTAL
                    .with_label_values(&[command.kind.as_str(), "ack"])
                    .inc();
                relay_telemetry::Metrics::dispatch_latency(
                    command.kind.as_str(),
                    started.elapsed().as_secs_f64() * 1000.0,
                );
                return Ok(());
            }
            DispatchResult::Transient(reason) => {
                relay_telemetry::RETRY_TOTAL.inc();
                warn!(
                    receiver = %command.receiver,
                    kind = command.kind.as_str(),
                    attempt,
                    reason = %reason,
                    "Transient dispatch failure"
                );
                last_reason = reason;
            }
            DispatchResult::Fatal(reason) => {
                relay_telemetry::DISPATCH_TOTAL
                    .with_label_values(&[command.kind.as_str(), "fatal"])
                    .inc();
                return Err(ExecError::Fatal { reason });
            }
        }
    }

    relay_telemetry::DISPATCH_TOTAL
        .with_label_values(&[command.kind.as_str(), "exhausted"])
        .inc();
    Err(ExecError::Transient {
        attempts,
        reason: last_reason,
    })
}
