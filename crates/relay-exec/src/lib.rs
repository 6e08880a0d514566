//! Idempotent signal execution.
//!
//! Turns incoming master trade signals into dispatched commands:
//! idempotency check → symbol mapping → risk sizing → safety gating →
//! dispatch, with the outcome recorded so duplicate deliveries and retries
//! never double-execute.

pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod idempotency;
pub mod locks;
pub mod pipeline;

pub use dispatcher::{
    dispatch_with_retry, BoxFuture, DispatchResult, DynDispatcher, ExecutionDispatcher,
    RetryPolicy,
};
pub use error::{ExecError, ExecResult};
pub use gateway::{AccountGateway, DynGateway, GatewayError, GatewayResult};
pub use idempotency::{IdempotencyKey, IdempotencyStore, Outcome, Reservation, RetentionConfig};
pub use locks::KeyedLocks;
pub use pipeline::{ReceiverContext, SignalOutcome, SignalPipeline};
