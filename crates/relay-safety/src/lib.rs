//! Pre-dispatch safety gating.
//!
//! Every computed instruction passes through a per-receiver gate before it
//! may reach the execution boundary:
//! - Halt state machine: daily realized loss and equity drawdown limits flip
//!   a receiver from Active to Halted; rollover at the configured day
//!   boundary flips it back.
//! - Slippage check against the current executable price.
//! - Session filter: instructions outside all allowed windows are silently
//!   skipped, not errors.
//! - Manual confirm mode: approved instructions are queued for external
//!   approval instead of dispatched.
//!
//! Halt state and daily counters are persisted so a restart never resets a
//! Halted receiver to Active.

pub mod config;
pub mod error;
pub mod gate;
pub mod session;
pub mod store;

pub use config::SafetyConfig;
pub use error::{SafetyError, SafetyResult};
pub use gate::{HaltReason, PendingConfirm, SafetyGate, SafetyRejection, SkipReason, Verdict};
pub use session::{Session, SessionFilter};
pub use store::StateStore;
