//! Periodic reconciliation of receiver state against the master.
//!
//! On a timer, the engine pulls position snapshots from the master and
//! every receiver, classifies drift between them, and (policy permitting)
//! routes corrective commands through the same sizing, safety and dispatch
//! path that live signals use.

pub mod classify;
pub mod engine;
pub mod error;
pub mod history;
pub mod policy;

pub use classify::{classify_receiver, Discrepancy, LinkedExpectation};
pub use engine::{CyclePhase, CycleResult, CycleStats, ReconcileEngine};
pub use error::{ReconcileError, ReconcileResult};
pub use history::{ActionHistory, ReconcileAction};
pub use policy::ReconcilePolicy;
