//! Trade replication relay application.
//!
//! Wires the engine together: symbol catalogs, per-receiver sizing and
//! safety state, the signal pipeline, and the reconciliation timer. The
//! transport that delivers signals and carries commands is supplied by the
//! embedder as trait objects; a paper implementation is included for
//! dry runs.

pub mod app;
pub mod config;
pub mod dryrun;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, ReceiverConfig};
pub use dryrun::{PaperDispatcher, PaperGateway};
pub use error::{AppError, AppResult};
