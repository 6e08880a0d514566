//! Core domain types for the relay trade replication engine.
//!
//! This crate provides fundamental types used throughout the system:
//! - `Px`, `Lots`: Precision-safe numeric types
//! - `TradeSignal`, `MasterPosition`, `ReceiverPosition`: Replication domain model
//! - `SymbolSpec`: Instrument specifications (tick size, lot step, pip math)
//! - `ExecutionCommand`: Outbound command model for the execution boundary

pub mod command;
pub mod config;
pub mod decimal;
pub mod error;
pub mod signal;
pub mod symbol;

pub use command::{CommandKind, ExecutionCommand};
pub use config::resolve_config;
pub use decimal::{Lots, Px};
pub use error::{CoreError, Result};
pub use signal::{
    AccountId, Direction, EventId, MasterPosition, PositionId, ReceiverPosition, SignalEvent,
    TradeSignal,
};
pub use symbol::SymbolSpec;
