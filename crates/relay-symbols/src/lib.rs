//! Symbol resolution for cross-broker replication.
//!
//! Brokers name the same instrument differently ("EURUSD", "EURUSD.m",
//! "mEURUSD2"). This crate resolves a master instrument to a receiver
//! instrument through a ladder of strategies and scores how confident the
//! match is:
//! - Exact name match
//! - Normalized-key match (suffix/prefix markers stripped)
//! - Specification-similarity match (contract size, digits, ticks, currency)
//!
//! Low-confidence matches require manual confirmation before they are used
//! for live sizing.

pub mod catalog;
pub mod error;
pub mod mapper;
pub mod mapping;

pub use catalog::SymbolCatalog;
pub use error::{SymbolError, SymbolResult};
pub use mapper::{normalize_symbol, score_specs, ConfidenceBand, MatchScore, SymbolMapper};
pub use mapping::{MappingTable, MatchMethod, SymbolMapping, SymbolOverride};
