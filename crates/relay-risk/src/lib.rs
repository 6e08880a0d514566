//! Position sizing for receiver accounts.
//!
//! Converts a master signal's volume/risk intent into a receiver-appropriate
//! lot size under one of six modes, then applies per-symbol overrides and
//! broker rounding. Sizing that cannot be computed (e.g. a risk-based mode
//! with no stop loss) fails loudly instead of guessing.

pub mod config;
pub mod error;
pub mod sizer;

pub use config::{RUnitPolicy, RiskConfig, RiskMode};
pub use error::{RiskError, RiskResult};
pub use sizer::{RiskSizer, SizeRequest};
