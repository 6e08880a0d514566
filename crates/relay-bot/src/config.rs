//! Application configuration.
//!
//! Global risk and safety defaults with optional per-receiver overrides.
//! Precedence is explicit: a receiver either uses the global section
//! (`use_global_* = true`, the default) or carries its own complete
//! override, resolved through `resolve_config`.

use crate::error::{AppError, AppResult};
use relay_core::resolve_config;
use relay_reconcile::ReconcilePolicy;
use relay_risk::{RUnitPolicy, RiskConfig, RiskMode};
use relay_safety::{SafetyConfig, SessionFilter};
use relay_symbols::{SymbolMapping, SymbolOverride};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One receiver account and its configuration overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Receiver account id, unique across the config.
    pub id: String,
    /// Use the global risk section instead of the per-receiver one.
    #[serde(default = "default_true")]
    pub use_global_risk: bool,
    #[serde(default)]
    pub risk: Option<RiskConfig>,
    /// Use the global safety section instead of the per-receiver one.
    #[serde(default = "default_true")]
    pub use_global_safety: bool,
    #[serde(default)]
    pub safety: Option<SafetyConfig>,
    /// Manually confirmed symbol mappings, seeded before auto-mapping.
    #[serde(default)]
    pub mappings: Vec<SymbolMapping>,
    /// Per-symbol sizing overrides.
    #[serde(default)]
    pub overrides: Vec<SymbolOverride>,
}

fn default_true() -> bool {
    true
}

/// Paper-mode settings for the bundled dry-run transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Fixed receiver balance reported by the paper gateway.
    #[serde(default = "default_paper_balance")]
    pub balance: Decimal,
}

fn default_paper_balance() -> Decimal {
    Decimal::from(10_000)
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            balance: default_paper_balance(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Master account id to replicate from.
    pub master_account: String,
    #[serde(default)]
    pub receivers: Vec<ReceiverConfig>,
    /// Global risk default.
    #[serde(default = "default_risk")]
    pub risk: RiskConfig,
    /// Global safety default.
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub session: SessionFilter,
    #[serde(default)]
    pub reconcile: ReconcilePolicy,
    /// Safety state persistence path. `None` disables persistence.
    #[serde(default)]
    pub state_file: Option<String>,
    /// Signal channel capacity.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub paper: PaperConfig,
}

fn default_risk() -> RiskConfig {
    RiskConfig {
        mode: RiskMode::LotMultiplier,
        value: Decimal::ONE,
        r_unit: RUnitPolicy::default(),
    }
}

fn default_channel_capacity() -> usize {
    1000
}

impl AppConfig {
    /// Load from `RELAY_CONFIG` or the default path.
    pub fn load() -> AppResult<Self> {
        let path =
            std::env::var("RELAY_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
        Self::from_file(&path)
    }

    /// Load and validate a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Effective risk config for one receiver.
    #[must_use]
    pub fn risk_for(&self, receiver: &ReceiverConfig) -> RiskConfig {
        resolve_config(&self.risk, receiver.risk.as_ref(), receiver.use_global_risk)
    }

    /// Effective safety config for one receiver.
    #[must_use]
    pub fn safety_for(&self, receiver: &ReceiverConfig) -> SafetyConfig {
        resolve_config(
            &self.safety,
            receiver.safety.as_ref(),
            receiver.use_global_safety,
        )
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.master_account.trim().is_empty() {
            return Err(AppError::Config("master_account must be set".to_string()));
        }
        if self.receivers.is_empty() {
            return Err(AppError::Config(
                "at least one receiver must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for receiver in &self.receivers {
            if receiver.id.trim().is_empty() {
                return Err(AppError::Config("receiver id must not be empty".to_string()));
            }
            if !seen.insert(receiver.id.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate receiver id: {}",
                    receiver.id
                )));
            }
            if !receiver.use_global_risk && receiver.risk.is_none() {
                return Err(AppError::Config(format!(
                    "receiver {} opts out of global risk but has no risk section",
                    receiver.id
                )));
            }
            if !receiver.use_global_safety && receiver.safety.is_none() {
                return Err(AppError::Config(format!(
                    "receiver {} opts out of global safety but has no safety section",
                    receiver.id
                )));
            }
            self.risk_for(receiver).validate()?;
            self.safety_for(receiver).validate()?;
        }

        self.reconcile.validate()?;
        if self.channel_capacity == 0 {
            return Err(AppError::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
