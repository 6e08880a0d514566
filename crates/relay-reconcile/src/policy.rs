//! Reconciliation policy.

use crate::error::{ReconcileError, ReconcileResult};
use serde::{Deserialize, Serialize};

/// What the engine is allowed to correct on its own.
///
/// Each `auto_*` flag gates one discrepancy kind. Direction mismatches are
/// never auto-corrected regardless of flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilePolicy {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub auto_close_orphaned: bool,
    #[serde(default)]
    pub auto_open_missing: bool,
    #[serde(default)]
    pub auto_adjust_volume: bool,
    #[serde(default)]
    pub auto_sync_sl_tp: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    30
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            auto_close_orphaned: false,
            auto_open_missing: false,
            auto_adjust_volume: false,
            auto_sync_sl_tp: false,
        }
    }
}

impl ReconcilePolicy {
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.interval_secs == 0 {
            return Err(ReconcileError::InvalidPolicy(
                "interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_detect_only() {
        let policy = ReconcilePolicy::default();
        assert!(policy.enabled);
        assert_eq!(policy.interval_secs, 30);
        assert!(!policy.auto_close_orphaned);
        assert!(!policy.auto_open_missing);
        assert!(!policy.auto_adjust_volume);
        assert!(!policy.auto_sync_sl_tp);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let policy = ReconcilePolicy {
            interval_secs: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }
}
