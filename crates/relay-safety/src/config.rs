//! Safety configuration.

use crate::error::{SafetyError, SafetyResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Safety limits, owned per receiver with fallback to a global default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Maximum tolerated |signal price − executable price|, in pips.
    #[serde(default = "default_max_slippage_pips")]
    pub max_slippage_pips: Decimal,
    /// Daily realized loss, in R-multiples, at which the receiver halts.
    #[serde(default = "default_max_daily_loss_r")]
    pub max_daily_loss_r: Decimal,
    /// Equity drawdown percentage at which the receiver halts.
    #[serde(default = "default_max_drawdown_percent")]
    pub max_drawdown_percent: Decimal,
    /// Measure drawdown from the equity high-water mark instead of the
    /// period-start balance.
    #[serde(default)]
    pub trailing_drawdown: bool,
    /// Queue otherwise-approved instructions for external approval.
    #[serde(default)]
    pub manual_confirm: bool,
    /// UTC hour at which the trading day rolls over.
    #[serde(default)]
    pub rollover_hour_utc: u32,
    /// Retry slippage-rejected dispatches.
    #[serde(default = "default_enable_retry")]
    pub enable_retry: bool,
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Position snapshot poll interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_max_slippage_pips() -> Decimal {
    Decimal::from(3)
}

fn default_max_daily_loss_r() -> Decimal {
    Decimal::from(3)
}

fn default_max_drawdown_percent() -> Decimal {
    Decimal::from(10)
}

fn default_enable_retry() -> bool {
    true
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_slippage_pips: default_max_slippage_pips(),
            max_daily_loss_r: default_max_daily_loss_r(),
            max_drawdown_percent: default_max_drawdown_percent(),
            trailing_drawdown: false,
            manual_confirm: false,
            rollover_hour_utc: 0,
            enable_retry: default_enable_retry(),
            max_retry_attempts: default_max_retry_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl SafetyConfig {
    /// Validate at configuration time so bad values never reach dispatch.
    pub fn validate(&self) -> SafetyResult<()> {
        if self.max_slippage_pips < Decimal::ZERO {
            return Err(SafetyError::InvalidConfig(
                "max_slippage_pips must not be negative".to_string(),
            ));
        }
        if self.max_daily_loss_r <= Decimal::ZERO {
            return Err(SafetyError::InvalidConfig(
                "max_daily_loss_r must be positive".to_string(),
            ));
        }
        if self.max_drawdown_percent <= Decimal::ZERO
            || self.max_drawdown_percent > Decimal::from(100)
        {
            return Err(SafetyError::InvalidConfig(
                "max_drawdown_percent must be in (0, 100]".to_string(),
            ));
        }
        if self.rollover_hour_utc >= 24 {
            return Err(SafetyError::InvalidConfig(
                "rollover_hour_utc must be below 24".to_string(),
            ));
        }
        Ok(())
    }
}
