//! Risk sizing configuration.

use crate::error::{RiskError, RiskResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sizing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMode {
    /// Fixed lot size; master volume ignored.
    FixedLot,
    /// Master volume times a multiplier.
    LotMultiplier,
    /// Master volume times a multiplier. A balance-ratio-scaled variant
    /// would be a separate mode with its own name.
    BalanceMultiplier,
    /// Risk a percentage of receiver balance per trade.
    RiskPercent,
    /// Risk a fixed amount of deposit currency per trade.
    RiskDollar,
    /// Risk a multiple of the receiver's configured R-unit per trade.
    Intent,
}

impl RiskMode {
    /// Whether the mode derives volume from stop distance.
    #[must_use]
    pub fn is_risk_based(&self) -> bool {
        matches!(self, Self::RiskPercent | Self::RiskDollar | Self::Intent)
    }
}

/// Defines what one R-unit means for a receiver.
///
/// Cross-account R comparison is policy, not inference: the receiver's
/// R-unit is configured explicitly rather than derived from master state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RUnitPolicy {
    /// 1R = fraction of the receiver balance (e.g. 0.01 = 1%).
    BalanceFraction(Decimal),
    /// 1R = fixed amount of deposit currency.
    FixedAmount(Decimal),
}

impl Default for RUnitPolicy {
    fn default() -> Self {
        // 1R = 1% of balance
        Self::BalanceFraction(Decimal::new(1, 2))
    }
}

impl RUnitPolicy {
    /// R-unit amount in deposit currency for a given balance.
    #[must_use]
    pub fn r_amount(&self, balance: Decimal) -> Decimal {
        match self {
            Self::BalanceFraction(f) => balance * f,
            Self::FixedAmount(a) => *a,
        }
    }
}

/// Risk configuration, owned per receiver with fallback to a global default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub mode: RiskMode,
    pub value: Decimal,
    #[serde(default)]
    pub r_unit: RUnitPolicy,
}

impl RiskConfig {
    /// Validate at configuration time so bad values never reach dispatch.
    pub fn validate(&self) -> RiskResult<()> {
        if self.value <= Decimal::ZERO {
            return Err(RiskError::InvalidConfig(format!(
                "risk value must be positive, got {}",
                self.value
            )));
        }
        if self.mode == RiskMode::RiskPercent && self.value > Decimal::from(100) {
            return Err(RiskError::InvalidConfig(format!(
                "risk percent must not exceed 100, got {}",
                self.value
            )));
        }
        match self.r_unit {
            RUnitPolicy::BalanceFraction(f) if f <= Decimal::ZERO || f > Decimal::ONE => {
                Err(RiskError::InvalidConfig(format!(
                    "R-unit balance fraction must be in (0, 1], got {}",
                    f
                )))
            }
            RUnitPolicy::FixedAmount(a) if a <= Decimal::ZERO => Err(RiskError::InvalidConfig(
                format!("R-unit amount must be positive, got {}", a),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_rejects_non_positive_value() {
        let config = RiskConfig {
            mode: RiskMode::FixedLot,
            value: dec!(0),
            r_unit: RUnitPolicy::default(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_percent_over_100() {
        let config = RiskConfig {
            mode: RiskMode::RiskPercent,
            value: dec!(150),
            r_unit: RUnitPolicy::default(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_sane_config() {
        let config = RiskConfig {
            mode: RiskMode::RiskPercent,
            value: dec!(1),
            r_unit: RUnitPolicy::FixedAmount(dec!(100)),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_r_unit_amounts() {
        assert_eq!(
            RUnitPolicy::BalanceFraction(dec!(0.02)).r_amount(dec!(10000)),
            dec!(200)
        );
        assert_eq!(
            RUnitPolicy::FixedAmount(dec!(75)).r_amount(dec!(10000)),
            dec!(75)
        );
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&RiskMode::BalanceMultiplier).unwrap();
        assert_eq!(json, "\"balance_multiplier\"");
        let back: RiskMode = serde_json::from_str("\"risk_percent\"").unwrap();
        assert_eq!(back, RiskMode::RiskPercent);
    }
}
