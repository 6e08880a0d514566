//! Lot size computation.

use crate::config::{RiskConfig, RiskMode};
use crate::error::{RiskError, RiskResult};
use relay_core::{Lots, Px, SymbolSpec};
use relay_symbols::SymbolOverride;
use rust_decimal::Decimal;
use tracing::trace;

/// Everything sizing needs for one signal on one receiver.
#[derive(Debug)]
pub struct SizeRequest<'a> {
    pub master_volume: Lots,
    pub entry_price: Px,
    pub sl: Option<Px>,
    /// Receiver account balance in deposit currency.
    pub receiver_balance: Decimal,
    /// Receiver-side instrument spec (after symbol mapping).
    pub spec: &'a SymbolSpec,
    pub symbol_override: Option<&'a SymbolOverride>,
}

/// Computes receiver lot sizes from master signals.
#[derive(Debug, Clone)]
pub struct RiskSizer {
    config: RiskConfig,
}

impl RiskSizer {
    pub fn new(config: RiskConfig) -> RiskResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Compute the final, broker-valid lot size for a request.
    ///
    /// Post-processing always applies: the symbol override multiplier, then
    /// flooring to lot step, then clamping to `[min_lot, max_lot]` and the
    /// override's max lots. A result that ends up below min lot is an error,
    /// never a silent substitution of min lot.
    pub fn size(&self, req: &SizeRequest<'_>) -> RiskResult<Lots> {
        let base = self.base_volume(req)?;

        let multiplied = match req.symbol_override {
            Some(ov) => base * ov.lot_multiplier,
            None => base,
        };

        let floored = multiplied.round_to_step(req.spec.lot_step);
        if floored < req.spec.min_lot {
            return Err(RiskError::BelowMinLot {
                symbol: req.spec.name.clone(),
                computed: floored,
                min: req.spec.min_lot,
            });
        }

        let mut lots = if floored > req.spec.max_lot {
            req.spec.max_lot
        } else {
            floored
        };
        if let Some(cap) = req.symbol_override.and_then(|ov| ov.max_lots) {
            if lots > cap {
                lots = cap.round_to_step(req.spec.lot_step);
            }
        }
        if lots < req.spec.min_lot {
            return Err(RiskError::BelowMinLot {
                symbol: req.spec.name.clone(),
                computed: lots,
                min: req.spec.min_lot,
            });
        }

        trace!(
            symbol = %req.spec.name,
            mode = ?self.config.mode,
            base = %base,
            final_lots = %lots,
            "Sized signal"
        );
        Ok(lots)
    }

    /// Pre-override, pre-rounding volume for the configured mode.
    fn base_volume(&self, req: &SizeRequest<'_>) -> RiskResult<Lots> {
        let value = self.config.value;
        match self.config.mode {
            RiskMode::FixedLot => Ok(Lots::new(value)),
            RiskMode::LotMultiplier | RiskMode::BalanceMultiplier => Ok(req.master_volume * value),
            RiskMode::RiskPercent => {
                let amount = req.receiver_balance * value / Decimal::from(100);
                self.volume_for_risk(req, amount)
            }
            RiskMode::RiskDollar => self.volume_for_risk(req, value),
            RiskMode::Intent => {
                let amount = value * self.config.r_unit.r_amount(req.receiver_balance);
                self.volume_for_risk(req, amount)
            }
        }
    }

    /// Volume that loses exactly `risk_amount` if the stop is hit.
    fn volume_for_risk(&self, req: &SizeRequest<'_>, risk_amount: Decimal) -> RiskResult<Lots> {
        let sl = req.sl.ok_or_else(|| RiskError::MissingStopLoss {
            symbol: req.spec.name.clone(),
        })?;
        let sl_pips = req.spec.pips_between(req.entry_price, sl);
        if sl_pips.is_zero() {
            return Err(RiskError::ZeroStopDistance {
                symbol: req.spec.name.clone(),
            });
        }
        let pip_value = req.spec.pip_value_per_lot()?;
        Ok(Lots::new(risk_amount / (sl_pips * pip_value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RUnitPolicy;
    use rust_decimal_macros::dec;

    fn eurusd() -> SymbolSpec {
        SymbolSpec {
            name: "EURUSD".to_string(),
            tick_value: dec!(1),
            tick_size: dec!(0.00001),
            contract_size: dec!(100000),
            digits: 5,
            min_lot: Lots::new(dec!(0.01)),
            lot_step: Lots::new(dec!(0.01)),
            max_lot: Lots::new(dec!(100)),
            profit_currency: "USD".to_string(),
        }
    }

    fn sizer(mode: RiskMode, value: Decimal) -> RiskSizer {
        RiskSizer::new(RiskConfig {
            mode,
            value,
            r_unit: RUnitPolicy::default(),
        })
        .unwrap()
    }

    fn request<'a>(spec: &'a SymbolSpec, master_volume: Decimal) -> SizeRequest<'a> {
        SizeRequest {
            master_volume: Lots::new(master_volume),
            entry_price: Px::new(dec!(1.1000)),
            sl: Some(Px::new(dec!(1.0950))), // 50 pips
            receiver_balance: dec!(10000),
            spec,
            symbol_override: None,
        }
    }

    #[test]
    fn test_fixed_lot_ignores_master_volume() {
        let spec = eurusd();
        let sizer = sizer(RiskMode::FixedLot, dec!(0.10));
        assert_eq!(sizer.size(&request(&spec, dec!(0.01))).unwrap(), Lots::new(dec!(0.10)));
        assert_eq!(sizer.size(&request(&spec, dec!(5.00))).unwrap(), Lots::new(dec!(0.10)));
    }

    #[test]
    fn test_lot_multiplier() {
        let spec = eurusd();
        let sizer = sizer(RiskMode::LotMultiplier, dec!(2.0));
        assert_eq!(sizer.size(&request(&spec, dec!(0.20))).unwrap(), Lots::new(dec!(0.40)));
    }

    #[test]
    fn test_balance_multiplier_is_plain_multiplication() {
        let spec = eurusd();
        let sizer = sizer(RiskMode::BalanceMultiplier, dec!(0.5));
        assert_eq!(sizer.size(&request(&spec, dec!(0.20))).unwrap(), Lots::new(dec!(0.10)));
    }

    #[test]
    fn test_risk_percent() {
        // 1% of 10000 = 100 risked; 50 pips * 10 USD/pip/lot = 500 per lot
        // -> 0.2 lots
        let spec = eurusd();
        let sizer = sizer(RiskMode::RiskPercent, dec!(1));
        assert_eq!(sizer.size(&request(&spec, dec!(1))).unwrap(), Lots::new(dec!(0.20)));
    }

    #[test]
    fn test_risk_dollar() {
        let spec = eurusd();
        let sizer = sizer(RiskMode::RiskDollar, dec!(250));
        assert_eq!(sizer.size(&request(&spec, dec!(1))).unwrap(), Lots::new(dec!(0.50)));
    }

    #[test]
    fn test_intent_uses_r_unit_policy() {
        // 1R = 1% of balance = 100; value 2 -> 200 risked -> 0.4 lots
        let spec = eurusd();
        let sizer = RiskSizer::new(RiskConfig {
            mode: RiskMode::Intent,
            value: dec!(2),
            r_unit: RUnitPolicy::BalanceFraction(dec!(0.01)),
        })
        .unwrap();
        assert_eq!(sizer.size(&request(&spec, dec!(1))).unwrap(), Lots::new(dec!(0.40)));

        // Fixed amount policy: 1R = 50 -> value 2 -> 100 risked -> 0.2 lots
        let sizer = RiskSizer::new(RiskConfig {
            mode: RiskMode::Intent,
            value: dec!(2),
            r_unit: RUnitPolicy::FixedAmount(dec!(50)),
        })
        .unwrap();
        assert_eq!(sizer.size(&request(&spec, dec!(1))).unwrap(), Lots::new(dec!(0.20)));
    }

    #[test]
    fn test_risk_mode_without_sl_fails() {
        let spec = eurusd();
        let sizer = sizer(RiskMode::RiskPercent, dec!(1));
        let mut req = request(&spec, dec!(1));
        req.sl = None;
        assert!(matches!(
            sizer.size(&req),
            Err(RiskError::MissingStopLoss { .. })
        ));
    }

    #[test]
    fn test_zero_stop_distance_fails() {
        let spec = eurusd();
        let sizer = sizer(RiskMode::RiskDollar, dec!(100));
        let mut req = request(&spec, dec!(1));
        req.sl = Some(req.entry_price);
        assert!(matches!(
            sizer.size(&req),
            Err(RiskError::ZeroStopDistance { .. })
        ));
    }

    #[test]
    fn test_result_floors_to_lot_step() {
        // 77 risked / 500 per lot = 0.154 -> floors to 0.15
        let spec = eurusd();
        let sizer = sizer(RiskMode::RiskDollar, dec!(77));
        assert_eq!(sizer.size(&request(&spec, dec!(1))).unwrap(), Lots::new(dec!(0.15)));
    }

    #[test]
    fn test_below_min_lot_fails_instead_of_substituting() {
        // 2 risked / 500 per lot = 0.004 -> floors to 0.00 < 0.01
        let spec = eurusd();
        let sizer = sizer(RiskMode::RiskDollar, dec!(2));
        assert!(matches!(
            sizer.size(&request(&spec, dec!(1))),
            Err(RiskError::BelowMinLot { .. })
        ));
    }

    #[test]
    fn test_clamps_to_max_lot() {
        let mut spec = eurusd();
        spec.max_lot = Lots::new(dec!(1));
        let sizer = sizer(RiskMode::FixedLot, dec!(5));
        assert_eq!(sizer.size(&request(&spec, dec!(1))).unwrap(), Lots::new(dec!(1)));
    }

    #[test]
    fn test_override_multiplier_and_cap() {
        let spec = eurusd();
        let ov = SymbolOverride {
            symbol: "EURUSD".to_string(),
            lot_multiplier: dec!(0.5),
            max_lots: Some(Lots::new(dec!(0.05))),
            enabled: true,
        };
        let sizer = sizer(RiskMode::FixedLot, dec!(0.30));
        let mut req = request(&spec, dec!(1));
        req.symbol_override = Some(&ov);
        // 0.30 * 0.5 = 0.15, capped at 0.05
        assert_eq!(sizer.size(&req).unwrap(), Lots::new(dec!(0.05)));
    }

    #[test]
    fn test_override_cap_below_min_lot_fails() {
        let spec = eurusd();
        let ov = SymbolOverride {
            symbol: "EURUSD".to_string(),
            lot_multiplier: dec!(1),
            max_lots: Some(Lots::new(dec!(0.001))),
            enabled: true,
        };
        let sizer = sizer(RiskMode::FixedLot, dec!(0.30));
        let mut req = request(&spec, dec!(1));
        req.symbol_override = Some(&ov);
        assert!(matches!(
            sizer.size(&req),
            Err(RiskError::BelowMinLot { .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        assert!(RiskSizer::new(RiskConfig {
            mode: RiskMode::FixedLot,
            value: dec!(-1),
            r_unit: RUnitPolicy::default(),
        })
        .is_err());
    }
}
