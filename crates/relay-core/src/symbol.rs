//! Instrument specifications and pip math.

use crate::decimal::{Lots, Px};
use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Instrument specification read from an account's catalog.
///
/// Immutable snapshot: a catalog refresh replaces the entry rather than
/// mutating it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub name: String,
    /// Profit of a one-lot position per one-tick move, in profit currency.
    pub tick_value: Decimal,
    /// Minimum price increment.
    pub tick_size: Decimal,
    /// Units per lot.
    pub contract_size: Decimal,
    /// Quote decimal places.
    pub digits: u32,
    pub min_lot: Lots,
    pub lot_step: Lots,
    pub max_lot: Lots,
    /// Currency positions on this instrument settle in.
    pub profit_currency: String,
}

impl SymbolSpec {
    /// Pip size for this instrument.
    ///
    /// FX convention: 3- and 5-digit quotes price in tenths of a pip, so a
    /// pip is ten points; otherwise a pip equals one point.
    #[must_use]
    pub fn pip_size(&self) -> Decimal {
        match self.digits {
            3 | 5 => Decimal::new(1, self.digits - 1),
            d => Decimal::new(1, d),
        }
    }

    /// Profit of a one-lot position per one-pip move, in profit currency.
    ///
    /// Fails when tick_size is zero, which indicates a corrupt catalog entry.
    pub fn pip_value_per_lot(&self) -> Result<Decimal> {
        if self.tick_size.is_zero() {
            return Err(CoreError::InvalidSymbolSpec(format!(
                "{}: tick_size is zero",
                self.name
            )));
        }
        Ok(self.tick_value * self.pip_size() / self.tick_size)
    }

    /// Distance between two prices, in pips.
    #[must_use]
    pub fn pips_between(&self, a: Px, b: Px) -> Decimal {
        let pip = self.pip_size();
        if pip.is_zero() {
            return Decimal::ZERO;
        }
        a.distance(b) / pip
    }

    /// Whether two prices differ by more than one tick.
    #[must_use]
    pub fn differs_beyond_tick(&self, a: Px, b: Px) -> bool {
        a.distance(b) > self.tick_size
    }
}
