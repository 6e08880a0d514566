//! Symbol name normalization and match-confidence scoring.

use crate::catalog::SymbolCatalog;
use crate::mapping::{MatchMethod, SymbolMapping};
use relay_core::SymbolSpec;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// Confidence at or above which a match is auto-acceptable.
pub const HIGH_CONFIDENCE: u8 = 90;
/// Confidence at or above which a match is usable, with a warning.
pub const USABLE_CONFIDENCE: u8 = 70;

/// Normalize a broker symbol name to a comparison key.
///
/// Strips trailing `+`/`.` markers, trailing digit suffixes and leading
/// micro/mini markers, then uppercases: `"mEURUSD2"` and `"EURUSD.+"` both
/// normalize to `"EURUSD"`.
#[must_use]
pub fn normalize_symbol(raw: &str) -> String {
    let s = raw.trim();
    let s = s.trim_end_matches(|c: char| c == '+' || c == '.' || c.is_ascii_digit());
    // Lowercase single-letter micro marker, e.g. "mEURUSD".
    let s = if s.len() > 1
        && s.starts_with('m')
        && s[1..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        &s[1..]
    } else {
        s
    };
    let mut key = s.to_ascii_uppercase();
    for marker in ["MICRO", "MINI"] {
        if key.len() > marker.len() && key.starts_with(marker) {
            key = key[marker.len()..].to_string();
            break;
        }
    }
    key
}

/// Confidence band a score falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    /// >= 90: auto-acceptable.
    High,
    /// 70..=89: usable, surfaced with a warning.
    Usable,
    /// < 70: requires manual confirmation before live sizing.
    ManualRequired,
}

impl ConfidenceBand {
    #[must_use]
    pub fn of(confidence: u8) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            Self::High
        } else if confidence >= USABLE_CONFIDENCE {
            Self::Usable
        } else {
            Self::ManualRequired
        }
    }
}

/// Result of scoring two instrument specifications against each other.
#[derive(Debug, Clone)]
pub struct MatchScore {
    pub confidence: u8,
    /// One human-readable entry per triggered deduction.
    pub warnings: Vec<String>,
}

impl MatchScore {
    #[must_use]
    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::of(self.confidence)
    }
}

/// Relative difference of `b` against reference `a`.
fn rel_diff(a: Decimal, b: Decimal) -> Decimal {
    if a.is_zero() {
        return if b.is_zero() { Decimal::ZERO } else { Decimal::ONE };
    }
    ((a - b) / a).abs()
}

/// Score how well a receiver spec matches a master spec.
///
/// Starts at 100; each mismatch deducts independently (deductions do not
/// compound) and the result floors at 0. Every triggered deduction is
/// recorded as a human-readable warning.
#[must_use]
pub fn score_specs(master: &SymbolSpec, receiver: &SymbolSpec) -> MatchScore {
    let mut deductions: u32 = 0;
    let mut warnings = Vec::new();

    if rel_diff(master.contract_size, receiver.contract_size) > Decimal::new(1, 2) {
        deductions += 25;
        warnings.push(format!(
            "contract size differs: master {} vs receiver {}",
            master.contract_size, receiver.contract_size
        ));
    }
    if master.digits != receiver.digits {
        deductions += 20;
        warnings.push(format!(
            "digits differ: master {} vs receiver {}",
            master.digits, receiver.digits
        ));
    }
    if rel_diff(master.tick_size, receiver.tick_size) > Decimal::new(1, 1) {
        deductions += 15;
        warnings.push(format!(
            "tick size differs: master {} vs receiver {}",
            master.tick_size, receiver.tick_size
        ));
    }
    if rel_diff(master.tick_value, receiver.tick_value) > Decimal::new(25, 2) {
        deductions += 10;
        warnings.push(format!(
            "tick value differs: master {} vs receiver {}",
            master.tick_value, receiver.tick_value
        ));
    }
    if !master
        .profit_currency
        .eq_ignore_ascii_case(&receiver.profit_currency)
    {
        deductions += 20;
        warnings.push(format!(
            "profit currency differs: master {} vs receiver {}",
            master.profit_currency, receiver.profit_currency
        ));
    }

    let confidence = 100u32.saturating_sub(deductions) as u8;
    MatchScore {
        confidence,
        warnings,
    }
}

/// Resolves master instruments to receiver instruments.
///
/// Resolution ladder: exact name match, then normalized-key match, then
/// best specification-similarity match. Returns `None` when nothing in the
/// receiver catalog resembles the master instrument; such symbols require a
/// manual mapping.
pub struct SymbolMapper;

impl SymbolMapper {
    /// Attempt to auto-map a master instrument into a receiver catalog.
    ///
    /// The returned mapping is a seed value the user may override; entries
    /// below the usable band come back disabled and must be confirmed
    /// before live sizing.
    pub fn auto_map(master: &SymbolSpec, receiver_catalog: &SymbolCatalog) -> Option<SymbolMapping> {
        // Tier 1: exact name.
        if receiver_catalog.contains(&master.name) {
            debug!(symbol = %master.name, "Symbol resolved by exact name");
            return Some(SymbolMapping::auto(
                &master.name,
                &master.name,
                MatchMethod::Exact,
                100,
                Vec::new(),
            ));
        }

        // Tier 2: normalized key.
        let master_key = normalize_symbol(&master.name);
        for name in receiver_catalog.names() {
            if normalize_symbol(&name) == master_key {
                let score = receiver_catalog
                    .get(&name)
                    .map(|spec| score_specs(master, &spec))
                    .unwrap_or(MatchScore {
                        confidence: 100,
                        warnings: Vec::new(),
                    });
                debug!(
                    symbol = %master.name,
                    receiver_symbol = %name,
                    confidence = score.confidence,
                    "Symbol resolved by normalized key"
                );
                return Some(SymbolMapping::auto(
                    &master.name,
                    &name,
                    MatchMethod::Normalized,
                    score.confidence,
                    score.warnings,
                ));
            }
        }

        // Tier 3: best specification similarity across the catalog.
        let mut best: Option<(SymbolSpec, MatchScore)> = None;
        for spec in receiver_catalog.specs() {
            let score = score_specs(master, &spec);
            let better = match &best {
                Some((_, b)) => score.confidence > b.confidence,
                None => true,
            };
            if better {
                best = Some((spec, score));
            }
        }

        match best {
            Some((spec, score)) if score.confidence > 0 => {
                if score.band() == ConfidenceBand::ManualRequired {
                    warn!(
                        symbol = %master.name,
                        candidate = %spec.name,
                        confidence = score.confidence,
                        warnings = ?score.warnings,
                        "Spec-similarity match below usable confidence, manual confirmation required"
                    );
                } else {
                    info!(
                        symbol = %master.name,
                        receiver_symbol = %spec.name,
                        confidence = score.confidence,
                        "Symbol resolved by spec similarity"
                    );
                }
                Some(SymbolMapping::auto(
                    &master.name,
                    &spec.name,
                    MatchMethod::SpecSimilarity,
                    score.confidence,
                    score.warnings,
                ))
            }
            _ => {
                warn!(symbol = %master.name, "Symbol unresolved, manual mapping required");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::Lots;
    use rust_decimal_macros::dec;

    fn spec(name: &str) -> SymbolSpec {
        SymbolSpec {
            name: name.to_string(),
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

    #[test]
    fn test_normalize_strips_markers() {
        assert_eq!(normalize_symbol("EURUSD+"), "EURUSD");
        assert_eq!(normalize_symbol("EURUSD."), "EURUSD");
        assert_eq!(normalize_symbol("EURUSD2"), "EURUSD");
        assert_eq!(normalize_symbol("mEURUSD"), "EURUSD");
        assert_eq!(normalize_symbol("MicroEURUSD"), "EURUSD");
        assert_eq!(normalize_symbol("MiniGBPUSD"), "GBPUSD");
        assert_eq!(normalize_symbol("eurusd"), "EURUSD");
        assert_eq!(normalize_symbol("XAUUSD.4"), "XAUUSD");
    }

    #[test]
    fn test_normalize_plain_name_unchanged() {
        assert_eq!(normalize_symbol("EURUSD"), "EURUSD");
    }

    #[test]
    fn test_identical_specs_score_100_no_warnings() {
        let score = score_specs(&spec("EURUSD"), &spec("EURUSD.m"));
        assert_eq!(score.confidence, 100);
        assert!(score.warnings.is_empty());
        assert_eq!(score.band(), ConfidenceBand::High);
    }

    #[test]
    fn test_contract_size_difference_deducts() {
        let master = spec("EURUSD");
        let mut receiver = spec("EURUSD");
        receiver.contract_size = dec!(50000); // 50% difference
        let score = score_specs(&master, &receiver);
        assert!(score.confidence <= 75);
        assert!(score.warnings.iter().any(|w| w.contains("contract size")));
    }

    #[test]
    fn test_deductions_independent_and_floored() {
        let master = spec("EURUSD");
        let mut receiver = spec("JPXJPY");
        receiver.contract_size = dec!(1000);
        receiver.digits = 3;
        receiver.tick_size = dec!(0.001);
        receiver.tick_value = dec!(100);
        receiver.profit_currency = "JPY".to_string();
        let score = score_specs(&master, &receiver);
        // 25 + 20 + 15 + 10 + 20 = 90 in deductions
        assert_eq!(score.confidence, 10);
        assert_eq!(score.warnings.len(), 5);
        assert_eq!(score.band(), ConfidenceBand::ManualRequired);
    }

    #[test]
    fn test_profit_currency_case_insensitive() {
        let master = spec("EURUSD");
        let mut receiver = spec("EURUSD");
        receiver.profit_currency = "usd".to_string();
        assert_eq!(score_specs(&master, &receiver).confidence, 100);
    }

    #[test]
    fn test_auto_map_exact() {
        let catalog = SymbolCatalog::new();
        catalog.replace_all(vec![spec("EURUSD")]);
        let mapping = SymbolMapper::auto_map(&spec("EURUSD"), &catalog).unwrap();
        assert_eq!(mapping.receiver_symbol, "EURUSD");
        assert_eq!(mapping.match_method, MatchMethod::Exact);
        assert_eq!(mapping.confidence, 100);
        assert!(mapping.enabled);
    }

    #[test]
    fn test_auto_map_normalized() {
        let catalog = SymbolCatalog::new();
        catalog.replace_all(vec![spec("mEURUSD2")]);
        let mapping = SymbolMapper::auto_map(&spec("EURUSD+"), &catalog).unwrap();
        assert_eq!(mapping.receiver_symbol, "mEURUSD2");
        assert_eq!(mapping.match_method, MatchMethod::Normalized);
    }

    #[test]
    fn test_auto_map_spec_similarity_picks_best() {
        let catalog = SymbolCatalog::new();
        let mut far = spec("GOLD");
        far.contract_size = dec!(100);
        far.digits = 2;
        far.profit_currency = "EUR".to_string();
        let near = spec("FIBER");
        catalog.replace_all(vec![far, near]);

        let mapping = SymbolMapper::auto_map(&spec("EURUSD"), &catalog).unwrap();
        assert_eq!(mapping.receiver_symbol, "FIBER");
        assert_eq!(mapping.match_method, MatchMethod::SpecSimilarity);
        assert_eq!(mapping.confidence, 100);
    }

    #[test]
    fn test_auto_map_low_confidence_disabled() {
        let catalog = SymbolCatalog::new();
        let mut other = spec("US30");
        other.contract_size = dec!(10);
        other.digits = 2;
        other.tick_size = dec!(0.01);
        other.tick_value = dec!(10);
        other.profit_currency = "EUR".to_string();
        catalog.replace_all(vec![other]);

        let mapping = SymbolMapper::auto_map(&spec("EURUSD"), &catalog).unwrap();
        assert!(mapping.confidence < USABLE_CONFIDENCE);
        assert!(!mapping.enabled);
        assert!(!mapping.usable_for_sizing());
    }

    #[test]
    fn test_auto_map_empty_catalog_unresolved() {
        let catalog = SymbolCatalog::new();
        assert!(SymbolMapper::auto_map(&spec("EURUSD"), &catalog).is_none());
    }
}
