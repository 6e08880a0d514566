//! Persisted symbol mappings and per-symbol overrides.

use crate::catalog::SymbolCatalog;
use crate::error::{SymbolError, SymbolResult};
use crate::mapper::{SymbolMapper, USABLE_CONFIDENCE};
use dashmap::DashMap;
use relay_core::{Lots, SymbolSpec};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a mapping was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Normalized,
    SpecSimilarity,
    /// Entered or edited by the user.
    Manual,
}

/// A master→receiver symbol mapping.
///
/// Auto-generated entries are seed values the user may override. Entries
/// below the usable confidence band must be manually confirmed before they
/// participate in live sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolMapping {
    pub master_symbol: String,
    pub receiver_symbol: String,
    pub enabled: bool,
    pub match_method: MatchMethod,
    pub confidence: u8,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// User has reviewed and confirmed a low-confidence match.
    #[serde(default)]
    pub confirmed: bool,
}

impl SymbolMapping {
    /// Build an auto-generated seed mapping.
    ///
    /// Entries below the usable band come back disabled.
    #[must_use]
    pub fn auto(
        master_symbol: &str,
        receiver_symbol: &str,
        match_method: MatchMethod,
        confidence: u8,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            master_symbol: master_symbol.to_string(),
            receiver_symbol: receiver_symbol.to_string(),
            enabled: confidence >= USABLE_CONFIDENCE,
            match_method,
            confidence,
            warnings,
            confirmed: false,
        }
    }

    /// Build a manual mapping; manual entries are always confirmed.
    #[must_use]
    pub fn manual(master_symbol: &str, receiver_symbol: &str) -> Self {
        Self {
            master_symbol: master_symbol.to_string(),
            receiver_symbol: receiver_symbol.to_string(),
            enabled: true,
            match_method: MatchMethod::Manual,
            confidence: 100,
            warnings: Vec::new(),
            confirmed: true,
        }
    }

    /// Whether this mapping may drive live sizing.
    #[must_use]
    pub fn usable_for_sizing(&self) -> bool {
        self.enabled && (self.confidence >= USABLE_CONFIDENCE || self.confirmed)
    }
}

/// Per-symbol sizing override, applied after the base risk computation and
/// before broker rounding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolOverride {
    pub symbol: String,
    #[serde(default = "default_lot_multiplier")]
    pub lot_multiplier: Decimal,
    #[serde(default)]
    pub max_lots: Option<Lots>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_lot_multiplier() -> Decimal {
    Decimal::ONE
}

fn default_enabled() -> bool {
    true
}

/// Mapping store for one receiver: master symbol → mapping, plus overrides
/// keyed by receiver symbol.
#[derive(Default)]
pub struct MappingTable {
    mappings: DashMap<String, SymbolMapping>,
    overrides: DashMap<String, SymbolOverride>,
}

impl MappingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load persisted entries.
    pub fn load(mappings: Vec<SymbolMapping>, overrides: Vec<SymbolOverride>) -> Self {
        let table = Self::new();
        for m in mappings {
            table.mappings.insert(m.master_symbol.clone(), m);
        }
        for o in overrides {
            table.overrides.insert(o.symbol.clone(), o);
        }
        table
    }

    /// Insert or replace a mapping.
    pub fn upsert(&self, mapping: SymbolMapping) {
        self.mappings.insert(mapping.master_symbol.clone(), mapping);
    }

    /// Insert or replace an override.
    pub fn upsert_override(&self, ov: SymbolOverride) {
        self.overrides.insert(ov.symbol.clone(), ov);
    }

    /// Look up the stored mapping for a master symbol.
    pub fn get(&self, master_symbol: &str) -> Option<SymbolMapping> {
        self.mappings.get(master_symbol).map(|e| e.clone())
    }

    /// Active override for a receiver symbol, if any.
    pub fn override_for(&self, receiver_symbol: &str) -> Option<SymbolOverride> {
        self.overrides
            .get(receiver_symbol)
            .filter(|o| o.enabled)
            .map(|e| e.clone())
    }

    /// Resolve a master symbol to a mapping usable for live sizing.
    ///
    /// Seeds a fresh auto-mapping from the receiver catalog on first sight
    /// of a symbol. Fails when no mapping can be generated, the mapping is
    /// disabled, or its confidence is below the usable threshold without
    /// manual confirmation.
    pub fn resolve(
        &self,
        master_spec: &SymbolSpec,
        receiver_catalog: &SymbolCatalog,
    ) -> SymbolResult<SymbolMapping> {
        let mapping = match self.get(&master_spec.name) {
            Some(m) => m,
            None => {
                let seeded = SymbolMapper::auto_map(master_spec, receiver_catalog).ok_or(
                    SymbolError::Unresolved {
                        symbol: master_spec.name.clone(),
                    },
                )?;
                self.upsert(seeded.clone());
                seeded
            }
        };

        if !mapping.enabled {
            return Err(SymbolError::Disabled {
                symbol: master_spec.name.clone(),
            });
        }
        if !mapping.usable_for_sizing() {
            return Err(SymbolError::BelowConfidence {
                symbol: master_spec.name.clone(),
                confidence: mapping.confidence,
            });
        }
        Ok(mapping)
    }

    /// All stored mappings, for persistence and display.
    pub fn mappings(&self) -> Vec<SymbolMapping> {
        self.mappings.iter().map(|e| e.value().clone()).collect()
    }
}
