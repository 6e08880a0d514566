//! Per-account instrument catalogs.
//!
//! Caches instrument specifications fetched from each account's platform.
//! Entries are immutable snapshots; a catalog refresh replaces the whole
//! set and bumps the version.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use relay_core::SymbolSpec;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Instrument catalog for a single account.
pub struct SymbolCatalog {
    specs: DashMap<String, SymbolSpec>,
    version: AtomicU64,
    last_refresh: RwLock<Option<DateTime<Utc>>>,
}

impl Default for SymbolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            specs: DashMap::new(),
            version: AtomicU64::new(0),
            last_refresh: RwLock::new(None),
        }
    }

    /// Get the spec for a symbol, if present.
    pub fn get(&self, symbol: &str) -> Option<SymbolSpec> {
        self.specs.get(symbol).map(|e| e.clone())
    }

    /// Whether the catalog lists a symbol under exactly this name.
    pub fn contains(&self, symbol: &str) -> bool {
        self.specs.contains_key(symbol)
    }

    /// All symbol names currently listed.
    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|e| e.key().clone()).collect()
    }

    /// All specs currently listed.
    pub fn specs(&self) -> Vec<SymbolSpec> {
        self.specs.iter().map(|e| e.value().clone()).collect()
    }

    /// Replace the whole catalog with a fresh snapshot.
    pub fn replace_all(&self, snapshot: Vec<SymbolSpec>) {
        self.specs.clear();
        let count = snapshot.len();
        for spec in snapshot {
            self.specs.insert(spec.name.clone(), spec);
        }
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_refresh.write() = Some(Utc::now());
        debug!(version, count, "Symbol catalog refreshed");
    }

    /// Snapshot version, incremented on each refresh.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Time of the last refresh, if any.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.read()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
