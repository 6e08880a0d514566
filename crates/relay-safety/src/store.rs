//! Halt-state persistence.
//!
//! A receiver halted by its daily-loss or drawdown limit must stay halted
//! across a process restart. State is small (a few counters per receiver),
//! so it is written as a JSON snapshot after every mutation and read back
//! once at startup.

use crate::error::SafetyResult;
use crate::gate::ReceiverSnapshot;
use relay_core::AccountId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// JSON-file snapshot store for per-receiver safety state.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the persisted snapshot. A missing file is an empty state, not
    /// an error.
    pub fn load(&self) -> SafetyResult<HashMap<AccountId, ReceiverSnapshot>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let states = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), "Loaded safety state snapshot");
        Ok(states)
    }

    /// Write the full snapshot, replacing any previous one.
    ///
    /// Writes to a sibling temp file first so a crash mid-write cannot
    /// truncate the previous snapshot.
    pub fn save(&self, states: &HashMap<AccountId, ReceiverSnapshot>) -> SafetyResult<()> {
        let json = serde_json::to_string_pretty(states)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let mut states = HashMap::new();
        states.insert(AccountId::from("recv-1"), ReceiverSnapshot::default());
        store.save(&states).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&AccountId::from("recv-1")));
    }
}
