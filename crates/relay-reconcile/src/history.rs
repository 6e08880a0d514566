//! Append-only record of corrective actions.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use relay_core::AccountId;
use serde::Serialize;
use std::collections::VecDeque;

/// One attempted corrective action, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileAction {
    pub timestamp: DateTime<Utc>,
    pub receiver: AccountId,
    pub action_type: String,
    pub symbol: String,
    pub details: String,
    pub success: bool,
    pub error: Option<String>,
}

impl ReconcileAction {
    pub fn success(
        receiver: &AccountId,
        action_type: &str,
        symbol: &str,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            receiver: receiver.clone(),
            action_type: action_type.to_string(),
            symbol: symbol.to_string(),
            details: details.into(),
            success: true,
            error: None,
        }
    }

    pub fn failure(
        receiver: &AccountId,
        action_type: &str,
        symbol: &str,
        details: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            receiver: receiver.clone(),
            action_type: action_type.to_string(),
            symbol: symbol.to_string(),
            details: details.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Bounded in-memory action history, oldest records dropped first.
pub struct ActionHistory {
    records: Mutex<VecDeque<ReconcileAction>>,
    capacity: usize,
}

impl ActionHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub fn append(&self, action: ReconcileAction) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(action);
    }

    /// Most recent records, newest last, up to `limit`.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<ReconcileAction> {
        let records = self.records.lock();
        let skip = records.len().saturating_sub(limit);
        records.iter().skip(skip).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for ActionHistory {
    fn default() -> Self {
        Self::new(1000)
    }
}
