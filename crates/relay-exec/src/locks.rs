//! Per-key dispatch serialization.
//!
//! At most one non-terminal command may be in flight for a given
//! (receiver, master position) pair. Signal dispatch and reconciliation
//! dispatch both acquire the pair's lock before sending, so the two
//! activity sources serialize on the pair without sharing a global lock.

use dashmap::DashMap;
use relay_core::{AccountId, PositionId};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async locks keyed by (receiver, master position).
#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<(AccountId, PositionId), Arc<Mutex<()>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a pair, waiting if the pair is already in
    /// flight. Unrelated pairs never contend.
    pub async fn acquire(
        &self,
        receiver: &AccountId,
        master_position: PositionId,
    ) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry((receiver.clone(), master_position))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_pair_serializes() {
        let locks = Arc::new(KeyedLocks::new());
        let recv = AccountId::from("recv-1");

        let guard = locks.acquire(&recv, PositionId(1)).await;
        let locks2 = locks.clone();
        let recv2 = recv.clone();
        let pending = tokio::spawn(async move {
            let _g = locks2.acquire(&recv2, PositionId(1)).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_pairs_do_not_contend() {
        let locks = KeyedLocks::new();
        let recv = AccountId::from("recv-1");
        let _a = locks.acquire(&recv, PositionId(1)).await;
        // Different position on the same receiver acquires immediately.
        let _b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&recv, PositionId(2)),
        )
        .await
        .unwrap();
        // Same position on a different receiver acquires immediately.
        let _c = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&AccountId::from("recv-2"), PositionId(1)),
        )
        .await
        .unwrap();
    }
}
