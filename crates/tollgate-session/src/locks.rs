//! Per-slot async locks.
//!
//! Login reads a slot's current occupant, displaces it, then registers
//! the new token. Two logins on the same slot must not interleave those
//! steps, so each slot gets its own `tokio::sync::Mutex`. Locks are
//! created on first use and dropped again once nobody holds or waits on
//! them, so the map only ever contains slots with in-flight operations.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::AccountId;

/// What a lock covers: one device slot, or a whole account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum LockKey {
    Slot(AccountId, String),
    Account(AccountId),
}

#[derive(Debug, Default)]
pub(crate) struct SlotLocks {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl SlotLocks {
    /// Waits for exclusive access to `key`.
    pub(crate) async fn acquire(&self, key: LockKey) -> SlotGuard<'_> {
        // Clone the Arc and release the shard lock before awaiting.
        let mutex = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let guard = mutex.lock_owned().await;
        SlotGuard {
            locks: &self.locks,
            key,
            guard: Some(guard),
        }
    }

    /// Number of lock entries currently allocated.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Holds a slot lock until dropped.
pub(crate) struct SlotGuard<'a> {
    locks: &'a DashMap<LockKey, Arc<Mutex<()>>>,
    key: LockKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        // Unlock first, then drop the entry if we held the last reference.
        // Waiters hold their own Arc clone, which keeps the entry alive.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(device: &str) -> LockKey {
        LockKey::Slot(AccountId::from(1u64), device.to_string())
    }

    #[tokio::test]
    async fn test_guard_drop_removes_idle_entry() {
        let locks = SlotLocks::default();

        let guard = locks.acquire(slot("PC")).await;
        assert_eq!(locks.len(), 1);
        drop(guard);

        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_distinct_slots_do_not_block_each_other() {
        let locks = SlotLocks::default();

        let _pc = locks.acquire(slot("PC")).await;
        let _mobile = locks.acquire(slot("Mobile")).await;

        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_same_slot_is_exclusive() {
        let locks = Arc::new(SlotLocks::default());
        let first = locks.acquire(slot("PC")).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire(slot("PC")).await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished(), "second acquire must wait");

        drop(first);
        contender.await.unwrap();
        assert_eq!(locks.len(), 0);
    }
}
