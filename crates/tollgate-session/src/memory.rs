//! In-memory implementations of [`TokenStore`] and [`AccountIndex`].
//!
//! Both are backed by `DashMap`, a sharded concurrent hash map: each shard
//! has its own lock, so operations on different keys rarely contend and
//! there is no process-wide lock. A single-key operation (`entry`,
//! `get_mut`, `remove_if`) holds its shard lock for its whole duration,
//! which is what makes per-token and per-account updates atomic.
//!
//! Suitable for tests and single-node deployments. Both types are cheap
//! to clone; clones share the same data.

use std::sync::Arc;

use dashmap::DashMap;

use crate::store::{AccountIndex, TokenStore};
use crate::{AccountId, SessionError, SessionRecord, SessionStatus};

// ---------------------------------------------------------------------------
// MemoryTokenStore
// ---------------------------------------------------------------------------

/// Token store keeping records in a `DashMap`.
///
/// Expired records stay readable until [`purge_expired`] removes them,
/// so a check can still report "expired" rather than "not found".
///
/// [`purge_expired`]: TokenStore::purge_expired
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    records: Arc<DashMap<String, SessionRecord>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records (any status).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl TokenStore for MemoryTokenStore {
    async fn put(&self, record: SessionRecord) -> Result<(), SessionError> {
        self.records.insert(record.token.clone(), record);
        Ok(())
    }

    async fn get(
        &self,
        token: &str,
    ) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self.records.get(token).map(|r| r.value().clone()))
    }

    async fn delete(&self, token: &str) -> Result<(), SessionError> {
        self.records.remove(token);
        Ok(())
    }

    async fn mark_status(
        &self,
        token: &str,
        status: SessionStatus,
    ) -> Result<(), SessionError> {
        let mut record = self
            .records
            .get_mut(token)
            .ok_or_else(|| SessionError::NotFound(token.to_string()))?;
        if record.status != status {
            if !record.status.can_transition_to(status) {
                return Err(SessionError::InvalidTransition {
                    from: record.status,
                    to: status,
                });
            }
            record.status = status;
        }
        Ok(())
    }

    async fn touch(
        &self,
        token: &str,
        last_touched_at_ms: u64,
        expires_at_ms: Option<u64>,
    ) -> Result<(), SessionError> {
        let mut record = self
            .records
            .get_mut(token)
            .ok_or_else(|| SessionError::NotFound(token.to_string()))?;
        record.last_touched_at_ms = last_touched_at_ms;
        record.expires_at_ms = expires_at_ms;
        Ok(())
    }

    async fn purge_expired(
        &self,
        now_ms: u64,
    ) -> Result<Vec<SessionRecord>, SessionError> {
        let mut purged = Vec::new();
        self.records.retain(|_, record| {
            if record.is_expired(now_ms) {
                purged.push(record.clone());
                false
            } else {
                true
            }
        });
        Ok(purged)
    }
}

// ---------------------------------------------------------------------------
// MemoryAccountIndex
// ---------------------------------------------------------------------------

/// Account index keeping each account's slots in registration order.
///
/// The per-account `Vec` is small (one entry per device), so a linear
/// scan by device label is cheaper than a nested map and keeps ordering
/// for free.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountIndex {
    slots: Arc<DashMap<AccountId, Vec<(String, String)>>>,
}

impl MemoryAccountIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts with at least one registered slot.
    pub fn account_count(&self) -> usize {
        self.slots.len()
    }

    /// Drops the account's entry if its last slot is gone.
    ///
    /// `remove_if` re-checks emptiness under the shard lock, so a
    /// concurrent `register` is never lost.
    fn prune(&self, account: &AccountId) {
        self.slots.remove_if(account, |_, slots| slots.is_empty());
    }
}

impl AccountIndex for MemoryAccountIndex {
    async fn register(
        &self,
        account: &AccountId,
        device: &str,
        token: &str,
    ) -> Result<Option<String>, SessionError> {
        let mut slots = self.slots.entry(account.clone()).or_default();
        match slots.iter_mut().find(|(d, _)| d == device) {
            Some((_, current)) => {
                Ok(Some(std::mem::replace(current, token.to_string())))
            }
            None => {
                slots.push((device.to_string(), token.to_string()));
                Ok(None)
            }
        }
    }

    async fn lookup(
        &self,
        account: &AccountId,
    ) -> Result<Vec<(String, String)>, SessionError> {
        Ok(self
            .slots
            .get(account)
            .map(|slots| slots.value().clone())
            .unwrap_or_default())
    }

    async fn lookup_device(
        &self,
        account: &AccountId,
        device: &str,
    ) -> Result<Option<String>, SessionError> {
        Ok(self.slots.get(account).and_then(|slots| {
            slots
                .iter()
                .find(|(d, _)| d == device)
                .map(|(_, token)| token.clone())
        }))
    }

    async fn unregister(
        &self,
        account: &AccountId,
        device: &str,
    ) -> Result<(), SessionError> {
        if let Some(mut slots) = self.slots.get_mut(account) {
            slots.retain(|(d, _)| d != device);
        }
        self.prune(account);
        Ok(())
    }

    async fn unregister_token(
        &self,
        account: &AccountId,
        device: &str,
        token: &str,
    ) -> Result<bool, SessionError> {
        let removed = match self.slots.get_mut(account) {
            Some(mut slots) => {
                let before = slots.len();
                slots.retain(|(d, t)| !(d == device && t == token));
                slots.len() != before
            }
            None => false,
        };
        self.prune(account);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(token: &str, expires_at_ms: Option<u64>) -> SessionRecord {
        SessionRecord {
            token: token.into(),
            account: AccountId::from(1u64),
            device: "PC".into(),
            status: SessionStatus::Active,
            created_at_ms: 0,
            last_touched_at_ms: 0,
            expires_at_ms,
            timeout_ms: None,
        }
    }

    fn acct(id: u64) -> AccountId {
        AccountId::from(id)
    }

    // =====================================================================
    // MemoryTokenStore
    // =====================================================================

    #[tokio::test]
    async fn test_put_then_get_returns_record() {
        let store = MemoryTokenStore::new();
        store.put(record("a", None)).await.unwrap();

        let got = store.get("a").await.unwrap();

        assert_eq!(got, Some(record("a", None)));
    }

    #[tokio::test]
    async fn test_put_overwrites_and_resets_expiry() {
        let store = MemoryTokenStore::new();
        store.put(record("a", Some(10))).await.unwrap();
        store.put(record("a", Some(99))).await.unwrap();

        let got = store.get("a").await.unwrap().unwrap();

        assert_eq!(got.expires_at_ms, Some(99));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryTokenStore::new();
        store.put(record("a", None)).await.unwrap();

        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();

        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_status_missing_token_returns_not_found() {
        let store = MemoryTokenStore::new();

        let result = store.mark_status("nope", SessionStatus::Kicked).await;

        assert!(matches!(result, Err(SessionError::NotFound(t)) if t == "nope"));
    }

    #[tokio::test]
    async fn test_mark_status_preserves_expiry_and_is_idempotent() {
        let store = MemoryTokenStore::new();
        store.put(record("a", Some(500))).await.unwrap();

        store.mark_status("a", SessionStatus::Kicked).await.unwrap();
        store.mark_status("a", SessionStatus::Kicked).await.unwrap();

        let got = store.get("a").await.unwrap().unwrap();
        assert_eq!(got.status, SessionStatus::Kicked);
        assert_eq!(got.expires_at_ms, Some(500));
    }

    #[tokio::test]
    async fn test_mark_status_rejects_resurrection() {
        let store = MemoryTokenStore::new();
        store.put(record("a", None)).await.unwrap();
        store.mark_status("a", SessionStatus::Replaced).await.unwrap();

        let result = store.mark_status("a", SessionStatus::Active).await;

        assert!(matches!(
            result,
            Err(SessionError::InvalidTransition {
                from: SessionStatus::Replaced,
                to: SessionStatus::Active
            })
        ));
    }

    #[tokio::test]
    async fn test_touch_updates_activity_and_expiry() {
        let store = MemoryTokenStore::new();
        store.put(record("a", Some(100))).await.unwrap();

        store.touch("a", 50, Some(150)).await.unwrap();

        let got = store.get("a").await.unwrap().unwrap();
        assert_eq!(got.last_touched_at_ms, 50);
        assert_eq!(got.expires_at_ms, Some(150));
        assert!(matches!(
            store.touch("b", 0, None).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_purge_expired_removes_only_elapsed_records() {
        let store = MemoryTokenStore::new();
        store.put(record("old", Some(100))).await.unwrap();
        store.put(record("new", Some(1_000))).await.unwrap();
        store.put(record("forever", None)).await.unwrap();

        let purged = store.purge_expired(100).await.unwrap();

        assert_eq!(purged, vec![record("old", Some(100))]);
        assert!(store.get("old").await.unwrap().is_none());
        assert!(store.get("new").await.unwrap().is_some());
        assert!(store.get("forever").await.unwrap().is_some());
    }

    // =====================================================================
    // MemoryAccountIndex
    // =====================================================================

    #[tokio::test]
    async fn test_register_new_slot_returns_none() {
        let index = MemoryAccountIndex::new();

        let prev = index.register(&acct(1), "PC", "t1").await.unwrap();

        assert_eq!(prev, None);
        assert_eq!(
            index.lookup_device(&acct(1), "PC").await.unwrap(),
            Some("t1".to_string())
        );
    }

    #[tokio::test]
    async fn test_register_occupied_slot_returns_previous_token() {
        let index = MemoryAccountIndex::new();
        index.register(&acct(1), "PC", "t1").await.unwrap();

        let prev = index.register(&acct(1), "PC", "t2").await.unwrap();

        assert_eq!(prev, Some("t1".to_string()));
        assert_eq!(
            index.lookup(&acct(1)).await.unwrap(),
            vec![("PC".to_string(), "t2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_lookup_keeps_registration_order() {
        let index = MemoryAccountIndex::new();
        index.register(&acct(1), "PC", "t1").await.unwrap();
        index.register(&acct(1), "Mobile", "t2").await.unwrap();
        index.register(&acct(1), "Pad", "t3").await.unwrap();
        // Re-registering PC keeps its position.
        index.register(&acct(1), "PC", "t4").await.unwrap();

        let devices: Vec<String> = index
            .lookup(&acct(1))
            .await
            .unwrap()
            .into_iter()
            .map(|(d, _)| d)
            .collect();

        assert_eq!(devices, vec!["PC", "Mobile", "Pad"]);
    }

    #[tokio::test]
    async fn test_lookup_unknown_account_is_empty() {
        let index = MemoryAccountIndex::new();

        assert!(index.lookup(&acct(9)).await.unwrap().is_empty());
        assert_eq!(index.lookup_device(&acct(9), "PC").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unregister_removes_slot_and_prunes_account() {
        let index = MemoryAccountIndex::new();
        index.register(&acct(1), "PC", "t1").await.unwrap();

        index.unregister(&acct(1), "PC").await.unwrap();
        index.unregister(&acct(1), "PC").await.unwrap();

        assert!(index.lookup(&acct(1)).await.unwrap().is_empty());
        assert_eq!(index.account_count(), 0);
    }

    #[tokio::test]
    async fn test_unregister_token_ignores_newer_occupant() {
        let index = MemoryAccountIndex::new();
        index.register(&acct(1), "PC", "old").await.unwrap();
        index.register(&acct(1), "PC", "new").await.unwrap();

        let removed = index.unregister_token(&acct(1), "PC", "old").await.unwrap();

        assert!(!removed);
        assert_eq!(
            index.lookup_device(&acct(1), "PC").await.unwrap(),
            Some("new".to_string())
        );

        let removed = index.unregister_token(&acct(1), "PC", "new").await.unwrap();
        assert!(removed);
        assert_eq!(index.account_count(), 0);
    }
}
