//! Storage seams: the token store and the account index.
//!
//! Tollgate doesn't ship a persistence engine. It defines two traits and
//! the session manager drives them; you back them with Redis, a database,
//! or the in-memory implementations in this crate.
//!
//! Both traits are async (`impl Future + Send`) so a network-backed
//! implementation can await I/O, and `Send + Sync + 'static` so one
//! instance can be shared by every task serving requests.
//!
//! # Atomicity contract
//!
//! - Every `TokenStore` method is atomic with respect to other calls on
//!   the same token.
//! - `AccountIndex::register` and `unregister_token` are atomic
//!   read-modify-write operations on one (account, device) slot.
//!
//! Nothing here needs a lock spanning several tokens or accounts.

use std::future::Future;

use crate::{AccountId, SessionError, SessionRecord, SessionStatus};

/// Durable, expiry-aware storage of session records keyed by token value.
pub trait TokenStore: Send + Sync + 'static {
    /// Inserts or overwrites the record stored under `record.token`.
    ///
    /// The record's `expires_at_ms` becomes the entry's expiry, restarting
    /// the expiry clock for an overwritten entry.
    fn put(
        &self,
        record: SessionRecord,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Reads a record. Never changes its expiry.
    fn get(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<SessionRecord>, SessionError>> + Send;

    /// Removes a record. Removing a missing token is not an error.
    fn delete(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Changes a record's status in place, keeping its expiry.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if the token does not exist.
    ///
    /// Setting the status a record already has succeeds without change.
    fn mark_status(
        &self,
        token: &str,
        status: SessionStatus,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Updates a record's last-activity time and expiry together.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if the token does not exist.
    fn touch(
        &self,
        token: &str,
        last_touched_at_ms: u64,
        expires_at_ms: Option<u64>,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Evicts every record whose expiry is at or before `now_ms`.
    ///
    /// Returns the removed records so the caller can free their index
    /// slots. Stores with native TTL eviction may return an empty list.
    fn purge_expired(
        &self,
        now_ms: u64,
    ) -> impl Future<Output = Result<Vec<SessionRecord>, SessionError>> + Send;
}

/// Secondary index from (account, device) slots to token values.
pub trait AccountIndex: Send + Sync + 'static {
    /// Records `token` as the occupant of the (account, device) slot.
    ///
    /// Returns the token that occupied the slot before, if any, so the
    /// caller can transition it. A re-registered device keeps its original
    /// position in the account's ordering.
    fn register(
        &self,
        account: &AccountId,
        device: &str,
        token: &str,
    ) -> impl Future<Output = Result<Option<String>, SessionError>> + Send;

    /// Lists the account's slots as `(device, token)` in the order the
    /// devices were first registered.
    fn lookup(
        &self,
        account: &AccountId,
    ) -> impl Future<Output = Result<Vec<(String, String)>, SessionError>> + Send;

    /// The token occupying one slot.
    fn lookup_device(
        &self,
        account: &AccountId,
        device: &str,
    ) -> impl Future<Output = Result<Option<String>, SessionError>> + Send;

    /// Removes one slot, whatever token it holds. Idempotent.
    fn unregister(
        &self,
        account: &AccountId,
        device: &str,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Removes the slot only if it still holds `token`.
    ///
    /// Returns `true` if the slot was removed. Finalizing a displaced
    /// token uses this so it can never clear the slot's new occupant.
    fn unregister_token(
        &self,
        account: &AccountId,
        device: &str,
        token: &str,
    ) -> impl Future<Output = Result<bool, SessionError>> + Send;
}
