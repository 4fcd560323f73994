//! The session manager: the token lifecycle state machine.
//!
//! This is the central piece of the session layer. It's responsible for:
//! - Issuing tokens on login and displacing a slot's previous occupant
//! - The three invalidations: logout (hard), kickout and replace (soft)
//! - Answering "is this token valid, and if not, why?"
//! - Sliding expiration, idle timeouts and explicit renewal
//!
//! # Concurrency
//!
//! `SessionManager` is `Send + Sync` and meant to be shared behind an
//! `Arc`. It holds no lock of its own over the stores: per-token
//! atomicity comes from the [`TokenStore`], and login's
//! read-displace-register sequence runs under a lock scoped to one
//! (account, device) slot. Logins on different slots never wait on each
//! other. When `concurrent` is off or a session cap is configured, a
//! login touches several slots of one account, so the lock widens to the
//! whole account (still never to other accounts).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::locks::{LockKey, SlotLocks};
use crate::session::duration_ms;
use crate::store::{AccountIndex, TokenStore};
use crate::token::{generate_token, redact};
use crate::{
    AccountId, Clock, InvalidReason, LoginOptions, SessionConfig,
    SessionError, SessionRecord, SessionStatus, SystemClock, Validity,
};

/// Drives the token lifecycle over a [`TokenStore`] and an
/// [`AccountIndex`].
///
/// ## Lifecycle
///
/// ```text
/// login() ──→ [Active] ──┬── logout_*()  ──→ (deleted)
///                        ├── kickout_*() ──→ [Kicked]   ─┐
///                        └── replace_*() ──→ [Replaced] ─┴─→ (evicted at TTL)
///
/// login() on an occupied slot: previous occupant ──→ [Replaced]
/// ```
///
/// Every invalidation comes in three granularities: a whole account,
/// one (account, device) slot, or one raw token.
pub struct SessionManager<S, I> {
    store: S,
    index: I,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    locks: SlotLocks,
}

impl<S: TokenStore, I: AccountIndex> SessionManager<S, I> {
    /// Creates a manager reading time from the system clock.
    pub fn new(store: S, index: I, config: SessionConfig) -> Self {
        Self {
            store,
            index,
            clock: Arc::new(SystemClock),
            config,
            locks: SlotLocks::default(),
        }
    }

    /// Replaces the time source (tests use a
    /// [`ManualClock`](crate::ManualClock)).
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying token store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The underlying account index.
    pub fn index(&self) -> &I {
        &self.index
    }

    // =====================================================================
    // Login
    // =====================================================================

    /// Logs `account` in on `device` (or the default device) and returns
    /// the new token.
    pub async fn login(
        &self,
        account: &AccountId,
        device: Option<&str>,
    ) -> Result<String, SessionError> {
        let options = LoginOptions {
            device: device.map(str::to_string),
            timeout: None,
        };
        Ok(self.login_with(account, options).await?.token)
    }

    /// Logs `account` in with explicit options and returns the new record.
    ///
    /// If the (account, device) slot is already occupied, the occupant is
    /// marked `Replaced` before the new token becomes visible, so a slot
    /// never holds two `Active` tokens. With `concurrent` off, every other
    /// device of the account is displaced the same way. With a session
    /// cap, the oldest slots beyond the cap are logged out afterwards.
    ///
    /// # Errors
    /// Only [`SessionError::StoreUnavailable`] (or another error surfaced
    /// by the store).
    pub async fn login_with(
        &self,
        account: &AccountId,
        options: LoginOptions,
    ) -> Result<SessionRecord, SessionError> {
        let device = options
            .device
            .unwrap_or_else(|| self.config.default_device.clone());
        let timeout = options.timeout.or(self.config.timeout());

        let _guard = self.locks.acquire(self.lock_key(account, &device)).await;

        // Displace whoever holds the slot (or, in exclusive mode, every
        // slot of the account) before the new token exists.
        if self.config.concurrent {
            let occupant = self
                .bounded(self.index.lookup_device(account, &device))
                .await?;
            if let Some(occupant) = occupant {
                self.soft_invalidate(&occupant, SessionStatus::Replaced)
                    .await?;
            }
        } else {
            let slots = self.bounded(self.index.lookup(account)).await?;
            for (slot_device, occupant) in slots {
                if !self
                    .soft_invalidate(&occupant, SessionStatus::Replaced)
                    .await?
                {
                    self.release_slot(account, &slot_device, &occupant).await?;
                }
            }
        }

        let now = self.clock.now_ms();
        let timeout_ms = timeout.map(duration_ms);
        let record = SessionRecord {
            token: generate_token(self.config.token_style),
            account: account.clone(),
            device: device.clone(),
            status: SessionStatus::Active,
            created_at_ms: now,
            last_touched_at_ms: now,
            expires_at_ms: timeout_ms.map(|t| now.saturating_add(t)),
            timeout_ms,
        };

        self.bounded(self.store.put(record.clone())).await?;
        let previous = self
            .bounded(self.index.register(account, &device, &record.token))
            .await?;

        // Another process sharing the index may have registered a token
        // between our lookup and register.
        if let Some(previous) = previous.filter(|p| *p != record.token) {
            self.mark_soft(&previous, SessionStatus::Replaced).await?;
        }

        if let Some(max) = self.config.max_sessions_per_account {
            self.enforce_session_cap(account, &record.token, max).await?;
        }

        tracing::info!(
            %account,
            device = %device,
            token = redact(&record.token),
            "session created"
        );
        Ok(record)
    }

    /// Logs out the oldest live sessions until at most `max` remain,
    /// never touching the token that was just issued.
    ///
    /// Slots whose record was purged, has expired or is no longer
    /// `Active` don't count toward the cap; they are released instead.
    async fn enforce_session_cap(
        &self,
        account: &AccountId,
        keep: &str,
        max: usize,
    ) -> Result<(), SessionError> {
        let now = self.clock.now_ms();
        let slots = self.bounded(self.index.lookup(account)).await?;
        let mut live = Vec::with_capacity(slots.len());
        for (device, token) in slots {
            if token == keep {
                continue;
            }
            let record = self.bounded(self.store.get(&token)).await?;
            match record {
                Some(r) if r.status.is_active() && !r.is_expired(now) => {
                    live.push((device, token));
                }
                _ => self.release_slot(account, &device, &token).await?,
            }
        }

        // The new session is live too.
        let excess = (live.len() + 1).saturating_sub(max.max(1));
        for (device, token) in live.into_iter().take(excess) {
            tracing::info!(
                %account,
                device = %device,
                token = redact(&token),
                max,
                "session cap reached, logging out oldest session"
            );
            self.hard_invalidate(&token).await?;
        }
        Ok(())
    }

    // =====================================================================
    // Logout (hard)
    // =====================================================================

    /// Logs out one token: its record is deleted outright.
    ///
    /// Logging out a token that doesn't exist succeeds.
    pub async fn logout_token(&self, token: &str) -> Result<(), SessionError> {
        self.hard_invalidate(token).await.map(|_| ())
    }

    /// Logs out whatever token occupies the (account, device) slot.
    pub async fn logout_device(
        &self,
        account: &AccountId,
        device: &str,
    ) -> Result<(), SessionError> {
        self.invalidate_device(account, device, SessionStatus::LoggedOut)
            .await
    }

    /// Logs out every device of the account.
    pub async fn logout_account(
        &self,
        account: &AccountId,
    ) -> Result<(), SessionError> {
        self.invalidate_account(account, SessionStatus::LoggedOut)
            .await
    }

    // =====================================================================
    // Kickout (soft)
    // =====================================================================

    /// Kicks one token. The record stays in the store, marked `Kicked`,
    /// until its TTL runs out.
    pub async fn kickout_token(&self, token: &str) -> Result<(), SessionError> {
        self.soft_invalidate(token, SessionStatus::Kicked)
            .await
            .map(|_| ())
    }

    /// Kicks whatever token occupies the (account, device) slot.
    pub async fn kickout_device(
        &self,
        account: &AccountId,
        device: &str,
    ) -> Result<(), SessionError> {
        self.invalidate_device(account, device, SessionStatus::Kicked)
            .await
    }

    /// Kicks every device of the account.
    pub async fn kickout_account(
        &self,
        account: &AccountId,
    ) -> Result<(), SessionError> {
        self.invalidate_account(account, SessionStatus::Kicked).await
    }

    // =====================================================================
    // Replace (soft)
    // =====================================================================

    /// Marks one token `Replaced`, as if a newer login had displaced it.
    pub async fn replace_token(&self, token: &str) -> Result<(), SessionError> {
        self.soft_invalidate(token, SessionStatus::Replaced)
            .await
            .map(|_| ())
    }

    /// Marks the (account, device) slot's token `Replaced`.
    pub async fn replace_device(
        &self,
        account: &AccountId,
        device: &str,
    ) -> Result<(), SessionError> {
        self.invalidate_device(account, device, SessionStatus::Replaced)
            .await
    }

    /// Marks every token of the account `Replaced`.
    pub async fn replace_account(
        &self,
        account: &AccountId,
    ) -> Result<(), SessionError> {
        self.invalidate_account(account, SessionStatus::Replaced)
            .await
    }

    // =====================================================================
    // Checks and queries
    // =====================================================================

    /// Checks whether `token` may be used right now.
    ///
    /// A token is valid only if its record exists, is `Active`, hasn't
    /// expired and (when an idle limit is set) hasn't sat idle too long.
    /// A valid check records the activity and, with sliding expiration,
    /// pushes the expiry out.
    ///
    /// Terminal states are reported before time-based ones: a kicked
    /// token whose TTL has also elapsed reads as `Kicked`.
    ///
    /// # Errors
    /// Only store failures. An unusable token is `Ok(Validity::Invalid)`.
    pub async fn is_valid(&self, token: &str) -> Result<Validity, SessionError> {
        let Some(mut record) = self.bounded(self.store.get(token)).await?
        else {
            return Ok(Validity::Invalid(InvalidReason::NotFound));
        };

        let reason = match record.status {
            SessionStatus::Active => None,
            SessionStatus::LoggedOut => Some(InvalidReason::NotFound),
            SessionStatus::Kicked => Some(InvalidReason::Kicked),
            SessionStatus::Replaced => Some(InvalidReason::Replaced),
        };
        if let Some(reason) = reason {
            return Ok(Validity::Invalid(reason));
        }

        let now = self.clock.now_ms();
        if record.is_expired(now) {
            return Ok(Validity::Invalid(InvalidReason::Expired));
        }
        if let Some(idle) = self.config.idle_timeout() {
            if record.is_idle(now, idle) {
                return Ok(Validity::Invalid(InvalidReason::IdleTimeout));
            }
        }

        if self.config.idle_timeout_secs.is_some()
            || self.config.sliding_expiration
        {
            let expires_at_ms = if self.config.sliding_expiration {
                record.timeout_ms.map(|t| now.saturating_add(t))
            } else {
                record.expires_at_ms
            };
            match self
                .bounded(self.store.touch(token, now, expires_at_ms))
                .await
            {
                Ok(()) => {
                    record.last_touched_at_ms = now;
                    record.expires_at_ms = expires_at_ms;
                }
                // Logged out between our read and the touch.
                Err(SessionError::NotFound(_)) => {
                    return Ok(Validity::Invalid(InvalidReason::NotFound));
                }
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(
            account = %record.account,
            device = %record.device,
            token = redact(token),
            "session check passed"
        );
        Ok(Validity::Active(record))
    }

    /// Returns the stored record for `token`, whatever its status.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if the token was logged out, evicted,
    ///   or never issued.
    pub async fn introspect(
        &self,
        token: &str,
    ) -> Result<SessionRecord, SessionError> {
        self.bounded(self.store.get(token))
            .await?
            .ok_or_else(|| SessionError::NotFound(token.to_string()))
    }

    /// The token occupying one slot, if any.
    pub async fn token_of(
        &self,
        account: &AccountId,
        device: &str,
    ) -> Result<Option<String>, SessionError> {
        self.bounded(self.index.lookup_device(account, device)).await
    }

    /// The account's current session records, in device-registration
    /// order.
    ///
    /// Slots whose record has already been evicted are skipped.
    pub async fn sessions(
        &self,
        account: &AccountId,
    ) -> Result<Vec<SessionRecord>, SessionError> {
        let slots = self.bounded(self.index.lookup(account)).await?;
        let mut records = Vec::with_capacity(slots.len());
        for (_, token) in slots {
            if let Some(record) = self.bounded(self.store.get(&token)).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Restarts a token's expiry clock with `timeout` (or the configured
    /// timeout when `None`).
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if the token doesn't exist.
    /// - [`SessionError::Expired`] if its TTL already elapsed; an expired
    ///   token cannot be revived.
    pub async fn renew(
        &self,
        token: &str,
        timeout: Option<Duration>,
    ) -> Result<SessionRecord, SessionError> {
        let mut record = self.introspect(token).await?;
        let now = self.clock.now_ms();
        if record.is_expired(now) {
            return Err(SessionError::Expired(token.to_string()));
        }

        let timeout_ms = timeout.or(self.config.timeout()).map(duration_ms);
        let expires_at_ms = timeout_ms.map(|t| now.saturating_add(t));
        self.bounded(self.store.touch(token, record.last_touched_at_ms, expires_at_ms))
            .await?;
        record.expires_at_ms = expires_at_ms;

        tracing::info!(
            account = %record.account,
            device = %record.device,
            token = redact(token),
            "session renewed"
        );
        Ok(record)
    }

    /// Evicts records whose TTL elapsed and frees the slots they held.
    ///
    /// Returns how many records were evicted.
    pub async fn purge_expired(&self) -> Result<usize, SessionError> {
        let now = self.clock.now_ms();
        let purged = self.bounded(self.store.purge_expired(now)).await?;
        for record in &purged {
            self.release_slot(&record.account, &record.device, &record.token)
                .await?;
        }
        if !purged.is_empty() {
            tracing::debug!(purged = purged.len(), "expired sessions purged");
        }
        Ok(purged.len())
    }

    // =====================================================================
    // Transition primitives
    // =====================================================================

    async fn invalidate_device(
        &self,
        account: &AccountId,
        device: &str,
        target: SessionStatus,
    ) -> Result<(), SessionError> {
        let _guard = self.locks.acquire(self.lock_key(account, device)).await;
        let occupant = self
            .bounded(self.index.lookup_device(account, device))
            .await?;
        let Some(token) = occupant else {
            return Ok(());
        };
        if !self.invalidate(&token, target).await? {
            self.release_slot(account, device, &token).await?;
        }
        Ok(())
    }

    async fn invalidate_account(
        &self,
        account: &AccountId,
        target: SessionStatus,
    ) -> Result<(), SessionError> {
        let slots = self.bounded(self.index.lookup(account)).await?;
        for (device, _) in slots {
            self.invalidate_device(account, &device, target).await?;
        }
        Ok(())
    }

    async fn invalidate(
        &self,
        token: &str,
        target: SessionStatus,
    ) -> Result<bool, SessionError> {
        match target {
            SessionStatus::LoggedOut => self.hard_invalidate(token).await,
            SessionStatus::Kicked | SessionStatus::Replaced => {
                self.soft_invalidate(token, target).await
            }
            SessionStatus::Active => Err(SessionError::InvalidTransition {
                from: SessionStatus::Active,
                to: SessionStatus::Active,
            }),
        }
    }

    /// Deletes the record and frees its slot. Returns `false` if there
    /// was nothing to delete.
    async fn hard_invalidate(&self, token: &str) -> Result<bool, SessionError> {
        let record = self.bounded(self.store.get(token)).await?;
        self.bounded(self.store.delete(token)).await?;
        let Some(record) = record else {
            return Ok(false);
        };
        self.bounded(self.index.unregister_token(
            &record.account,
            &record.device,
            token,
        ))
        .await?;

        tracing::info!(
            account = %record.account,
            device = %record.device,
            token = redact(token),
            "session logged out"
        );
        Ok(true)
    }

    /// Kickout and replace: one primitive, two labels. Marks the record
    /// and frees its slot, keeping the record for the rest of its TTL.
    ///
    /// Returns `false` when the token was already gone or already in a
    /// terminal state (which is kept; a kicked token stays kicked).
    async fn soft_invalidate(
        &self,
        token: &str,
        target: SessionStatus,
    ) -> Result<bool, SessionError> {
        let Some(record) = self.bounded(self.store.get(token)).await? else {
            return Ok(false);
        };
        let changed = self.mark_soft(token, target).await?;
        self.bounded(self.index.unregister_token(
            &record.account,
            &record.device,
            token,
        ))
        .await?;

        if changed {
            let label = match target {
                SessionStatus::Kicked => "session kicked out",
                _ => "session replaced",
            };
            tracing::info!(
                account = %record.account,
                device = %record.device,
                token = redact(token),
                "{label}"
            );
        }
        Ok(changed)
    }

    /// Sets a soft terminal status, treating "already gone" and "already
    /// terminal" as success.
    async fn mark_soft(
        &self,
        token: &str,
        target: SessionStatus,
    ) -> Result<bool, SessionError> {
        match self.bounded(self.store.mark_status(token, target)).await {
            Ok(()) => Ok(true),
            Err(SessionError::NotFound(_))
            | Err(SessionError::InvalidTransition { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // =====================================================================
    // Helpers
    // =====================================================================

    /// Frees a slot whose token no longer has a live record. A newer
    /// occupant is left alone.
    async fn release_slot(
        &self,
        account: &AccountId,
        device: &str,
        token: &str,
    ) -> Result<(), SessionError> {
        let released = self
            .bounded(self.index.unregister_token(account, device, token))
            .await?;
        if released {
            tracing::debug!(
                %account,
                device = %device,
                token = redact(token),
                "stale slot released"
            );
        }
        Ok(())
    }

    fn lock_key(&self, account: &AccountId, device: &str) -> LockKey {
        if self.config.concurrent
            && self.config.max_sessions_per_account.is_none()
        {
            LockKey::Slot(account.clone(), device.to_string())
        } else {
            LockKey::Account(account.clone())
        }
    }

    /// Runs one store call under the configured deadline.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, SessionError>>,
    ) -> Result<T, SessionError> {
        let Some(deadline) = self.config.store_timeout() else {
            return call.await;
        };
        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(?deadline, "session store call timed out");
                Err(SessionError::StoreUnavailable(format!(
                    "store call exceeded {deadline:?}"
                )))
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
