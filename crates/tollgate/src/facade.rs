//! `Tollgate`: sessions and authorization behind one handle.
//!
//! This is the entry point most applications use. It ties together the
//! session manager (who holds which token, and is it still good) and
//! the guard (what may that account do).

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tollgate_guard::{Denial, GrantProvider, Guard, Requirement};
use tollgate_session::{
    AccountId, AccountIndex, Clock, InvalidReason, LoginOptions,
    MemoryAccountIndex, MemoryTokenStore, SessionManager, SessionRecord,
    TokenStore, Validity,
};

use crate::{TollgateConfig, TollgateError};

/// Outcome of [`Tollgate::check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub valid: bool,
    /// The owning account, when the token is valid.
    pub account: Option<AccountId>,
    /// Why the token is unusable, when it isn't.
    pub reason: Option<InvalidReason>,
}

impl From<Validity> for CheckResult {
    fn from(validity: Validity) -> Self {
        match validity {
            Validity::Active(record) => Self {
                valid: true,
                account: Some(record.account),
                reason: None,
            },
            Validity::Invalid(reason) => Self {
                valid: false,
                account: None,
                reason: Some(reason),
            },
        }
    }
}

/// Outcome of [`Tollgate::authorize`].
///
/// A denial has exactly one cause: either the token itself is unusable
/// (`reason`), or the account lacks something (`denial`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeResult {
    pub allowed: bool,
    /// Name of the failed sub-requirement, e.g. `"superadmin"`.
    pub failed_requirement: Option<String>,
    pub denial: Option<Denial>,
    /// Set when the token failed the session check.
    pub reason: Option<InvalidReason>,
}

impl AuthorizeResult {
    fn allowed() -> Self {
        Self {
            allowed: true,
            failed_requirement: None,
            denial: None,
            reason: None,
        }
    }

    fn invalid_token(reason: InvalidReason) -> Self {
        Self {
            allowed: false,
            failed_requirement: None,
            denial: None,
            reason: Some(reason),
        }
    }

    fn denied(denial: Denial) -> Self {
        Self {
            allowed: false,
            failed_requirement: Some(denial.requirement()),
            denial: Some(denial),
            reason: None,
        }
    }
}

/// Builder for a [`Tollgate`].
///
/// # Example
///
/// ```rust,ignore
/// let gate = TollgateBuilder::new()
///     .config(TollgateConfig::from_json_file("tollgate.json")?)
///     .build(my_store, my_index, my_grants);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TollgateBuilder {
    config: TollgateConfig,
}

impl TollgateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the whole configuration.
    pub fn config(mut self, config: TollgateConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the session timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.session.timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Allows or forbids more than one device per account.
    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.config.session.concurrent = concurrent;
        self
    }

    pub fn build<S, I, G>(self, store: S, index: I, grants: G) -> Tollgate<S, I, G>
    where
        S: TokenStore,
        I: AccountIndex,
        G: GrantProvider,
    {
        Tollgate::new(store, index, grants, self.config)
    }
}

/// Sessions plus authorization.
///
/// Meant to be shared behind an `Arc`; every method takes `&self`.
pub struct Tollgate<S, I, G> {
    sessions: SessionManager<S, I>,
    guard: Guard<G>,
    config: TollgateConfig,
}

/// A [`Tollgate`] over the in-memory store and index.
pub type MemoryTollgate<G> = Tollgate<MemoryTokenStore, MemoryAccountIndex, G>;

impl<G: GrantProvider> Tollgate<MemoryTokenStore, MemoryAccountIndex, G> {
    /// A single-process gate backed by in-memory maps.
    pub fn memory(config: TollgateConfig, grants: G) -> Self {
        Self::new(
            MemoryTokenStore::new(),
            MemoryAccountIndex::new(),
            grants,
            config,
        )
    }
}

impl<S, I, G> Tollgate<S, I, G>
where
    S: TokenStore,
    I: AccountIndex,
    G: GrantProvider,
{
    pub fn new(store: S, index: I, grants: G, config: TollgateConfig) -> Self {
        Self {
            sessions: SessionManager::new(store, index, config.session.clone()),
            guard: Guard::new(grants),
            config,
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.sessions = self.sessions.with_clock(clock);
        self
    }

    pub fn config(&self) -> &TollgateConfig {
        &self.config
    }

    /// The session manager, for operations the facade doesn't wrap.
    pub fn sessions(&self) -> &SessionManager<S, I> {
        &self.sessions
    }

    pub fn guard(&self) -> &Guard<G> {
        &self.guard
    }

    // =====================================================================
    // Login and invalidation
    // =====================================================================

    /// Logs in on `device` (or the default device) and returns the token.
    pub async fn login(
        &self,
        account: &AccountId,
        device: Option<&str>,
    ) -> Result<String, TollgateError> {
        Ok(self.sessions.login(account, device).await?)
    }

    pub async fn login_with(
        &self,
        account: &AccountId,
        options: LoginOptions,
    ) -> Result<SessionRecord, TollgateError> {
        Ok(self.sessions.login_with(account, options).await?)
    }

    pub async fn logout_account(&self, account: &AccountId) -> Result<(), TollgateError> {
        Ok(self.sessions.logout_account(account).await?)
    }

    pub async fn logout_device(
        &self,
        account: &AccountId,
        device: &str,
    ) -> Result<(), TollgateError> {
        Ok(self.sessions.logout_device(account, device).await?)
    }

    pub async fn logout_token(&self, token: &str) -> Result<(), TollgateError> {
        Ok(self.sessions.logout_token(token).await?)
    }

    pub async fn kickout_account(&self, account: &AccountId) -> Result<(), TollgateError> {
        Ok(self.sessions.kickout_account(account).await?)
    }

    pub async fn kickout_device(
        &self,
        account: &AccountId,
        device: &str,
    ) -> Result<(), TollgateError> {
        Ok(self.sessions.kickout_device(account, device).await?)
    }

    pub async fn kickout_token(&self, token: &str) -> Result<(), TollgateError> {
        Ok(self.sessions.kickout_token(token).await?)
    }

    pub async fn replace_account(&self, account: &AccountId) -> Result<(), TollgateError> {
        Ok(self.sessions.replace_account(account).await?)
    }

    pub async fn replace_device(
        &self,
        account: &AccountId,
        device: &str,
    ) -> Result<(), TollgateError> {
        Ok(self.sessions.replace_device(account, device).await?)
    }

    pub async fn replace_token(&self, token: &str) -> Result<(), TollgateError> {
        Ok(self.sessions.replace_token(token).await?)
    }

    // =====================================================================
    // Checks
    // =====================================================================

    /// Checks a token. An unusable token is `Ok` with `valid == false`
    /// and a reason; only store failures are errors.
    pub async fn check(&self, token: &str) -> Result<CheckResult, TollgateError> {
        Ok(self.sessions.is_valid(token).await?.into())
    }

    /// The raw record for `token`, whatever its status.
    pub async fn introspect(&self, token: &str) -> Result<SessionRecord, TollgateError> {
        Ok(self.sessions.introspect(token).await?)
    }

    /// Checks the token, then evaluates `requirement` for its account.
    ///
    /// The requirement is validated once, up front, so a malformed one
    /// is an error even for an invalid token.
    pub async fn authorize(
        &self,
        token: &str,
        requirement: &Requirement,
    ) -> Result<AuthorizeResult, TollgateError> {
        requirement.validate()?;

        let record = match self.sessions.is_valid(token).await? {
            Validity::Active(record) => record,
            Validity::Invalid(reason) => {
                return Ok(AuthorizeResult::invalid_token(reason));
            }
        };

        let decision = self
            .guard
            .authorize_validated(&record.account, requirement)
            .await?;
        Ok(match decision.denial {
            None => AuthorizeResult::allowed(),
            Some(denial) => AuthorizeResult::denied(denial),
        })
    }

    // =====================================================================
    // Queries and maintenance
    // =====================================================================

    /// The token on one device, if any.
    pub async fn token_of(
        &self,
        account: &AccountId,
        device: &str,
    ) -> Result<Option<String>, TollgateError> {
        Ok(self.sessions.token_of(account, device).await?)
    }

    /// Every session the account currently has indexed.
    pub async fn sessions_of(
        &self,
        account: &AccountId,
    ) -> Result<Vec<SessionRecord>, TollgateError> {
        Ok(self.sessions.sessions(account).await?)
    }

    pub async fn renew(
        &self,
        token: &str,
        timeout: Option<Duration>,
    ) -> Result<SessionRecord, TollgateError> {
        Ok(self.sessions.renew(token, timeout).await?)
    }

    pub async fn purge_expired(&self) -> Result<usize, TollgateError> {
        Ok(self.sessions.purge_expired().await?)
    }

    /// Spawns a task that purges expired records every
    /// `eviction_interval_secs`. Returns `None` when no interval is
    /// configured.
    ///
    /// Store failures are logged and the loop keeps going.
    pub fn spawn_eviction(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let period = self.config.eviction_interval()?;
        let gate = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match gate.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "expired sessions evicted"),
                    Err(e) => tracing::warn!(error = %e, "session eviction failed"),
                }
            }
        }))
    }
}
