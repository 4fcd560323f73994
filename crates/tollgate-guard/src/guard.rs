//! The guard: evaluates requirements for an account using a
//! [`GrantProvider`].

use tollgate_session::AccountId;

use crate::evaluate::decide;
use crate::{Decision, GrantProvider, GuardError, Requirement};

/// Authorization guard over a grant provider.
///
/// Read-only: the guard never mutates sessions or grants.
#[derive(Debug, Clone)]
pub struct Guard<G> {
    provider: G,
}

impl<G: GrantProvider> Guard<G> {
    pub fn new(provider: G) -> Self {
        Self { provider }
    }

    /// The underlying grant provider.
    pub fn provider(&self) -> &G {
        &self.provider
    }

    /// Decides whether `account` satisfies `requirement`.
    ///
    /// Malformed requirements fail before grants are loaded, and a
    /// bypassed requirement allows without loading them at all.
    ///
    /// # Errors
    /// - [`GuardError::InvalidRequirement`] for a malformed expression.
    /// - [`GuardError::GrantsUnavailable`] if the provider fails.
    pub async fn authorize(
        &self,
        account: &AccountId,
        requirement: &Requirement,
    ) -> Result<Decision, GuardError> {
        requirement.validate()?;
        self.authorize_validated(account, requirement).await
    }

    /// [`authorize`](Self::authorize) for a requirement the caller has
    /// already run through [`Requirement::validate`].
    ///
    /// # Errors
    /// [`GuardError::GrantsUnavailable`] if the provider fails.
    pub async fn authorize_validated(
        &self,
        account: &AccountId,
        requirement: &Requirement,
    ) -> Result<Decision, GuardError> {
        if requirement.is_bypassed() {
            return Ok(Decision::allow());
        }

        let grants = self.provider.grants(account).await?;
        let decision = decide(requirement, &grants);
        if let Some(denial) = &decision.denial {
            tracing::debug!(
                %account,
                %requirement,
                %denial,
                "authorization denied"
            );
        }
        Ok(decision)
    }
}
