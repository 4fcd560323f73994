//! Error types for the authorization layer.

/// Errors that can occur while evaluating an authorization requirement.
///
/// A failed check is NOT an error: it's an `Ok(Decision)` with
/// `allowed == false`. These variants cover malformed requirements and
/// a grant source that cannot answer.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// The requirement expression is malformed (an empty `And`/`Or`, a
    /// blank role name...). This is a programming error in whoever built
    /// the expression, so it is reported before anything is evaluated.
    #[error("invalid requirement: {0}")]
    InvalidRequirement(String),

    /// The grant provider failed to load an account's grants.
    #[error("grants unavailable: {0}")]
    GrantsUnavailable(String),
}
