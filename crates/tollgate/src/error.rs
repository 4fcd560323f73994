//! Unified error type for Tollgate.

use tollgate_guard::GuardError;
use tollgate_session::SessionError;

/// Top-level error that wraps the session and guard errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors, so facade
/// callers handle one type.
#[derive(Debug, thiserror::Error)]
pub enum TollgateError {
    /// A session-layer error (store down, missing or expired token).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A guard error (malformed requirement, grants unavailable).
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// Configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TollgateError {
    /// Returns `true` if a backing store or grant provider failed, as
    /// opposed to a problem with the request itself.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Session(SessionError::StoreUnavailable(_))
                | Self::Guard(GuardError::GrantsUnavailable(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_session_error() {
        let err = SessionError::StoreUnavailable("redis down".into());
        let tollgate_err: TollgateError = err.into();
        assert!(matches!(tollgate_err, TollgateError::Session(_)));
        assert!(tollgate_err.to_string().contains("redis down"));
        assert!(tollgate_err.is_unavailable());
    }

    #[test]
    fn test_from_guard_error() {
        let err = GuardError::InvalidRequirement("And has no operands".into());
        let tollgate_err: TollgateError = err.into();
        assert!(matches!(tollgate_err, TollgateError::Guard(_)));
        assert!(!tollgate_err.is_unavailable());
    }

    #[test]
    fn test_config_error_display() {
        let err = TollgateError::Config("expected value at line 1".into());
        assert_eq!(
            err.to_string(),
            "invalid configuration: expected value at line 1"
        );
    }
}
