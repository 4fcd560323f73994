//! Error types for the session layer.

use crate::SessionStatus;

/// Errors that can occur during session management.
///
/// Invalidating a token that no longer exists is NOT an error: the
/// manager treats a missing token as "already invalid" and returns
/// `Ok`. `NotFound` only surfaces from reads that need a record
/// (introspection, renewal) and from the raw store primitives.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No record exists for the given token. It was logged out, evicted
    /// after expiry, or never issued.
    #[error("session not found for token {0}")]
    NotFound(String),

    /// The record exists but its TTL has elapsed.
    #[error("session expired for token {0}")]
    Expired(String),

    /// The underlying token store or account index failed (or did not
    /// answer within the configured deadline).
    ///
    /// Fatal to the calling request. The manager never retries.
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    /// A status change that the state machine forbids, e.g. bringing a
    /// kicked token back to `Active`.
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
}
