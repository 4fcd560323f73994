//! Session types: the data structures that represent one authenticated
//! presence of an account on one device.
//!
//! A session record tracks:
//! - WHO is logged in (`AccountId`)
//! - WHERE (the device label, e.g. "PC" or "Mobile")
//! - WHAT state the token is in (active, logged out, kicked, replaced)
//! - WHEN it was issued, last used, and when it stops being valid

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::TokenStyle;

/// Device label used when the caller does not name one.
pub const DEFAULT_DEVICE: &str = "default-device";

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Identifier of a logical account, shared by all of its devices.
///
/// Accounts are keyed by whatever the application uses (numeric user id,
/// username, UUID), so the inner value is a string. `From` impls cover
/// the common integer and string cases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for AccountId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for AccountId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<u32> for AccountId {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl From<i32> for AccountId {
    fn from(value: i32) -> Self {
        Self(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
///
/// All fields have defaults, so a config file only needs to name what it
/// overrides:
///
/// ```rust
/// use tollgate_session::SessionConfig;
///
/// let config = SessionConfig {
///     idle_timeout_secs: Some(1800),
///     ..SessionConfig::default()
/// };
/// assert!(config.concurrent);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of a token from login (or from its last renewal).
    /// `None` means tokens never expire on their own.
    ///
    /// Default: 30 days.
    pub timeout_secs: Option<u64>,

    /// Maximum time a token may sit unused before it is rejected as idle.
    /// `None` disables idle checks.
    pub idle_timeout_secs: Option<u64>,

    /// When `true`, every successful check pushes the expiry out to
    /// `now + timeout_secs`.
    pub sliding_expiration: bool,

    /// When `true` (default) an account may be logged in on several
    /// devices at once. When `false`, a new login displaces the account's
    /// sessions on every device.
    pub concurrent: bool,

    /// Upper bound on concurrently registered device slots per account.
    /// Oldest slots are logged out once a login exceeds it.
    pub max_sessions_per_account: Option<usize>,

    /// Device label applied when a login names none.
    pub default_device: String,

    /// Shape of generated token values.
    pub token_style: TokenStyle,

    /// Deadline applied to each individual store call, in milliseconds.
    pub store_timeout_ms: Option<u64>,
}

impl SessionConfig {
    /// The configured token lifetime as a `Duration`.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// The configured idle limit as a `Duration`.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    /// The per-call store deadline as a `Duration`.
    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Some(30 * 24 * 60 * 60),
            idle_timeout_secs: None,
            sliding_expiration: false,
            concurrent: true,
            max_sessions_per_account: None,
            default_device: DEFAULT_DEVICE.to_string(),
            token_style: TokenStyle::default(),
            store_timeout_ms: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of one token.
///
/// ```text
///            ┌──(logout)──→ LoggedOut   (record deleted)
///   Active ──┼──(kickout)─→ Kicked      (record kept until TTL)
///            └──(replace)─→ Replaced    (record kept until TTL)
/// ```
///
/// There is no way back to `Active`: a new login always issues a new
/// token instead of resurrecting an old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    LoggedOut,
    Kicked,
    Replaced,
}

impl SessionStatus {
    /// Returns `true` if a token in this state passes authentication.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` if transitioning to `target` is allowed.
    ///
    /// Staying in the same state counts as allowed (it's a no-op).
    pub fn can_transition_to(self, target: Self) -> bool {
        self == target || matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::LoggedOut => write!(f, "LoggedOut"),
            Self::Kicked => write!(f, "Kicked"),
            Self::Replaced => write!(f, "Replaced"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRecord
// ---------------------------------------------------------------------------

/// One authenticated presence of an account on one device.
///
/// Created by a successful login; afterwards only its status and its
/// activity/expiry timestamps ever change. Timestamps are unix
/// milliseconds taken from the manager's [`Clock`](crate::Clock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque token value. Unique per record.
    pub token: String,

    /// Which account this session belongs to.
    pub account: AccountId,

    /// Device label distinguishing this session from the account's others.
    pub device: String,

    /// Current lifecycle state.
    pub status: SessionStatus,

    /// When the login happened.
    pub created_at_ms: u64,

    /// Last successful check (or the login itself).
    pub last_touched_at_ms: u64,

    /// Absolute expiry. `None` means the token never expires by time.
    pub expires_at_ms: Option<u64>,

    /// Lifetime granted at login, reapplied on sliding renewal.
    pub timeout_ms: Option<u64>,
}

impl SessionRecord {
    /// Returns `true` once the expiry instant has been reached.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|at| now_ms >= at)
    }

    /// Returns `true` if the session has been unused for `idle` or longer.
    pub fn is_idle(&self, now_ms: u64, idle: Duration) -> bool {
        now_ms >= self.last_touched_at_ms.saturating_add(duration_ms(idle))
    }

    /// Time left before expiry. `None` means "never expires";
    /// `Some(Duration::ZERO)` means already expired.
    pub fn ttl_remaining(&self, now_ms: u64) -> Option<Duration> {
        self.expires_at_ms
            .map(|at| Duration::from_millis(at.saturating_sub(now_ms)))
    }
}

/// Converts a `Duration` to whole milliseconds, saturating at `u64::MAX`.
pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// LoginOptions
// ---------------------------------------------------------------------------

/// Per-login overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginOptions {
    /// Device label. Falls back to `SessionConfig::default_device`.
    pub device: Option<String>,

    /// Lifetime of this token, overriding `SessionConfig::timeout_secs`.
    pub timeout: Option<Duration>,
}

impl LoginOptions {
    /// Options naming only a device.
    pub fn device(device: impl Into<String>) -> Self {
        Self {
            device: Some(device.into()),
            timeout: None,
        }
    }

    /// Sets the timeout override.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// ---------------------------------------------------------------------------
// Validity
// ---------------------------------------------------------------------------

/// Why a token failed authentication.
///
/// Each variant maps to a distinct message so callers can tell an idle
/// timeout apart from an administrative kick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidReason {
    /// No record: logged out, evicted, or never issued.
    NotFound,
    Kicked,
    Replaced,
    Expired,
    /// Unused for longer than the idle limit.
    IdleTimeout,
}

impl InvalidReason {
    /// User-facing explanation.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotFound => "token does not exist or was deleted",
            Self::Kicked => "session was forcibly kicked",
            Self::Replaced => "session was displaced by a newer login",
            Self::Expired => "session expired",
            Self::IdleTimeout => "session was idle for too long",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of an authentication check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    /// The token is good. Carries the (possibly just touched) record.
    Active(SessionRecord),
    /// The token is not usable, and this is why.
    Invalid(InvalidReason),
}

impl Validity {
    /// Returns `true` for [`Validity::Active`].
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// The invalidity reason, if any.
    pub fn reason(&self) -> Option<InvalidReason> {
        match self {
            Self::Active(_) => None,
            Self::Invalid(reason) => Some(*reason),
        }
    }

    /// The active record, if any.
    pub fn record(&self) -> Option<&SessionRecord> {
        match self {
            Self::Active(record) => Some(record),
            Self::Invalid(_) => None,
        }
    }
}
