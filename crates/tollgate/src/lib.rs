//! # Tollgate
//!
//! Multi-device token sessions for services that need more than
//! "logged in or not".
//!
//! An account can hold one live token per device. Logging in again on
//! the same device displaces the old token, and an operator can kick a
//! token (or a device, or a whole account) so that the next check
//! reports *why* it stopped working. On top of that, a guard evaluates
//! role, permission and service requirements for the token's account.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tollgate::prelude::*;
//!
//! # async fn demo() -> Result<(), TollgateError> {
//! let grants = MemoryGrants::new();
//! grants.grant_role(&AccountId::from(1001u64), "admin");
//! let gate = Tollgate::memory(TollgateConfig::default(), grants);
//!
//! let token = gate.login(&AccountId::from(1001u64), Some("PC")).await?;
//! let check = gate.check(&token).await?;
//! assert!(check.valid);
//!
//! let result = gate.authorize(&token, &Requirement::role("admin")).await?;
//! assert!(result.allowed);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod facade;

pub use config::{TollgateConfig, init_tracing};
pub use error::TollgateError;
pub use facade::{AuthorizeResult, CheckResult, MemoryTollgate, Tollgate, TollgateBuilder};

/// Re-exports the types most applications need.
pub mod prelude {
    pub use crate::{
        AuthorizeResult, CheckResult, MemoryTollgate, Tollgate,
        TollgateBuilder, TollgateConfig, TollgateError, init_tracing,
    };
    pub use tollgate_guard::{
        Decision, Denial, GrantProvider, Grants, Guard, GuardError,
        MemoryGrants, Requirement,
    };
    pub use tollgate_session::{
        AccountId, AccountIndex, Clock, InvalidReason, LoginOptions,
        ManualClock, MemoryAccountIndex, MemoryTokenStore, SessionConfig,
        SessionError, SessionManager, SessionRecord, SessionStatus,
        SystemClock, TokenStore, TokenStyle, Validity,
    };
}
