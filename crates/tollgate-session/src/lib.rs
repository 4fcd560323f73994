//! Multi-device token sessions for Tollgate.
//!
//! This crate handles the lifecycle of session tokens:
//!
//! 1. **Issuing**: one token per (account, device) slot ([`SessionManager::login`])
//! 2. **Invalidating**: logout (hard delete), kickout and replace (soft,
//!    record kept for audit) at account, device or token granularity
//! 3. **Checking**: "is this token valid, and if not, why?"
//!    ([`SessionManager::is_valid`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade (tollgate)  ← what the HTTP layer calls
//!     ↕
//! Session Layer (this crate)  ← token lifecycle state machine
//!     ↕
//! TokenStore + AccountIndex  ← pluggable storage (in-memory impls included)
//! ```

mod clock;
mod error;
mod locks;
mod manager;
mod memory;
mod session;
mod store;
mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use manager::SessionManager;
pub use memory::{MemoryAccountIndex, MemoryTokenStore};
pub use session::{
    AccountId, DEFAULT_DEVICE, InvalidReason, LoginOptions, SessionConfig,
    SessionRecord, SessionStatus, Validity,
};
pub use store::{AccountIndex, TokenStore};
pub use token::{TokenStyle, generate_token};
