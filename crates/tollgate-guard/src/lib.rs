//! Authorization checks for Tollgate.
//!
//! Given an account's [`Grants`] (roles, permissions, disabled services)
//! and a [`Requirement`] expression, decide whether access is allowed and,
//! if not, which sub-requirement failed.
//!
//! # Key types
//!
//! - [`Requirement`]: the expression tree (`Role`, `Permission`,
//!   `ServiceEnabled`, `And`, `Or`, `Bypass`)
//! - [`evaluate`]: pure evaluation against a `Grants` value
//! - [`GrantProvider`]: where grants come from ([`MemoryGrants`] included)
//! - [`Guard`]: provider + evaluator, keyed by account

mod error;
mod evaluate;
mod grants;
mod guard;
mod requirement;

pub use error::GuardError;
pub use evaluate::{Decision, Denial, evaluate};
pub use grants::{GrantProvider, Grants, MemoryGrants, wildcard_match};
pub use guard::Guard;
pub use requirement::Requirement;
