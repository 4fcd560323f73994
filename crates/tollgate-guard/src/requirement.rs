//! Requirement expressions: what a caller must hold to pass a check.
//!
//! Web frameworks usually declare access rules with attributes or
//! middleware config ("needs role admin", "needs any of these
//! permissions"). Tollgate takes those rules as a small expression tree
//! instead, so the evaluator is one recursive function and the outer
//! layer decides how to spell it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::GuardError;

/// An authorization requirement.
///
/// ```text
/// And([Role("admin"), Or([Permission("user:add"), Permission("user:*")])])
/// ```
///
/// - Leaves test one grant: a role, a permission, or that a named
///   service is not disabled for the account.
/// - `And` passes when every operand passes; `Or` when any does.
/// - `Bypass` anywhere in the tree skips every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Role(String),
    Permission(String),
    /// Passes unless the service is in the account's disabled set.
    ServiceEnabled(String),
    And(Vec<Requirement>),
    Or(Vec<Requirement>),
    Bypass,
}

impl Requirement {
    pub fn role(name: impl Into<String>) -> Self {
        Self::Role(name.into())
    }

    pub fn permission(name: impl Into<String>) -> Self {
        Self::Permission(name.into())
    }

    pub fn service_enabled(name: impl Into<String>) -> Self {
        Self::ServiceEnabled(name.into())
    }

    /// Every listed role is required.
    pub fn all_roles<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::And(names.into_iter().map(Self::role).collect())
    }

    /// Any one of the listed roles suffices.
    pub fn any_role<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Or(names.into_iter().map(Self::role).collect())
    }

    /// Every listed permission is required.
    pub fn all_permissions<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::And(names.into_iter().map(Self::permission).collect())
    }

    /// Any one of the listed permissions suffices.
    pub fn any_permission<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Or(names.into_iter().map(Self::permission).collect())
    }

    /// Returns `true` if a `Bypass` appears anywhere in the tree.
    pub fn is_bypassed(&self) -> bool {
        match self {
            Self::Bypass => true,
            Self::And(ops) | Self::Or(ops) => ops.iter().any(Self::is_bypassed),
            _ => false,
        }
    }

    /// Checks the expression is well formed.
    ///
    /// # Errors
    /// [`GuardError::InvalidRequirement`] for an empty `And`/`Or` or a
    /// blank role, permission or service name.
    pub fn validate(&self) -> Result<(), GuardError> {
        match self {
            Self::Role(name) => non_blank("role", name),
            Self::Permission(name) => non_blank("permission", name),
            Self::ServiceEnabled(name) => non_blank("service", name),
            Self::And(ops) | Self::Or(ops) => {
                if ops.is_empty() {
                    return Err(GuardError::InvalidRequirement(format!(
                        "{} has no operands",
                        self.combinator_name()
                    )));
                }
                ops.iter().try_for_each(Self::validate)
            }
            Self::Bypass => Ok(()),
        }
    }

    fn combinator_name(&self) -> &'static str {
        match self {
            Self::And(_) => "And",
            _ => "Or",
        }
    }
}

fn non_blank(kind: &str, name: &str) -> Result<(), GuardError> {
    if name.trim().is_empty() {
        Err(GuardError::InvalidRequirement(format!("blank {kind} name")))
    } else {
        Ok(())
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role(name) => write!(f, "role:{name}"),
            Self::Permission(name) => write!(f, "permission:{name}"),
            Self::ServiceEnabled(name) => write!(f, "service:{name}"),
            Self::And(ops) => write_joined(f, ops, "AND"),
            Self::Or(ops) => write_joined(f, ops, "OR"),
            Self::Bypass => write!(f, "bypass"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    ops: &[Requirement],
    sep: &str,
) -> fmt::Result {
    write!(f, "(")?;
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            write!(f, " {sep} ")?;
        }
        write!(f, "{op}")?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_nested_expression() {
        let req = Requirement::And(vec![
            Requirement::role("admin"),
            Requirement::any_permission(["user:add", "user:*"]),
            Requirement::service_enabled("comment"),
        ]);

        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_combinator() {
        let nested = Requirement::Or(vec![Requirement::And(vec![])]);

        let err = nested.validate().unwrap_err();

        assert!(matches!(err, GuardError::InvalidRequirement(msg) if msg.contains("And")));
    }

    #[test]
    fn test_validate_rejects_blank_names() {
        assert!(Requirement::role("  ").validate().is_err());
        assert!(Requirement::permission("").validate().is_err());
        assert!(Requirement::service_enabled("").validate().is_err());
    }

    #[test]
    fn test_is_bypassed_finds_nested_marker() {
        let req = Requirement::And(vec![
            Requirement::role("admin"),
            Requirement::Or(vec![Requirement::Bypass]),
        ]);

        assert!(req.is_bypassed());
        assert!(!Requirement::role("admin").is_bypassed());
    }

    #[test]
    fn test_display_renders_tree() {
        let req = Requirement::And(vec![
            Requirement::role("admin"),
            Requirement::any_permission(["a", "b"]),
        ]);

        assert_eq!(
            req.to_string(),
            "(role:admin AND (permission:a OR permission:b))"
        );
    }

    #[test]
    fn test_serde_snake_case_tags() {
        let req: Requirement =
            serde_json::from_str(r#"{"or":[{"role":"admin"},"bypass"]}"#).unwrap();

        assert_eq!(
            req,
            Requirement::Or(vec![Requirement::role("admin"), Requirement::Bypass])
        );
    }
}
