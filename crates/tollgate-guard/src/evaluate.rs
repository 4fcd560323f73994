//! The evaluator: a pure function from (requirement, grants) to a
//! decision.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{GuardError, Grants, Requirement};

/// Which part of a requirement failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    MissingRole(String),
    MissingPermission(String),
    ServiceDisabled(String),
    /// Every operand of an `Or` failed; one denial per operand.
    NoneSatisfied(Vec<Denial>),
}

impl Denial {
    /// The failed sub-requirement's name, e.g. `"superadmin"`.
    ///
    /// For an `Or`, the operand names joined with `" | "`.
    pub fn requirement(&self) -> String {
        match self {
            Self::MissingRole(name)
            | Self::MissingPermission(name)
            | Self::ServiceDisabled(name) => name.clone(),
            Self::NoneSatisfied(denials) => denials
                .iter()
                .map(Denial::requirement)
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRole(name) => write!(f, "missing role '{name}'"),
            Self::MissingPermission(name) => {
                write!(f, "missing permission '{name}'")
            }
            Self::ServiceDisabled(name) => {
                write!(f, "service '{name}' is disabled")
            }
            Self::NoneSatisfied(denials) => {
                write!(f, "none satisfied: ")?;
                for (i, d) in denials.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{d}")?;
                }
                Ok(())
            }
        }
    }
}

/// Result of evaluating a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    /// Present exactly when `allowed` is `false`.
    pub denial: Option<Denial>,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            denial: None,
        }
    }

    pub fn deny(denial: Denial) -> Self {
        Self {
            allowed: false,
            denial: Some(denial),
        }
    }

    /// Name of the failed sub-requirement, for diagnostics.
    pub fn failed_requirement(&self) -> Option<String> {
        self.denial.as_ref().map(Denial::requirement)
    }
}

/// Evaluates `requirement` against `grants`.
///
/// Rules:
/// - a `Bypass` anywhere in the tree allows without checking anything;
/// - `And` fails with the first failing operand's denial;
/// - `Or` allows if any operand passes, otherwise fails with
///   [`Denial::NoneSatisfied`] listing every operand's denial.
///
/// # Errors
/// [`GuardError::InvalidRequirement`] if the expression is malformed.
/// This is checked before evaluation, so a malformed expression fails
/// even when the grants would have satisfied it.
pub fn evaluate(
    requirement: &Requirement,
    grants: &Grants,
) -> Result<Decision, GuardError> {
    requirement.validate()?;
    Ok(decide(requirement, grants))
}

/// [`evaluate`] without the well-formedness check. Callers must have
/// run [`Requirement::validate`] already.
pub(crate) fn decide(requirement: &Requirement, grants: &Grants) -> Decision {
    if requirement.is_bypassed() {
        return Decision::allow();
    }
    match check(requirement, grants) {
        Ok(()) => Decision::allow(),
        Err(denial) => Decision::deny(denial),
    }
}

fn check(requirement: &Requirement, grants: &Grants) -> Result<(), Denial> {
    match requirement {
        Requirement::Role(role) => {
            if grants.has_role(role) {
                Ok(())
            } else {
                Err(Denial::MissingRole(role.clone()))
            }
        }
        Requirement::Permission(permission) => {
            if grants.has_permission(permission) {
                Ok(())
            } else {
                Err(Denial::MissingPermission(permission.clone()))
            }
        }
        Requirement::ServiceEnabled(service) => {
            if grants.is_service_disabled(service) {
                Err(Denial::ServiceDisabled(service.clone()))
            } else {
                Ok(())
            }
        }
        Requirement::And(ops) => {
            ops.iter().try_for_each(|op| check(op, grants))
        }
        Requirement::Or(ops) => {
            let mut denials = Vec::with_capacity(ops.len());
            for op in ops {
                match check(op, grants) {
                    Ok(()) => return Ok(()),
                    Err(denial) => denials.push(denial),
                }
            }
            Err(Denial::NoneSatisfied(denials))
        }
        Requirement::Bypass => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Grants {
        Grants::new()
            .with_role("admin")
            .with_permission("user:add")
            .with_permission("goods:*")
            .with_disabled_service("comment")
    }

    #[test]
    fn test_evaluate_role_present_allows() {
        let decision = evaluate(&Requirement::role("admin"), &admin()).unwrap();

        assert_eq!(decision, Decision::allow());
    }

    #[test]
    fn test_evaluate_role_missing_names_it() {
        let decision =
            evaluate(&Requirement::role("superadmin"), &admin()).unwrap();

        assert!(!decision.allowed);
        assert_eq!(decision.failed_requirement().as_deref(), Some("superadmin"));
        assert_eq!(
            decision.denial,
            Some(Denial::MissingRole("superadmin".into()))
        );
    }

    #[test]
    fn test_evaluate_and_reports_first_failure() {
        let req = Requirement::all_permissions(["user:add", "user:delete", "user:ban"]);

        let decision = evaluate(&req, &admin()).unwrap();

        assert_eq!(
            decision.denial,
            Some(Denial::MissingPermission("user:delete".into()))
        );
    }

    #[test]
    fn test_evaluate_or_any_operand_suffices() {
        let req = Requirement::any_role(["superadmin", "admin"]);

        assert!(evaluate(&req, &admin()).unwrap().allowed);
    }

    #[test]
    fn test_evaluate_or_all_fail_lists_every_denial() {
        let req = Requirement::any_role(["superadmin", "ceo"]);

        let decision = evaluate(&req, &admin()).unwrap();

        assert_eq!(
            decision.denial,
            Some(Denial::NoneSatisfied(vec![
                Denial::MissingRole("superadmin".into()),
                Denial::MissingRole("ceo".into()),
            ]))
        );
        assert_eq!(
            decision.failed_requirement().as_deref(),
            Some("superadmin | ceo")
        );
    }

    #[test]
    fn test_evaluate_wildcard_permission_grant() {
        let decision =
            evaluate(&Requirement::permission("goods:delete"), &admin()).unwrap();

        assert!(decision.allowed);
    }

    #[test]
    fn test_evaluate_disabled_service_denies() {
        let decision =
            evaluate(&Requirement::service_enabled("comment"), &admin()).unwrap();

        assert_eq!(
            decision.denial,
            Some(Denial::ServiceDisabled("comment".into()))
        );
        assert!(
            evaluate(&Requirement::service_enabled("place-order"), &admin())
                .unwrap()
                .allowed
        );
    }

    #[test]
    fn test_evaluate_service_check_combines_with_roles() {
        // Disabled comment service, but the Or lets the admin role through.
        let req = Requirement::Or(vec![
            Requirement::service_enabled("comment"),
            Requirement::role("admin"),
        ]);
        assert!(evaluate(&req, &admin()).unwrap().allowed);

        let req = Requirement::And(vec![
            Requirement::role("admin"),
            Requirement::service_enabled("comment"),
        ]);
        assert!(!evaluate(&req, &admin()).unwrap().allowed);
    }

    #[test]
    fn test_evaluate_bypass_short_circuits() {
        let req = Requirement::And(vec![
            Requirement::role("nobody-has-this"),
            Requirement::Bypass,
        ]);

        assert!(evaluate(&req, &Grants::default()).unwrap().allowed);
        assert!(evaluate(&Requirement::Bypass, &Grants::default()).unwrap().allowed);
    }

    #[test]
    fn test_evaluate_invalid_requirement_fails_fast() {
        let req = Requirement::Or(vec![]);

        let result = evaluate(&req, &admin());

        assert!(matches!(result, Err(GuardError::InvalidRequirement(_))));
    }

    #[test]
    fn test_decide_trusts_caller_validation() {
        // An empty And is vacuously true once validation is skipped.
        assert!(decide(&Requirement::And(vec![]), &Grants::default()).allowed);
    }

    #[test]
    fn test_denial_display() {
        assert_eq!(
            Denial::MissingRole("admin".into()).to_string(),
            "missing role 'admin'"
        );
        assert_eq!(
            Denial::NoneSatisfied(vec![
                Denial::MissingPermission("a".into()),
                Denial::ServiceDisabled("b".into()),
            ])
            .to_string(),
            "none satisfied: missing permission 'a'; service 'b' is disabled"
        );
    }
}
