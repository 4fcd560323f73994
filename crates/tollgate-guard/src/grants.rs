//! Grants: what an account holds, and where they come from.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tollgate_session::AccountId;

use crate::GuardError;

/// Roles, permissions and disabled services attached to one account.
///
/// Role and permission entries may contain `*` wildcards: a granted
/// `user:*` satisfies a required `user:add`, and a granted `*`
/// satisfies anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Grants {
    pub roles: HashSet<String>,
    pub permissions: HashSet<String>,
    pub disabled_services: HashSet<String>,
}

impl Grants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn with_disabled_service(mut self, service: impl Into<String>) -> Self {
        self.disabled_services.insert(service.into());
        self
    }

    /// Returns `true` if any granted role matches `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|granted| wildcard_match(granted, role))
    }

    /// Returns `true` if any granted permission matches `permission`.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|granted| wildcard_match(granted, permission))
    }

    /// Returns `true` if `service` is disabled for this account.
    ///
    /// Exact match only; disabling is never implied by a pattern.
    pub fn is_service_disabled(&self, service: &str) -> bool {
        self.disabled_services.contains(service)
    }
}

/// Matches `value` against `pattern`, where `*` in the pattern matches
/// any run of characters (including none). A pattern without `*` must
/// equal the value.
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == value;
    }

    let mut parts = pattern.split('*');
    // `split` always yields at least one item.
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = value.strip_prefix(first) else {
        return false;
    };

    let mut parts: Vec<&str> = parts.collect();
    // The pattern contains a `*`, so there is a last segment.
    let last = parts.pop().unwrap_or_default();
    for part in parts {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

// ---------------------------------------------------------------------------
// GrantProvider
// ---------------------------------------------------------------------------

/// Loads an account's grants.
///
/// Tollgate doesn't own users or roles; implement this over your user
/// database, directory service or config file.
pub trait GrantProvider: Send + Sync + 'static {
    /// Returns the grants for `account`. An unknown account has no
    /// grants (empty sets), which is not an error.
    fn grants(
        &self,
        account: &AccountId,
    ) -> impl Future<Output = Result<Grants, GuardError>> + Send;
}

/// In-memory grant table.
///
/// Cheap to clone; clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct MemoryGrants {
    table: Arc<DashMap<AccountId, Grants>>,
}

impl MemoryGrants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces an account's grants wholesale.
    pub fn set(&self, account: AccountId, grants: Grants) {
        self.table.insert(account, grants);
    }

    pub fn grant_role(&self, account: &AccountId, role: impl Into<String>) {
        self.table
            .entry(account.clone())
            .or_default()
            .roles
            .insert(role.into());
    }

    pub fn revoke_role(&self, account: &AccountId, role: &str) {
        if let Some(mut grants) = self.table.get_mut(account) {
            grants.roles.remove(role);
        }
    }

    pub fn grant_permission(
        &self,
        account: &AccountId,
        permission: impl Into<String>,
    ) {
        self.table
            .entry(account.clone())
            .or_default()
            .permissions
            .insert(permission.into());
    }

    pub fn revoke_permission(&self, account: &AccountId, permission: &str) {
        if let Some(mut grants) = self.table.get_mut(account) {
            grants.permissions.remove(permission);
        }
    }

    /// Disables a named service for the account.
    pub fn disable_service(
        &self,
        account: &AccountId,
        service: impl Into<String>,
    ) {
        let service = service.into();
        tracing::info!(%account, service = %service, "service disabled");
        self.table
            .entry(account.clone())
            .or_default()
            .disabled_services
            .insert(service);
    }

    /// Re-enables a named service for the account.
    pub fn enable_service(&self, account: &AccountId, service: &str) {
        if let Some(mut grants) = self.table.get_mut(account) {
            if grants.disabled_services.remove(service) {
                tracing::info!(%account, service, "service re-enabled");
            }
        }
    }
}

impl GrantProvider for MemoryGrants {
    async fn grants(&self, account: &AccountId) -> Result<Grants, GuardError> {
        Ok(self
            .table
            .get(account)
            .map(|g| g.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_match_exact() {
        assert!(wildcard_match("user:add", "user:add"));
        assert!(!wildcard_match("user:add", "user:delete"));
    }

    #[test]
    fn test_wildcard_match_patterns() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("user:*", "user:add"));
        assert!(wildcard_match("user:*", "user:"));
        assert!(!wildcard_match("user:*", "goods:add"));
        assert!(wildcard_match("*:add", "user:add"));
        assert!(wildcard_match("user:*:read", "user:profile:read"));
        assert!(!wildcard_match("user:*:read", "user:profile:write"));
        assert!(wildcard_match("a*b*c", "aXXbYYc"));
        assert!(!wildcard_match("a*b*c", "aXXcYYb"));
        // Overlapping prefix and suffix must not share characters.
        assert!(!wildcard_match("ab*ba", "aba"));
    }

    #[test]
    fn test_grants_lookups() {
        let grants = Grants::new()
            .with_role("admin")
            .with_permission("user:*")
            .with_disabled_service("comment");

        assert!(grants.has_role("admin"));
        assert!(!grants.has_role("superadmin"));
        assert!(grants.has_permission("user:delete"));
        assert!(!grants.has_permission("goods:add"));
        assert!(grants.is_service_disabled("comment"));
        assert!(!grants.is_service_disabled("place-order"));
    }

    #[tokio::test]
    async fn test_memory_grants_unknown_account_is_empty() {
        let table = MemoryGrants::new();

        let grants = table.grants(&AccountId::from(1u64)).await.unwrap();

        assert_eq!(grants, Grants::default());
    }

    #[tokio::test]
    async fn test_memory_grants_mutations() {
        let table = MemoryGrants::new();
        let a = AccountId::from(1u64);
        table.grant_role(&a, "admin");
        table.grant_permission(&a, "user:add");
        table.disable_service(&a, "comment");

        let grants = table.grants(&a).await.unwrap();
        assert!(grants.has_role("admin"));
        assert!(grants.has_permission("user:add"));
        assert!(grants.is_service_disabled("comment"));

        table.revoke_role(&a, "admin");
        table.revoke_permission(&a, "user:add");
        table.enable_service(&a, "comment");

        assert_eq!(table.grants(&a).await.unwrap(), Grants::default());
    }
}
