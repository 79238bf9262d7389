use std::collections::HashSet;

use crate::{Permission, Role};

/// A fully resolved principal for authorization decisions.
///
/// Built fresh for every request from the principal store and never mutated
/// afterwards. Roles and permissions are kept apart so that policy evaluation
/// can match each requirement against the right namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    identity: String,
    roles: HashSet<Role>,
    permissions: HashSet<Permission>,
    active: bool,
}

impl Principal {
    pub fn new(
        identity: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            identity: identity.into(),
            roles: roles.into_iter().collect(),
            permissions: permissions.into_iter().collect(),
            active: true,
        }
    }

    /// Same principal, flagged inactive.
    pub fn deactivated(self) -> Self {
        Self {
            active: false,
            ..self
        }
    }

    /// Stable, case-preserving identity string (the token subject).
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn roles(&self) -> &HashSet<Role> {
        &self.roles
    }

    pub fn permissions(&self) -> &HashSet<Permission> {
        &self.permissions
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    pub fn has_any_role<'a>(&self, roles: impl IntoIterator<Item = &'a Role>) -> bool {
        roles.into_iter().any(|r| self.roles.contains(r))
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }

    /// Role names, sorted (for display and logs).
    pub fn sorted_roles(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.roles.iter().map(Role::as_str).collect();
        out.sort_unstable();
        out
    }

    /// Permission names, sorted (for display and logs).
    pub fn sorted_permissions(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.permissions.iter().map(Permission::as_str).collect();
        out.sort_unstable();
        out
    }
}
