use serde::Serialize;

use crate::{AuthorityExpression, HttpMethod, Principal, RouteTable};

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No (valid) principal, and the route needs one.
    Unauthenticated,
    /// A principal is present but lacks the required authority.
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzDecision {
    Allow,
    Deny(DenyReason),
}

impl AuthzDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthzDecision::Allow)
    }
}

/// Authorize a request against the route table.
///
/// - No IO
/// - No panics
/// - First matching rule decides; no match denies as unauthenticated
pub fn authorize(
    table: &RouteTable,
    method: HttpMethod,
    path: &str,
    principal: Option<&Principal>,
) -> AuthzDecision {
    match table.match_rule(method, path) {
        Some(rule) => evaluate(rule.requirement(), principal),
        None => AuthzDecision::Deny(DenyReason::Unauthenticated),
    }
}

/// Evaluate one authority expression for an optional principal.
///
/// Roles are only matched against the principal's roles and permissions only
/// against its permissions. An inactive principal counts as absent.
pub fn evaluate(expression: &AuthorityExpression, principal: Option<&Principal>) -> AuthzDecision {
    if let AuthorityExpression::Public = expression {
        return AuthzDecision::Allow;
    }

    let Some(principal) = principal.filter(|p| p.is_active()) else {
        return AuthzDecision::Deny(DenyReason::Unauthenticated);
    };

    let granted = match expression {
        AuthorityExpression::Public | AuthorityExpression::Authenticated => true,
        AuthorityExpression::HasRole(role) => principal.has_role(role),
        AuthorityExpression::HasAnyRole(roles) => principal.has_any_role(roles),
        AuthorityExpression::HasPermission(permission) => principal.has_permission(permission),
    };

    if granted {
        AuthzDecision::Allow
    } else {
        AuthzDecision::Deny(DenyReason::Forbidden)
    }
}
