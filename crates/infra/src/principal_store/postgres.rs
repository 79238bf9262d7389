//! Postgres-backed principal store.
//!
//! Expected schema (owned by the user-management service):
//!
//! ```sql
//! users(id, username UNIQUE, password_hash, enabled)
//! roles(id, name UNIQUE)
//! permissions(id, name UNIQUE)
//! user_roles(user_id, role_id)
//! role_permissions(role_id, permission_id)
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use stockgate_auth::{LookupError, Permission, PrincipalLookup, PrincipalRecord, Role, RoleGrant};

const LOOKUP_SQL: &str = r#"
    SELECT
        u.username,
        u.password_hash,
        u.enabled,
        r.name AS role_name,
        p.name AS permission_name
    FROM users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
    LEFT JOIN roles r ON r.id = ur.role_id
    LEFT JOIN role_permissions rp ON rp.role_id = r.id
    LEFT JOIN permissions p ON p.id = rp.permission_id
    WHERE u.username = $1
"#;

/// Principal store reading users, roles and permissions in one round trip.
///
/// The pool is cheap to clone (Arc inside).
#[derive(Debug, Clone)]
pub struct PostgresPrincipalStore {
    pool: PgPool,
}

impl PostgresPrincipalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, LookupError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| LookupError::Unavailable(e.to_string()))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl PrincipalLookup for PostgresPrincipalStore {
    async fn lookup(&self, identity: &str) -> Result<Option<PrincipalRecord>, LookupError> {
        let rows = sqlx::query(LOOKUP_SQL)
            .bind(identity)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "principal lookup query failed");
                LookupError::Unavailable(e.to_string())
            })?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };

        let decode = |e: sqlx::Error| LookupError::Unavailable(e.to_string());
        let identity: String = first.try_get("username").map_err(decode)?;
        let credential_digest: String = first.try_get("password_hash").map_err(decode)?;
        let active: bool = first.try_get("enabled").map_err(decode)?;

        let pairs = rows
            .iter()
            .map(|row| {
                let role: Option<String> = row.try_get("role_name").map_err(decode)?;
                let permission: Option<String> = row.try_get("permission_name").map_err(decode)?;
                Ok((role, permission))
            })
            .collect::<Result<Vec<_>, LookupError>>()?;

        Ok(Some(PrincipalRecord {
            identity,
            credential_digest,
            roles: fold_grants(pairs),
            active,
        }))
    }
}

/// Fold joined `(role, permission)` rows into one grant per role.
///
/// NULLs from the outer joins are skipped: a missing role contributes nothing
/// and a role without permissions still yields an empty grant.
fn fold_grants(rows: impl IntoIterator<Item = (Option<String>, Option<String>)>) -> Vec<RoleGrant> {
    let mut grants: BTreeMap<String, Vec<Permission>> = BTreeMap::new();
    for (role, permission) in rows {
        if let Some(role) = role {
            let entry = grants.entry(role).or_default();
            if let Some(permission) = permission {
                entry.push(Permission::new(permission));
            }
        }
    }
    grants
        .into_iter()
        .map(|(role, permissions)| RoleGrant::new(Role::new(role), permissions))
        .collect()
}
