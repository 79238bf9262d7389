//! Principal lookup boundary (consumed, not implemented, by this crate).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Permission, Role};

/// A role held by a principal, with the permissions it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl RoleGrant {
    pub fn new(role: Role, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            role,
            permissions: permissions.into_iter().collect(),
        }
    }
}

/// What the principal store knows about an identity.
#[derive(Clone, PartialEq, Eq)]
pub struct PrincipalRecord {
    pub identity: String,
    /// PHC-format credential digest.
    pub credential_digest: String,
    pub roles: Vec<RoleGrant>,
    pub active: bool,
}

impl core::fmt::Debug for PrincipalRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PrincipalRecord")
            .field("identity", &self.identity)
            .field("credential_digest", &"<redacted>")
            .field("roles", &self.roles)
            .field("active", &self.active)
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("principal store unavailable: {0}")]
    Unavailable(String),
}

/// Fetch a principal by its stable identity string.
///
/// `Ok(None)` means the identity is unknown. Implementations do I/O; callers
/// drop the future to cancel and never retry.
#[async_trait]
pub trait PrincipalLookup: Send + Sync {
    async fn lookup(&self, identity: &str) -> Result<Option<PrincipalRecord>, LookupError>;
}

#[async_trait]
impl<L> PrincipalLookup for Arc<L>
where
    L: PrincipalLookup + ?Sized,
{
    async fn lookup(&self, identity: &str) -> Result<Option<PrincipalRecord>, LookupError> {
        (**self).lookup(identity).await
    }
}
