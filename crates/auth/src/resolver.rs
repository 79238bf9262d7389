//! Identity → [`Principal`] resolution.

use std::sync::Arc;

use thiserror::Error;

use crate::{Principal, PrincipalLookup, PrincipalRecord};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown identity")]
    UnknownIdentity,

    #[error("principal is inactive")]
    Inactive,

    #[error("principal store unavailable: {0}")]
    Unavailable(String),
}

/// Resolves identities through the principal store. One store call per
/// resolution, nothing cached.
#[derive(Clone)]
pub struct PrincipalResolver {
    lookup: Arc<dyn PrincipalLookup>,
}

impl PrincipalResolver {
    pub fn new(lookup: Arc<dyn PrincipalLookup>) -> Self {
        Self { lookup }
    }

    pub async fn resolve(&self, identity: &str) -> Result<Principal, ResolveError> {
        let record = self
            .lookup
            .lookup(identity)
            .await
            .map_err(|e| ResolveError::Unavailable(e.to_string()))?
            .ok_or(ResolveError::UnknownIdentity)?;

        if !record.active {
            return Err(ResolveError::Inactive);
        }

        Ok(expand(record))
    }
}

impl core::fmt::Debug for PrincipalResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PrincipalResolver").finish_non_exhaustive()
    }
}

/// Flatten role grants into the principal's role and permission sets.
pub fn expand(record: PrincipalRecord) -> Principal {
    let mut roles = Vec::with_capacity(record.roles.len());
    let mut permissions = Vec::new();
    for grant in record.roles {
        permissions.extend(grant.permissions);
        roles.push(grant.role);
    }

    let principal = Principal::new(record.identity, roles, permissions);
    if record.active {
        principal
    } else {
        principal.deactivated()
    }
}
