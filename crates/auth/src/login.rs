//! Secret-for-token exchange (the login contract).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{CredentialHasher, IssueError, IssuedToken, PrincipalLookup, TokenCodec};

/// Login failure.
///
/// `UnknownIdentity`, `BadSecret` and `Inactive` are for server-side logs only;
/// callers must present all three identically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("unknown identity")]
    UnknownIdentity,

    #[error("secret does not match")]
    BadSecret,

    #[error("principal is inactive")]
    Inactive,

    #[error("credential check unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Issue(#[from] IssueError),
}

impl AuthError {
    /// Whether this is a credential rejection (as opposed to a server fault).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::UnknownIdentity | AuthError::BadSecret | AuthError::Inactive
        )
    }
}

/// Verifies `(identity, secret)` against the principal store and issues a token.
#[derive(Clone)]
pub struct LoginService {
    lookup: Arc<dyn PrincipalLookup>,
    hasher: Arc<CredentialHasher>,
    codec: Arc<TokenCodec>,
}

impl LoginService {
    pub fn new(
        lookup: Arc<dyn PrincipalLookup>,
        hasher: Arc<CredentialHasher>,
        codec: Arc<TokenCodec>,
    ) -> Self {
        Self {
            lookup,
            hasher,
            codec,
        }
    }

    /// Every credential outcome pays for exactly one Argon2 verification, so
    /// response time does not tell an unknown identity from a wrong secret.
    pub async fn authenticate(
        &self,
        identity: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let record = self
            .lookup
            .lookup(identity)
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let hasher = self.hasher.clone();
        let secret = secret.to_string();
        let digest = record.as_ref().map(|r| r.credential_digest.clone());

        // Argon2 is CPU-bound; keep it off the async workers.
        let matched = tokio::task::spawn_blocking(move || match digest {
            Some(digest) => hasher.verify(&secret, &digest),
            None => {
                hasher.verify_decoy(&secret);
                false
            }
        })
        .await
        .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let Some(record) = record else {
            return Err(AuthError::UnknownIdentity);
        };
        if !matched {
            return Err(AuthError::BadSecret);
        }
        if !record.active {
            return Err(AuthError::Inactive);
        }

        Ok(self.codec.issue(&record.identity, now)?)
    }
}

impl core::fmt::Debug for LoginService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginService")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
