//! Credential hashing (Argon2id, PHC string format).
//!
//! One scheme for every call site: seeded principals, live password changes
//! and login verification all go through [`CredentialHasher`].

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("invalid argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("credential hashing failed")]
    HashingFailed,
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HasherParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HasherParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Salted, slow, versioned credential hasher.
///
/// Construct once at startup: invalid parameters fail here, never per call.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    // Digest of a random secret; verified against when the identity is unknown
    // so both login failure paths cost one Argon2 evaluation.
    decoy: String,
}

impl CredentialHasher {
    pub fn new(params: HasherParams) -> Result<Self, HashError> {
        let params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
            .map_err(|e| HashError::InvalidParams(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let decoy_secret = SaltString::generate(&mut OsRng);
        let decoy = hash_with(&argon2, decoy_secret.as_str())?;

        Ok(Self { argon2, decoy })
    }

    /// One-way transform of `secret` into a PHC digest string.
    pub fn hash(&self, secret: &str) -> Result<String, HashError> {
        hash_with(&self.argon2, secret)
    }

    /// `true` iff `secret` matches `digest`.
    ///
    /// The digest carries its own algorithm parameters and salt. A digest that
    /// cannot be parsed never verifies, but still costs one decoy verification.
    pub fn verify(&self, secret: &str, digest: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed) => self.verify_parsed(secret, &parsed),
            Err(e) => {
                tracing::warn!(error = %e, "stored credential digest is not a valid PHC string");
                self.verify_decoy(secret);
                false
            }
        }
    }

    /// Spend one verification on the decoy digest. Always "fails".
    pub fn verify_decoy(&self, secret: &str) {
        if let Ok(parsed) = PasswordHash::new(&self.decoy) {
            let _ = self.verify_parsed(secret, &parsed);
        }
    }

    fn verify_parsed(&self, secret: &str, parsed: &PasswordHash<'_>) -> bool {
        self.argon2.verify_password(secret.as_bytes(), parsed).is_ok()
    }
}

impl core::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("algorithm", &"argon2id")
            .finish_non_exhaustive()
    }
}

fn hash_with(argon2: &Argon2<'static>, secret: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| HashError::HashingFailed)
}

#[cfg(test)]
pub(crate) fn test_hasher() -> CredentialHasher {
    // Minimum legal cost; keeps the suite fast.
    CredentialHasher::new(HasherParams {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = test_hasher();
        let digest = hasher.hash("correct horse").unwrap();

        assert!(digest.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &digest));
        assert!(!hasher.verify("correct horsE", &digest));
    }

    #[test]
    fn digests_are_salted() {
        let hasher = test_hasher();
        let a = hasher.hash("same secret").unwrap();
        let b = hasher.hash("same secret").unwrap();

        assert_ne!(a, b);
        assert!(hasher.verify("same secret", &a));
        assert!(hasher.verify("same secret", &b));
    }

    #[test]
    fn garbage_digest_never_verifies() {
        let hasher = test_hasher();
        assert!(!hasher.verify("anything", ""));
        assert!(!hasher.verify("anything", "5f4dcc3b5aa765d61d8327deb882cf99"));
        assert!(!hasher.verify("anything", "$argon2id$v=19$broken"));
    }

    #[test]
    fn digest_from_other_params_still_verifies() {
        let strong = CredentialHasher::new(HasherParams {
            memory_kib: 16,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let digest = strong.hash("rotate me").unwrap();

        assert!(test_hasher().verify("rotate me", &digest));
    }

    #[test]
    fn unparseable_digest_costs_as_much_as_the_decoy() {
        let hasher = CredentialHasher::new(HasherParams {
            memory_kib: 4096,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();

        let fastest = |f: &dyn Fn()| {
            (0..3)
                .map(|_| {
                    let start = std::time::Instant::now();
                    f();
                    start.elapsed()
                })
                .min()
                .unwrap()
        };

        let decoy = fastest(&|| hasher.verify_decoy("password"));
        let legacy = fastest(&|| {
            assert!(!hasher.verify("password", "5f4dcc3b5aa765d61d8327deb882cf99"));
        });

        // Parsing alone is orders of magnitude cheaper than one Argon2 pass.
        assert!(legacy * 4 >= decoy, "legacy {legacy:?} vs decoy {decoy:?}");
    }

    #[test]
    fn invalid_params_fail_at_construction() {
        let err = CredentialHasher::new(HasherParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        })
        .unwrap_err();

        assert!(matches!(err, HashError::InvalidParams(_)));
    }
}
