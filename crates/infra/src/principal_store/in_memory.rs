use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use stockgate_auth::{
    CredentialHasher, HashError, LookupError, PrincipalLookup, PrincipalRecord, RoleGrant,
};

/// In-memory principal store.
///
/// Intended for tests/dev. Identities are matched case-sensitively.
#[derive(Debug, Default)]
pub struct InMemoryPrincipalStore {
    records: RwLock<HashMap<String, PrincipalRecord>>,
}

impl InMemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = PrincipalRecord>) -> Self {
        Self {
            records: RwLock::new(
                records
                    .into_iter()
                    .map(|r| (r.identity.clone(), r))
                    .collect(),
            ),
        }
    }

    /// Insert or replace a record.
    pub fn upsert(&self, record: PrincipalRecord) -> Result<(), LookupError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.insert(record.identity.clone(), record);
        Ok(())
    }

    /// Hash `secret` and store an active principal with `roles`.
    pub fn seed(
        &self,
        hasher: &CredentialHasher,
        identity: &str,
        secret: &str,
        roles: Vec<RoleGrant>,
    ) -> Result<(), SeedError> {
        let credential_digest = hasher.hash(secret)?;
        self.upsert(PrincipalRecord {
            identity: identity.to_string(),
            credential_digest,
            roles,
            active: true,
        })?;
        Ok(())
    }

    /// Flip the active flag. Returns `false` if the identity is unknown.
    pub fn set_active(&self, identity: &str, active: bool) -> Result<bool, LookupError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        Ok(match records.get_mut(identity) {
            Some(record) => {
                record.active = active;
                true
            }
            None => false,
        })
    }

    pub fn remove(&self, identity: &str) -> Result<Option<PrincipalRecord>, LookupError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        Ok(records.remove(identity))
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PrincipalLookup for InMemoryPrincipalStore {
    async fn lookup(&self, identity: &str) -> Result<Option<PrincipalRecord>, LookupError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(identity).cloned())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Store(#[from] LookupError),
}

fn poisoned() -> LookupError {
    LookupError::Unavailable("lock poisoned".to_string())
}
