//! Service wiring: principal store, hasher, codec and rule table.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use stockgate_auth::{
    roles::ROLE_ADMIN, CredentialHasher, LoginService, PrincipalLookup, PrincipalResolver,
    RouteTable, TokenCodec,
};
use stockgate_infra::principal_store::{default_grant, InMemoryPrincipalStore};

use crate::config::AppConfig;

/// Identity seeded into the in-memory store when a bootstrap password is set.
pub const BOOTSTRAP_ADMIN_IDENTITY: &str = "admin";

/// Shared, read-only state handed to every request.
///
/// Holds no per-request data; everything request-scoped lives in extensions.
#[derive(Debug, Clone)]
pub struct AppState {
    pub codec: Arc<TokenCodec>,
    pub resolver: PrincipalResolver,
    pub login: LoginService,
    pub rules: Arc<RouteTable>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        codec: TokenCodec,
        hasher: CredentialHasher,
        lookup: Arc<dyn PrincipalLookup>,
        rules: RouteTable,
        request_timeout: Duration,
    ) -> Self {
        let codec = Arc::new(codec);
        Self {
            resolver: PrincipalResolver::new(lookup.clone()),
            login: LoginService::new(lookup, Arc::new(hasher), codec.clone()),
            codec,
            rules: Arc::new(rules),
            request_timeout,
        }
    }
}

/// Build [`AppState`] from startup configuration.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let rules = config.load_route_table().context("loading route rules")?;
    let hasher = CredentialHasher::new(config.hasher).context("configuring credential hasher")?;
    let codec = TokenCodec::new(config.signing_key.clone(), config.token_ttl);

    let lookup = principal_store(config, &hasher).await?;

    tracing::info!(
        rules = rules.len(),
        token_ttl_secs = config.token_ttl.num_seconds(),
        "credential layer ready"
    );

    Ok(AppState::new(codec, hasher, lookup, rules, config.request_timeout))
}

#[cfg(feature = "postgres")]
async fn principal_store(
    config: &AppConfig,
    hasher: &CredentialHasher,
) -> anyhow::Result<Arc<dyn PrincipalLookup>> {
    if let Some(url) = &config.database_url {
        let store = stockgate_infra::principal_store::PostgresPrincipalStore::connect(url)
            .await
            .context("connecting to principal store")?;
        tracing::info!("using postgres principal store");
        return Ok(Arc::new(store));
    }
    in_memory_store(config, hasher)
}

#[cfg(not(feature = "postgres"))]
async fn principal_store(
    config: &AppConfig,
    hasher: &CredentialHasher,
) -> anyhow::Result<Arc<dyn PrincipalLookup>> {
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but the postgres feature is disabled; ignoring it");
    }
    in_memory_store(config, hasher)
}

fn in_memory_store(
    config: &AppConfig,
    hasher: &CredentialHasher,
) -> anyhow::Result<Arc<dyn PrincipalLookup>> {
    let store = InMemoryPrincipalStore::new();
    match &config.bootstrap_admin_password {
        Some(password) => {
            store
                .seed(
                    hasher,
                    BOOTSTRAP_ADMIN_IDENTITY,
                    password,
                    vec![default_grant(ROLE_ADMIN)],
                )
                .context("seeding bootstrap admin")?;
            tracing::info!(identity = BOOTSTRAP_ADMIN_IDENTITY, "seeded in-memory principal store");
        }
        None => {
            tracing::warn!("in-memory principal store is empty; every login will fail");
        }
    }
    Ok(Arc::new(store))
}
