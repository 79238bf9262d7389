//! Process configuration, read once at startup.
//!
//! Every error here is fatal: the server must not start with a missing or weak
//! signing key or an invalid rule table.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use stockgate_auth::{
    HasherParams, KeyError, RouteTable, RouteTableSpec, RuleError, SigningKey,
    DEFAULT_TOKEN_TTL_SECS,
};

/// Rule table used when `STOCKGATE_ROUTE_RULES` is not set.
pub const DEFAULT_ROUTE_RULES: &str = include_str!("../config/route_rules.toml");

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("STOCKGATE_SIGNING_KEY is not set")]
    MissingSigningKey,

    #[error("STOCKGATE_SIGNING_KEY rejected: {0}")]
    WeakSigningKey(#[from] KeyError),

    #[error("{var}: invalid value '{value}'")]
    Invalid { var: &'static str, value: String },

    #[error("failed to read route rules from {path}: {source}")]
    RulesIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("route rules are not valid TOML: {0}")]
    RulesSyntax(#[from] toml::de::Error),

    #[error("route rules rejected: {0}")]
    Rules(#[from] RuleError),
}

/// Startup configuration.
///
/// No `Debug`: it carries the signing key and the bootstrap password.
#[derive(Clone)]
pub struct AppConfig {
    pub signing_key: SigningKey,
    pub token_ttl: chrono::Duration,
    pub bind_addr: SocketAddr,
    pub route_rules_path: Option<PathBuf>,
    pub request_timeout: Duration,
    pub hasher: HasherParams,
    /// Seeds an in-memory `admin` principal when set.
    pub bootstrap_admin_password: Option<String>,
    /// Postgres principal store (feature `postgres`).
    pub database_url: Option<String>,
}

impl AppConfig {
    /// Read configuration from the environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `get` (tests pass a map).
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let signing_key = var("STOCKGATE_SIGNING_KEY").ok_or(ConfigError::MissingSigningKey)?;
        let signing_key = SigningKey::from_bytes(signing_key.as_bytes())?;

        let ttl_secs = parse_positive(
            "STOCKGATE_TOKEN_TTL_SECS",
            var("STOCKGATE_TOKEN_TTL_SECS"),
            DEFAULT_TOKEN_TTL_SECS as u64,
        )?;
        let token_ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| ConfigError::Invalid {
                var: "STOCKGATE_TOKEN_TTL_SECS",
                value: ttl_secs.to_string(),
            })?;

        let bind_addr = var("STOCKGATE_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr.parse().map_err(|_| ConfigError::Invalid {
            var: "STOCKGATE_BIND_ADDR",
            value: bind_addr.clone(),
        })?;

        let request_timeout = Duration::from_secs(parse_positive(
            "STOCKGATE_REQUEST_TIMEOUT_SECS",
            var("STOCKGATE_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);

        Ok(Self {
            signing_key,
            token_ttl,
            bind_addr,
            route_rules_path: var("STOCKGATE_ROUTE_RULES").map(PathBuf::from),
            request_timeout,
            hasher: HasherParams::default(),
            bootstrap_admin_password: var("STOCKGATE_BOOTSTRAP_ADMIN_PASSWORD"),
            database_url: var("DATABASE_URL"),
        })
    }

    /// Load the configured rule table, or the built-in default.
    pub fn load_route_table(&self) -> Result<RouteTable, ConfigError> {
        match &self.route_rules_path {
            Some(path) => load_route_table_file(path),
            None => parse_route_table(DEFAULT_ROUTE_RULES),
        }
    }
}

pub fn parse_route_table(source: &str) -> Result<RouteTable, ConfigError> {
    let spec: RouteTableSpec = toml::from_str(source)?;
    Ok(RouteTable::try_from(spec)?)
}

pub fn load_route_table_file(path: &Path) -> Result<RouteTable, ConfigError> {
    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::RulesIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_route_table(&source)
}

fn parse_positive(var: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}
