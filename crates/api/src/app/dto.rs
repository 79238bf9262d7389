use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockgate_auth::{IssuedToken, Principal};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedToken> for LoginResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            expires_in: issued.expires_in_secs(),
            expires_at: issued.expires_at,
            token: issued.token,
            token_type: "Bearer",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub identity: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl From<&Principal> for WhoAmIResponse {
    fn from(principal: &Principal) -> Self {
        Self {
            identity: principal.identity().to_string(),
            roles: principal
                .sorted_roles()
                .into_iter()
                .map(str::to_string)
                .collect(),
            permissions: principal
                .sorted_permissions()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}
