use std::sync::Arc;

use axum::{http::request::Parts, response::Response};
use uuid::Uuid;

use stockgate_auth::Principal;

use crate::app::errors;

/// Correlation id of one request (UUIDv7, time-ordered).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Authentication result for a request.
///
/// Lives in the request's extensions and is dropped with the request, so it
/// can never be observed by another request.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    principal: Option<Arc<Principal>>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self { principal: None }
    }

    pub fn authenticated(principal: Arc<Principal>) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}

/// Extractor for handlers that need the caller's principal.
///
/// Rejects with 401 when the request is anonymous; routes guarded by an
/// authenticated rule never hit that path.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Arc<Principal>);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .and_then(|ctx| ctx.principal.clone())
            .map(CurrentPrincipal)
            .ok_or_else(errors::unauthenticated)
    }
}
