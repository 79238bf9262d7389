//! Request authentication.
//!
//! Turns an optional `Authorization: Bearer <token>` header into an
//! [`AuthContext`]. This layer never rejects a request: a missing, malformed
//! or unverifiable credential just leaves the request anonymous and the
//! authorization layer decides what that means for the route.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use tracing::Instrument;

use stockgate_auth::{Principal, PrincipalResolver, ResolveError, TokenCodec, TokenError};

use crate::app::services::AppState;
use crate::context::{AuthContext, RequestId};

pub const BEARER_PREFIX: &str = "Bearer ";

/// Why a presented credential did not authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Token(TokenError),
    Resolve(ResolveError),
}

#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// No bearer credential on the request.
    NoToken,
    /// A credential was presented but did not yield an active principal.
    Rejected(Rejection),
    Authenticated(Arc<Principal>),
}

impl AuthOutcome {
    pub fn into_context(self) -> AuthContext {
        match self {
            AuthOutcome::Authenticated(principal) => AuthContext::authenticated(principal),
            AuthOutcome::NoToken | AuthOutcome::Rejected(_) => AuthContext::anonymous(),
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header.
///
/// Other schemes, non-ASCII header values and an empty token all count as
/// no token at all.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();
    (!token.is_empty()).then_some(token)
}

/// Verify `token` and resolve its subject.
pub async fn authenticate_token(
    token: Option<&str>,
    codec: &TokenCodec,
    resolver: &PrincipalResolver,
    now: DateTime<Utc>,
) -> AuthOutcome {
    let Some(token) = token else {
        return AuthOutcome::NoToken;
    };

    let verified = match codec.verify(token, now) {
        Ok(verified) => verified,
        Err(err) => return AuthOutcome::Rejected(Rejection::Token(err)),
    };

    match resolver.resolve(&verified.subject).await {
        Ok(principal) => AuthOutcome::Authenticated(Arc::new(principal)),
        Err(err) => AuthOutcome::Rejected(Rejection::Resolve(err)),
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = bearer_token(req.headers());
    let outcome = authenticate_token(token, &state.codec, &state.resolver, Utc::now()).await;

    match &outcome {
        AuthOutcome::NoToken => {}
        AuthOutcome::Authenticated(principal) => {
            tracing::debug!(identity = %principal.identity(), "request authenticated");
        }
        AuthOutcome::Rejected(Rejection::Token(err)) => {
            tracing::debug!(reason = %err, "bearer token rejected");
        }
        AuthOutcome::Rejected(Rejection::Resolve(ResolveError::Unavailable(err))) => {
            tracing::warn!(error = %err, "principal lookup failed; treating request as anonymous");
        }
        AuthOutcome::Rejected(Rejection::Resolve(err)) => {
            tracing::debug!(reason = %err, "token subject rejected");
        }
    }

    req.extensions_mut().insert(outcome.into_context());
    next.run(req).await
}

/// Tag each request with a [`RequestId`] and run it inside a span.
pub async fn request_span(mut req: Request, next: Next) -> Response {
    let request_id = RequestId::new();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    req.extensions_mut().insert(request_id);

    async move {
        let response = next.run(req).await;
        tracing::debug!(status = response.status().as_u16(), "request finished");
        response
    }
    .instrument(span)
    .await
}
