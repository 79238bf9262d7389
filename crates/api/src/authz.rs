//! Route authorization guard.
//!
//! Runs after [`auth_middleware`](crate::middleware::auth_middleware) and
//! checks the request against the route table before any handler sees it.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use stockgate_auth::{authorize, AuthzDecision, DenyReason, HttpMethod};

use crate::app::{errors, services::AppState};
use crate::context::AuthContext;

/// Map a request method onto the methods rules can name.
///
/// Anything else (TRACE, CONNECT, extension methods) matches no rule.
pub fn rule_method(method: &Method) -> Option<HttpMethod> {
    Some(match *method {
        Method::GET => HttpMethod::Get,
        Method::HEAD => HttpMethod::Head,
        Method::POST => HttpMethod::Post,
        Method::PUT => HttpMethod::Put,
        Method::PATCH => HttpMethod::Patch,
        Method::DELETE => HttpMethod::Delete,
        Method::OPTIONS => HttpMethod::Options,
        _ => return None,
    })
}

pub async fn authz_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let principal = req
        .extensions()
        .get::<AuthContext>()
        .and_then(AuthContext::principal);

    let decision = match rule_method(req.method()) {
        Some(method) => authorize(&state.rules, method, req.uri().path(), principal),
        None => AuthzDecision::Deny(DenyReason::Unauthenticated),
    };

    match decision {
        AuthzDecision::Allow => next.run(req).await,
        AuthzDecision::Deny(reason) => {
            tracing::debug!(?reason, "request denied");
            match reason {
                DenyReason::Unauthenticated => errors::unauthenticated(),
                DenyReason::Forbidden => errors::forbidden(),
            }
        }
    }
}
