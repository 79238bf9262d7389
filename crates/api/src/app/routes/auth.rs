use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use stockgate_auth::AuthError;

use crate::app::{dto, errors, services::AppState};
use crate::context::CurrentPrincipal;

/// Exchange a username and password for a bearer token.
///
/// Unknown user, wrong password and inactive account produce byte-identical
/// responses; the distinction only reaches the log.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };

    match state
        .login
        .authenticate(&body.username, &body.password, Utc::now())
        .await
    {
        Ok(issued) => {
            tracing::info!(identity = %body.username, "login succeeded");
            Json(dto::LoginResponse::from(issued)).into_response()
        }
        Err(err) if err.is_rejection() => {
            tracing::info!(identity = %body.username, reason = %err, "login rejected");
            errors::invalid_credentials()
        }
        Err(AuthError::Unavailable(err)) => {
            tracing::error!(error = %err, "login failed: principal store unavailable");
            errors::service_unavailable()
        }
        Err(err) => {
            tracing::error!(error = %err, "login failed");
            errors::internal_error()
        }
    }
}

/// The caller's resolved principal.
pub async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> Json<dto::WhoAmIResponse> {
    Json(dto::WhoAmIResponse::from(principal.as_ref()))
}
