use axum::{
    routing::{get, post},
    Router,
};

use crate::app::services::AppState;

pub mod auth;
pub mod system;

/// Routes owned by the credential layer itself.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(system::health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
}
