use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::errors;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Fallback for paths no router claims. Only reached once authorization has
/// let the request through.
pub async fn not_found() -> axum::response::Response {
    errors::not_found()
}
