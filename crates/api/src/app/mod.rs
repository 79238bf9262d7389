//! HTTP application wiring (Axum router + credential layer).
//!
//! - `services.rs`: principal store, hasher, codec and rule table wiring
//! - `routes/`: login, whoami and health handlers
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent error responses

use axum::{middleware::from_fn, middleware::from_fn_with_state, Router};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use crate::{authz, middleware};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppState;

/// Build the full HTTP router around `business` routes.
///
/// Every request, including ones no route claims, passes through
/// authentication and then the route rule table before reaching a handler.
pub fn build_app(state: AppState, business: Router<AppState>) -> Router {
    let stack = ServiceBuilder::new()
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(from_fn(middleware::request_span))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware))
        .layer(from_fn_with_state(state.clone(), authz::authz_middleware));

    routes::router()
        .merge(business)
        .fallback(routes::system::not_found)
        .layer(stack)
        .with_state(state)
}
