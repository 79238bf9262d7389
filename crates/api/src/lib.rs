//! HTTP surface of the credential layer: login, request authentication and
//! route authorization.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;

pub use app::{build_app, services::AppState};
