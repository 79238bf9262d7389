//! Infrastructure layer: principal store adapters.

pub mod principal_store;
