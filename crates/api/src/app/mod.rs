//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: catalog, ledger and reporting over one store
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and query parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use stockroom_infra::LedgerStore;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the tests).
pub fn build_app<S>(services: AppServices<S>) -> Router
where
    S: LedgerStore + Clone + 'static,
{
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router::<S>())
        .layer(ServiceBuilder::new().layer(Extension(Arc::new(services))))
}
