use axum::Router;

use stockroom_infra::LedgerStore;

pub mod dashboard;
pub mod movements;
pub mod products;
pub mod reports;
pub mod system;

/// Router for every ledger endpoint.
pub fn router<S>() -> Router
where
    S: LedgerStore + Clone + 'static,
{
    Router::new()
        .nest("/products", products::router::<S>())
        .nest("/movements", movements::router::<S>())
        .nest("/dashboard", dashboard::router::<S>())
        .nest("/reports", reports::router::<S>())
}
