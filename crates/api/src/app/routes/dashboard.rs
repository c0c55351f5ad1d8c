use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;

use stockroom_infra::LedgerStore;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router<S>() -> Router
where
    S: LedgerStore + Clone + 'static,
{
    Router::new().route("/", get(dashboard::<S>))
}

pub async fn dashboard<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
) -> axum::response::Response {
    match services.reporting.dashboard(Utc::now()).await {
        Ok(d) => Json(d).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
