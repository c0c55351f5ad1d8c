use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use stockroom_core::ProductId;
use stockroom_infra::{LedgerStore, ProductQuery};
use stockroom_products::Category;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router<S>() -> Router
where
    S: LedgerStore + Clone + 'static,
{
    Router::new()
        .route("/", get(list_products::<S>).post(create_product::<S>))
        .route("/categories", get(list_categories))
        .route(
            "/:id",
            get(get_product::<S>)
                .put(update_product::<S>)
                .delete(delete_product::<S>),
        )
        .route("/:id/as-of", get(product_as_of::<S>))
}

fn parse_product_id(id: &str) -> Result<ProductId, axum::response::Response> {
    id.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"))
}

pub async fn create_product<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let cmd = match body.into_command() {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.catalog.create(cmd).await {
        Ok(p) => (StatusCode::CREATED, Json(dto::ProductResponse::from(&p))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_products<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Query(params): Query<dto::ProductListQuery>,
) -> axum::response::Response {
    let category = match params.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match raw.parse::<Category>() {
            Ok(c) => Some(c),
            Err(e) => return errors::domain_error_to_response(e),
        },
        None => None,
    };
    let query = ProductQuery {
        category,
        search: params.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
    };

    match services.catalog.list(&query).await {
        Ok(products) => Json(
            products
                .iter()
                .map(dto::ProductResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_categories() -> impl IntoResponse {
    Json(
        Category::ALL
            .into_iter()
            .map(|c| dto::CategoryResponse {
                key: c.key(),
                label: c.label(),
            })
            .collect::<Vec<_>>(),
    )
}

pub async fn get_product<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.get(id).await {
        Ok(p) => Json(dto::ProductResponse::from(&p)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn update_product<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateProductRequest>,
) -> axum::response::Response {
    let id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = match body.into_command() {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.catalog.update(id, cmd).await {
        Ok(p) => Json(dto::ProductResponse::from(&p)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_product<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Quantity on hand at `at` (defaults to now), rebuilt from the ledger.
pub async fn product_as_of<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
    Query(params): Query<dto::AsOfQuery>,
) -> axum::response::Response {
    let id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let at = match params.at.as_deref() {
        Some(raw) => match dto::parse_timestamp("at", raw) {
            Ok(t) => t,
            Err(e) => return errors::domain_error_to_response(e),
        },
        None => Utc::now(),
    };

    let product = match services.catalog.get(id).await {
        Ok(p) => p,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    match services.ledger.as_of(id, at).await {
        Ok(qty) => Json(dto::AsOfResponse {
            product_id: id,
            at,
            current_qty: product.current_qty(),
            as_of_qty: qty,
        })
        .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
