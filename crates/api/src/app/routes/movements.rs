use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockroom_core::MovementId;
use stockroom_infra::LedgerStore;
use stockroom_inventory::{MoveType, Reason};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router<S>() -> Router
where
    S: LedgerStore + Clone + 'static,
{
    Router::new()
        .route("/", get(list_movements::<S>).post(record_movement::<S>))
        .route("/aggregate", get(aggregate_movements::<S>))
        .route("/reasons", get(list_reasons))
        .route(
            "/:id",
            get(get_movement::<S>)
                .patch(amend_movement::<S>)
                .delete(remove_movement::<S>),
        )
}

fn parse_movement_id(id: &str) -> Result<MovementId, axum::response::Response> {
    id.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid movement id"))
}

pub async fn record_movement<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Json(body): Json<dto::RecordMovementRequest>,
) -> axum::response::Response {
    let cmd = match body.into_command() {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.ledger.record(cmd).await {
        Ok(write) => (
            StatusCode::CREATED,
            Json(dto::LedgerWriteResponse {
                movement: write.movement.into(),
                stock: write.change.into(),
            }),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_movements<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Query(params): Query<dto::MovementListQuery>,
) -> axum::response::Response {
    let filter = match params.to_filter() {
        Ok(f) => f,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let limit = services.movement_limit(params.limit);

    match services.ledger.list(&filter, limit).await {
        Ok(movements) => Json(
            movements
                .into_iter()
                .map(dto::MovementResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn aggregate_movements<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Query(params): Query<dto::AggregateQuery>,
) -> axum::response::Response {
    let filter = match params.to_filter() {
        Ok(f) => f,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let group_by = match params.group_by() {
        Ok(g) => g,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.ledger.aggregate(&filter, group_by, params.signed).await {
        Ok(rows) => Json(
            rows.into_iter()
                .map(dto::AggregateRowResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Reason choices, narrowed to one move type when `move_type` is given.
pub async fn list_reasons(Query(params): Query<dto::ReasonsQuery>) -> axum::response::Response {
    let reasons: Vec<Reason> = match params.move_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match raw.parse::<MoveType>() {
            Ok(t) => t.allowed_reasons().to_vec(),
            Err(e) => return errors::domain_error_to_response(e),
        },
        None => Reason::ALL.to_vec(),
    };

    Json(
        reasons
            .into_iter()
            .map(dto::ReasonChoice::from)
            .collect::<Vec<_>>(),
    )
    .into_response()
}

pub async fn get_movement<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_movement_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.get(id).await {
        Ok(m) => Json(dto::MovementResponse::from(m)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Amend a movement's note. Other fields may be repeated but not changed.
pub async fn amend_movement<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AmendMovementRequest>,
) -> axum::response::Response {
    let id = match parse_movement_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let edit = match body.into_edit() {
        Ok(e) => e,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.ledger.amend(id, edit).await {
        Ok(m) => Json(dto::MovementResponse::from(m)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Delete a movement and reverse its effect on stock.
pub async fn remove_movement<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_movement_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.remove(id).await {
        Ok(write) => Json(dto::LedgerWriteResponse {
            movement: write.movement.into(),
            stock: write.change.into(),
        })
        .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
