use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use stockroom_infra::{LedgerStore, XLSX_CONTENT_TYPE};
use stockroom_inventory::ReportMonth;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router<S>() -> Router
where
    S: LedgerStore + Clone + 'static,
{
    Router::new().route("/monthly", get(monthly_snapshot::<S>))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportFormat {
    Xlsx,
    Csv,
    Json,
}

/// End-of-month stock snapshot. Without `year`/`month` the previous month is
/// used. Excel workbook by default, `format=csv` for a CSV attachment and
/// `format=json` for the structured rows.
pub async fn monthly_snapshot<S: LedgerStore + Clone + 'static>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Query(params): Query<dto::MonthlyQuery>,
) -> axum::response::Response {
    let month = match (params.year, params.month) {
        (None, None) => services.reporting.default_month(Utc::now()),
        (Some(year), Some(month)) => match ReportMonth::new(year, month) {
            Ok(m) => m,
            Err(e) => return errors::domain_error_to_response(e),
        },
        (None, Some(_)) => return errors::validation_error("year", "year is required with month"),
        (Some(_), None) => return errors::validation_error("month", "month is required with year"),
    };
    let format = match params.format.as_deref().map(str::trim) {
        None | Some("") | Some("xlsx") => ExportFormat::Xlsx,
        Some("csv") => ExportFormat::Csv,
        Some("json") => ExportFormat::Json,
        Some(other) => {
            return errors::validation_error(
                "format",
                format!("unsupported format '{other}' (expected xlsx, csv or json)"),
            );
        }
    };

    let snapshot = match services.reporting.monthly_snapshot(month).await {
        Ok(s) => s,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    let (body, content_type, file_name) = match format {
        ExportFormat::Json => return Json(snapshot).into_response(),
        ExportFormat::Xlsx => (snapshot.to_xlsx(), XLSX_CONTENT_TYPE, snapshot.file_name()),
        ExportFormat::Csv => (snapshot.to_csv(), "text/csv; charset=utf-8", snapshot.csv_file_name()),
    };
    let body = match body {
        Ok(b) => b,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response()
}
