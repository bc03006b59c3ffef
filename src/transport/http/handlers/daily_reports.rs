use crate::app::daily_reports::DailyReportFilter;
use crate::domain::model::DailyReportInput;
use crate::domain::payload::RecordId;
use crate::transport::http::handlers::common::{json_422, service_error_response, to_data};
use crate::transport::http::types::{ApiResponse, AppState, DailyReportListParams, RecordPatch};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value as JsonValue;
use tracing::warn;

#[utoipa::path(
    post,
    path = "/api/daily-reports",
    request_body = DailyReportInput,
    responses(
        (status = 201, description = "Report created", body = ApiResponse),
        (status = 200, description = "Existing report for the same site and date updated", body = ApiResponse),
        (status = 400, description = "Bad request", body = ApiResponse),
        (status = 403, description = "Database refused the write", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn submit_report_handler(
    State(state): State<AppState>,
    request: Result<Json<DailyReportInput>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"site_id\": ..., \"work_date\": \"YYYY-MM-DD\", ...}"),
    };

    match state.daily_reports.submit(request).await {
        Ok(outcome) => {
            let (status, message) = if outcome.created {
                (StatusCode::CREATED, "Daily report created")
            } else {
                (StatusCode::OK, "Daily report updated")
            };
            (status, Json(ApiResponse::ok(to_data(&outcome)).with_message(message))).into_response()
        }
        Err(e) => service_error_response(e),
    }
}

#[utoipa::path(
    put,
    path = "/api/daily-reports/{id}",
    params(
        ("id" = String, Path, description = "Report id")
    ),
    request_body = RecordPatch,
    responses(
        (status = 200, description = "Report updated", body = ApiResponse),
        (status = 400, description = "Bad request", body = ApiResponse),
        (status = 404, description = "No report with this id", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn update_report_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<RecordPatch>, JsonRejection>,
) -> impl IntoResponse {
    let Json(RecordPatch(patch)) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"column\": value, ...}"),
    };

    match state.daily_reports.update(RecordId::new(id), patch).await {
        Ok(row) => (
            StatusCode::OK,
            Json(ApiResponse::ok(row).with_message("Daily report updated")),
        )
            .into_response(),
        Err(e) => service_error_response(e),
    }
}

/// Report list for the mobile client. Never fails: any error yields an empty list
/// flagged with `warning: "fallback"`.
#[utoipa::path(
    get,
    path = "/api/mobile/daily-reports",
    params(DailyReportListParams),
    responses(
        (status = 200, description = "Reports, or an empty fallback list with a warning", body = ApiResponse)
    )
)]
pub async fn mobile_list_reports_handler(
    State(state): State<AppState>,
    params: Result<Query<DailyReportListParams>, QueryRejection>,
) -> impl IntoResponse {
    let result = match params {
        Ok(Query(p)) => state
            .daily_reports
            .list(DailyReportFilter { site_id: p.site_id, status: p.status, limit: p.limit })
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match result {
        Ok(rows) => (StatusCode::OK, Json(ApiResponse::ok(JsonValue::Array(rows)))).into_response(),
        Err(e) => {
            warn!(error = %e, "mobile report list failed, serving fallback");
            (
                StatusCode::OK,
                Json(ApiResponse {
                    success: true,
                    data: Some(JsonValue::Array(Vec::new())),
                    error: None,
                    message: None,
                    warning: Some("fallback".to_string()),
                }),
            )
                .into_response()
        }
    }
}
