use crate::domain::model::SalarySnapshotInput;
use crate::domain::payload::RecordId;
use crate::transport::http::handlers::common::{json_422, service_error_response, to_data};
use crate::transport::http::types::{ApiResponse, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    post,
    path = "/api/salary-snapshots",
    request_body = SalarySnapshotInput,
    responses(
        (status = 201, description = "Snapshot issued", body = ApiResponse),
        (status = 200, description = "Snapshot reissued for an existing period", body = ApiResponse),
        (status = 400, description = "Bad request", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn issue_snapshot_handler(
    State(state): State<AppState>,
    request: Result<Json<SalarySnapshotInput>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => {
            return json_422(e, "{\"site_id\": ..., \"worker_id\": ..., \"period\": \"YYYY-MM\", ...}")
        }
    };

    match state.salary_snapshots.issue(request).await {
        Ok(issued) => {
            let (status, message) = if issued.reissued {
                (StatusCode::OK, "Salary snapshot reissued")
            } else {
                (StatusCode::CREATED, "Salary snapshot issued")
            };
            (status, Json(ApiResponse::ok(to_data(&issued)).with_message(message))).into_response()
        }
        Err(e) => service_error_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/api/salary-snapshots/{id}",
    params(
        ("id" = String, Path, description = "Snapshot id")
    ),
    responses(
        (status = 200, description = "Snapshot with its verified document", body = ApiResponse),
        (status = 404, description = "No snapshot with this id", body = ApiResponse),
        (status = 500, description = "Stored document missing or does not match its digest", body = ApiResponse)
    )
)]
pub async fn get_snapshot_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.salary_snapshots.fetch(&RecordId::new(id)).await {
        Ok(view) => (StatusCode::OK, Json(ApiResponse::ok(to_data(&view)))).into_response(),
        Err(e) => service_error_response(e),
    }
}
