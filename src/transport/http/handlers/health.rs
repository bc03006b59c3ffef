use crate::transport::http::types::{ApiResponse, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy (store reachable)", body = ApiResponse),
        (status = 503, description = "Service is unhealthy (store unreachable)", body = ApiResponse)
    )
)]
pub async fn healthcheck_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::ok(serde_json::json!({
                "status": "ok",
                "known_missing_columns": state.known_missing.len().await,
            }))),
        )
            .into_response(),
        Err(e) => {
            let mut body = ApiResponse::failure(format!("Store ping failed: {}", e));
            body.data = Some(serde_json::json!({ "status": "unhealthy" }));
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}
