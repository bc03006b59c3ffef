use crate::app::shipments::ShipmentFilter;
use crate::domain::model::ShipmentInput;
use crate::domain::payload::RecordId;
use crate::transport::http::handlers::common::{json_422, service_error_response};
use crate::transport::http::types::{ApiResponse, AppState, RecordPatch, ShipmentListParams};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value as JsonValue;

#[utoipa::path(
    post,
    path = "/api/shipments",
    request_body = ShipmentInput,
    responses(
        (status = 201, description = "Shipment created", body = ApiResponse),
        (status = 400, description = "Bad request", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn create_shipment_handler(
    State(state): State<AppState>,
    request: Result<Json<ShipmentInput>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"site_id\": ..., \"material_name\": ..., ...}"),
    };

    match state.shipments.create(request).await {
        Ok(row) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok(row).with_message("Shipment created")),
        )
            .into_response(),
        Err(e) => service_error_response(e),
    }
}

#[utoipa::path(
    patch,
    path = "/api/shipments/{id}",
    params(
        ("id" = String, Path, description = "Shipment id")
    ),
    request_body = RecordPatch,
    responses(
        (status = 200, description = "Shipment updated", body = ApiResponse),
        (status = 400, description = "Bad request or nothing left to update", body = ApiResponse),
        (status = 404, description = "No shipment with this id", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn update_shipment_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<RecordPatch>, JsonRejection>,
) -> impl IntoResponse {
    let Json(RecordPatch(patch)) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"status\": \"in_transit\", ...}"),
    };

    match state.shipments.update(RecordId::new(id), patch).await {
        Ok(row) => (
            StatusCode::OK,
            Json(ApiResponse::ok(row).with_message("Shipment updated")),
        )
            .into_response(),
        Err(e) => service_error_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/api/shipments",
    params(ShipmentListParams),
    responses(
        (status = 200, description = "Shipments, newest first", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn list_shipments_handler(
    State(state): State<AppState>,
    Query(params): Query<ShipmentListParams>,
) -> impl IntoResponse {
    let filter = ShipmentFilter { site_id: params.site_id, status: params.status, limit: params.limit };
    match state.shipments.list(filter).await {
        Ok(rows) => (StatusCode::OK, Json(ApiResponse::ok(JsonValue::Array(rows)))).into_response(),
        Err(e) => service_error_response(e),
    }
}
