use crate::app::error::ServiceError;
use crate::app::shipment_updater::ShipmentUpdateError;
use crate::app::upsert::UpsertError;
use crate::storage::StoreError;
use crate::transport::http::types::ApiResponse;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, warn};

pub fn json_422(err: JsonRejection, expected: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::failure(format!(
            "Invalid JSON body: {} (expected: {})",
            err, expected
        ))),
    )
        .into_response()
}

pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Invalid(_) | ServiceError::Payload(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound => StatusCode::NOT_FOUND,
        ServiceError::Upsert(UpsertError::NoDefault { .. }) => StatusCode::BAD_REQUEST,
        ServiceError::ShipmentUpdate(ShipmentUpdateError::NothingToUpdate { .. }) => {
            StatusCode::BAD_REQUEST
        }
        _ => match err.store_error() {
            Some(StoreError::PermissionDenied(_)) => StatusCode::FORBIDDEN,
            Some(StoreError::NotFound) => StatusCode::NOT_FOUND,
            Some(StoreError::InvalidIdentifier(_)) => StatusCode::BAD_REQUEST,
            Some(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

pub fn service_error_response(err: ServiceError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, "request failed");
    } else {
        warn!(error = %err, status = status.as_u16(), "request rejected");
    }
    (status, Json(ApiResponse::failure(err.to_string()))).into_response()
}

/// Serializes a service result into the `data` field.
pub fn to_data<T: Serialize>(value: &T) -> JsonValue {
    serde_json::to_value(value).unwrap_or(JsonValue::Null)
}
