//! Material shipments to sites.

use crate::app::error::ServiceError;
use crate::app::known_columns::KnownMissingColumns;
use crate::app::shipment_updater::ShipmentUpdater;
use crate::app::upsert::{AdaptiveUpsert, WriteIntent};
use crate::domain::model::ShipmentInput;
use crate::domain::payload::{Payload, RecordId};
use crate::domain::policy::{DefaultRule, WritePolicy};
use crate::storage::schema::MATERIAL_SHIPMENTS;
use crate::storage::{ListQuery, RecordStore};
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Columns a shipment update may shed when the live table lacks them.
pub const SHIPMENT_OPTIONAL_COLUMNS: &[&str] = &[
    "quantity",
    "unit",
    "carrier",
    "tracking_number",
    "shipped_at",
    "delivered_at",
    "received_by",
    "notes",
    "updated_at",
];

pub const SHIPMENT_STATUSES: &[&str] = &["pending", "in_transit", "delivered", "cancelled"];

pub fn shipment_policy(require_progress: bool) -> WritePolicy {
    WritePolicy::new(MATERIAL_SHIPMENTS.name)
        .essential(["site_id", "material_name"])
        .removable(SHIPMENT_OPTIONAL_COLUMNS.iter().copied())
        .default_for("status", DefaultRule::Status { fallback: "pending".to_string() })
        .default_for("quantity", DefaultRule::Zero)
        .max_attempts(6)
        .require_progress(require_progress)
}

#[derive(Debug, Clone, Default)]
pub struct ShipmentFilter {
    pub site_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

pub struct ShipmentService {
    store: Arc<dyn RecordStore>,
    known_missing: KnownMissingColumns,
    policy: WritePolicy,
}

impl ShipmentService {
    pub fn new(store: Arc<dyn RecordStore>, known_missing: KnownMissingColumns, policy: WritePolicy) -> Self {
        Self { store, known_missing, policy }
    }

    pub async fn create(&self, input: ShipmentInput) -> Result<JsonValue, ServiceError> {
        input.validate().map_err(ServiceError::Invalid)?;
        if let Some(status) = &input.status {
            check_status(status)?;
        }
        let intent = WriteIntent::insert(input.to_payload()).with_desired_status(input.status.clone());
        let outcome = AdaptiveUpsert::new(self.store.as_ref(), &self.policy)
            .with_known_missing(&self.known_missing)
            .execute(intent)
            .await?;
        info!(site_id = %input.site_id, attempts = outcome.attempts, "shipment created");
        Ok(outcome.row)
    }

    pub async fn update(&self, id: RecordId, patch: JsonValue) -> Result<JsonValue, ServiceError> {
        let mut payload = Payload::from_value(patch)?;
        payload.remove(&self.policy.primary_key);
        if payload.is_empty() {
            return Err(ServiceError::invalid("patch has no fields"));
        }
        let now = Utc::now().to_rfc3339();
        if let Some(status) = payload.get("status").and_then(JsonValue::as_str).map(str::to_string) {
            check_status(&status)?;
            if status == "delivered" && !payload.contains("delivered_at") {
                payload.insert("delivered_at", JsonValue::from(now.clone()));
            }
        } else if payload.contains("status") {
            return Err(ServiceError::invalid("status must be a string"));
        }
        if !payload.contains("updated_at") {
            payload.insert("updated_at", JsonValue::from(now));
        }

        let updater = ShipmentUpdater::new(
            self.store.as_ref(),
            &self.known_missing,
            MATERIAL_SHIPMENTS.name,
            SHIPMENT_OPTIONAL_COLUMNS,
        );
        Ok(updater.update(&id, payload).await?)
    }

    pub async fn list(&self, filter: ShipmentFilter) -> Result<Vec<JsonValue>, ServiceError> {
        let mut query = ListQuery::new()
            .order_by(&self.policy.primary_key, true)
            .limit(filter.limit.unwrap_or(50).clamp(1, 100));
        if let Some(site) = filter.site_id {
            query = query.filter("site_id", JsonValue::from(site));
        }
        if let Some(status) = filter.status {
            query = query.filter("status", JsonValue::from(status));
        }
        Ok(self.store.list(MATERIAL_SHIPMENTS.name, &query).await?)
    }
}

fn check_status(status: &str) -> Result<(), ServiceError> {
    if SHIPMENT_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(ServiceError::invalid(format!(
            "unknown shipment status '{status}', expected one of {SHIPMENT_STATUSES:?}"
        )))
    }
}
