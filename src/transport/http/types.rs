use crate::app::daily_reports::{daily_report_policy, DailyReportService};
use crate::app::known_columns::KnownMissingColumns;
use crate::app::salary_snapshots::{salary_snapshot_policy, SalarySnapshotService};
use crate::app::shipments::{shipment_policy, ShipmentService};
use crate::infra::config::Config;
use crate::storage::{BlobStore, RecordStore};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub known_missing: KnownMissingColumns,
    pub daily_reports: Arc<DailyReportService>,
    pub shipments: Arc<ShipmentService>,
    pub salary_snapshots: Arc<SalarySnapshotService>,
}

impl AppState {
    /// Wires every service onto one store and one known-missing-columns set.
    pub fn new(store: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>, config: &Config) -> Self {
        let known_missing = KnownMissingColumns::new();
        let strict = config.strict_progress;
        let daily_reports = DailyReportService::new(
            store.clone(),
            known_missing.clone(),
            daily_report_policy(config.daily_report_max_attempts, strict),
        );
        let shipments = ShipmentService::new(store.clone(), known_missing.clone(), shipment_policy(strict));
        let salary_snapshots = SalarySnapshotService::new(
            store.clone(),
            blobs,
            known_missing.clone(),
            salary_snapshot_policy(config.snapshot_max_attempts, strict),
        );
        Self {
            store,
            known_missing,
            daily_reports: Arc::new(daily_reports),
            shipments: Arc::new(shipments),
            salary_snapshots: Arc::new(salary_snapshots),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Set when the response is a degraded fallback rather than real data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: JsonValue) -> Self {
        Self { success: true, data: Some(data), error: None, message: None, warning: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()), message: None, warning: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Arbitrary column/value object applied as a partial update.
#[derive(Deserialize, Debug, ToSchema)]
#[serde(transparent)]
pub struct RecordPatch(#[schema(value_type = Object)] pub JsonValue);

#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailyReportListParams {
    pub site_id: Option<String>,
    pub status: Option<String>,
    /// 1..=100, default 50.
    pub limit: Option<u32>,
}

#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShipmentListParams {
    pub site_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}
