//! Daily work reports: one per (site, work date), with material usage and photo rows
//! attached after the report itself is stored.

use crate::app::error::ServiceError;
use crate::app::known_columns::KnownMissingColumns;
use crate::app::post_commit::{PostCommitSummary, PostCommitTasks};
use crate::app::upsert::{AdaptiveUpsert, UpsertError, UpsertOutcome, WriteIntent};
use crate::domain::model::{parse_work_date, DailyReportInput, ReportStatus};
use crate::domain::payload::{Payload, RecordId, WriteTarget};
use crate::domain::policy::{DefaultRule, WritePolicy};
use crate::storage::schema::{DAILY_REPORTS, DAILY_REPORT_MATERIALS, DAILY_REPORT_PHOTOS};
use crate::storage::{Filter, ListQuery, RecordStore, StoreError};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 100;

pub fn daily_report_policy(max_attempts: u32, require_progress: bool) -> WritePolicy {
    WritePolicy::new(DAILY_REPORTS.name)
        .essential(["site_id", "work_date"])
        .removable([
            "weather",
            "headcount",
            "notes",
            "work_content",
            "location",
            "author_name",
            "submitted_at",
            "updated_at",
        ])
        .stale_cache_columns(["work_content", "location"])
        .default_for("author_name", DefaultRule::Text("Unassigned".to_string()))
        .default_for("status", DefaultRule::Status { fallback: ReportStatus::Draft.as_str().to_string() })
        .default_for("notes", DefaultRule::EmptyString)
        .default_for("headcount", DefaultRule::Zero)
        .default_for("weather", DefaultRule::Text("unknown".to_string()))
        .default_for("work_content", DefaultRule::Json(JsonValue::Object(Default::default())))
        .conflict_key(["site_id", "work_date"])
        .max_attempts(max_attempts)
        .require_progress(require_progress)
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub report: JsonValue,
    /// False when an existing report for the same site and date was updated.
    pub created: bool,
    pub attempts: u32,
    pub dropped_columns: Vec<String>,
    pub defaulted_columns: Vec<String>,
    pub attachments: PostCommitSummary,
}

#[derive(Debug, Clone, Default)]
pub struct DailyReportFilter {
    pub site_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

pub struct DailyReportService {
    store: Arc<dyn RecordStore>,
    known_missing: KnownMissingColumns,
    policy: WritePolicy,
}

impl DailyReportService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        known_missing: KnownMissingColumns,
        policy: WritePolicy,
    ) -> Self {
        Self { store, known_missing, policy }
    }

    pub async fn submit(&self, input: DailyReportInput) -> Result<SubmitOutcome, ServiceError> {
        input.validate().map_err(ServiceError::Invalid)?;

        let mut payload = input.to_payload();
        let now = Utc::now().to_rfc3339();
        if input.status == Some(ReportStatus::Submitted) {
            payload.insert("submitted_at", JsonValue::from(now.clone()));
        }

        let target = self.resolve_existing(&payload).await;
        if !target.is_insert() {
            payload.insert("updated_at", JsonValue::from(now));
        }
        let intent = WriteIntent {
            target,
            payload,
            desired_status: input.status.map(|s| s.as_str().to_string()),
        };

        let outcome = match self.write(intent.clone()).await {
            Err(e) if !intent.target.is_insert() && is_vanished_row(&e) => {
                warn!(
                    site_id = %input.site_id,
                    work_date = %input.work_date,
                    "existing report disappeared before the update, inserting instead"
                );
                let mut retry = intent;
                retry.target = WriteTarget::Insert;
                retry.payload.remove("updated_at");
                self.write(retry).await?
            }
            other => other?,
        };
        info!(
            site_id = %input.site_id,
            work_date = %input.work_date,
            attempts = outcome.attempts,
            created = outcome.target.is_insert(),
            "daily report stored"
        );

        let attachments = self.write_attachments(&outcome.row, &input).await;
        Ok(SubmitOutcome {
            created: outcome.target.is_insert(),
            attempts: outcome.attempts,
            dropped_columns: outcome.dropped,
            defaulted_columns: outcome.defaulted,
            report: outcome.row,
            attachments,
        })
    }

    /// Partial update of an existing report by id.
    pub async fn update(&self, id: RecordId, patch: JsonValue) -> Result<JsonValue, ServiceError> {
        let mut payload = Payload::from_value(patch)?;
        if payload.remove(&self.policy.primary_key).is_some() {
            debug!(id = %id, "ignoring primary key in report patch");
        }
        if payload.is_empty() {
            return Err(ServiceError::invalid("patch has no fields"));
        }
        if let Some(date) = payload.get("work_date") {
            let valid = date.as_str().and_then(parse_work_date).is_some();
            if !valid {
                return Err(ServiceError::invalid("work_date must be a YYYY-MM-DD date"));
            }
        }
        let desired_status = match payload.get("status").cloned() {
            None => None,
            Some(v) => {
                let status = v
                    .as_str()
                    .ok_or_else(|| ServiceError::invalid("status must be a string"))
                    .and_then(|s| ReportStatus::from_str(s).map_err(ServiceError::Invalid))?;
                if status == ReportStatus::Submitted && !payload.contains("submitted_at") {
                    payload.insert("submitted_at", JsonValue::from(Utc::now().to_rfc3339()));
                }
                payload.insert("status", JsonValue::from(status.as_str()));
                Some(status.as_str().to_string())
            }
        };
        if !payload.contains("updated_at") {
            payload.insert("updated_at", JsonValue::from(Utc::now().to_rfc3339()));
        }

        let intent = WriteIntent::update(id, payload).with_desired_status(desired_status);
        Ok(self.write(intent).await?.row)
    }

    pub async fn list(&self, filter: DailyReportFilter) -> Result<Vec<JsonValue>, ServiceError> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let mut query = ListQuery::new().order_by("work_date", true).limit(limit);
        if let Some(site) = filter.site_id {
            query = query.filter("site_id", JsonValue::from(site));
        }
        if let Some(status) = filter.status {
            query = query.filter("status", JsonValue::from(status));
        }
        Ok(self.store.list(DAILY_REPORTS.name, &query).await?)
    }

    async fn write(&self, intent: WriteIntent) -> Result<UpsertOutcome, UpsertError> {
        AdaptiveUpsert::new(self.store.as_ref(), &self.policy)
            .with_known_missing(&self.known_missing)
            .execute(intent)
            .await
    }

    /// Looks up a report for the same site and date. A failed lookup falls back to an
    /// insert; the unique-conflict redirect covers the case where one exists.
    async fn resolve_existing(&self, payload: &Payload) -> WriteTarget {
        let filter: Filter = self
            .policy
            .conflict_key
            .iter()
            .filter_map(|c| payload.get(c).map(|v| (c.clone(), v.clone())))
            .collect();
        match self.store.find_one(DAILY_REPORTS.name, &filter).await {
            Ok(Some(row)) => match RecordId::from_row(&row, &self.policy.primary_key) {
                Some(id) => WriteTarget::Update(id),
                None => WriteTarget::Insert,
            },
            Ok(None) => WriteTarget::Insert,
            Err(e) => {
                warn!(error = %e, "existing report lookup failed, attempting insert");
                WriteTarget::Insert
            }
        }
    }

    async fn write_attachments(&self, report: &JsonValue, input: &DailyReportInput) -> PostCommitSummary {
        let Some(report_id) = report.get(&self.policy.primary_key).cloned() else {
            if !input.materials.is_empty() || !input.photos.is_empty() {
                warn!("stored report has no id, skipping materials and photos");
            }
            return PostCommitSummary::default();
        };

        let mut tasks = PostCommitTasks::new();
        for (idx, material) in input.materials.iter().enumerate() {
            let mut row = Payload::new();
            row.insert("report_id", report_id.clone());
            row.insert("material_name", JsonValue::from(material.material_name.trim()));
            row.insert("quantity", JsonValue::from(material.quantity));
            if let Some(unit) = &material.unit {
                row.insert("unit", JsonValue::from(unit.as_str()));
            }
            let store = Arc::clone(&self.store);
            tasks.push(format!("material[{idx}]"), async move {
                store.insert(DAILY_REPORT_MATERIALS.name, &row).await.map(|_| ())
            });
        }
        for (idx, photo) in input.photos.iter().enumerate() {
            let mut row = Payload::new();
            row.insert("report_id", report_id.clone());
            row.insert("url", JsonValue::from(photo.url.trim()));
            if let Some(caption) = &photo.caption {
                row.insert("caption", JsonValue::from(caption.as_str()));
            }
            let store = Arc::clone(&self.store);
            tasks.push(format!("photo[{idx}]"), async move {
                store.insert(DAILY_REPORT_PHOTOS.name, &row).await.map(|_| ())
            });
        }
        tasks.run().await
    }
}

fn is_vanished_row(err: &UpsertError) -> bool {
    matches!(err.store_error(), Some(StoreError::NotFound))
}
