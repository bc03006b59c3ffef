//! Salary snapshots: an immutable, digest-addressed document per issuance plus an
//! index row per (site, worker, period).
//!
//! Reissuing for the same period writes a new blob and moves the row to point at it.

use crate::app::error::ServiceError;
use crate::app::known_columns::KnownMissingColumns;
use crate::app::upsert::{AdaptiveUpsert, WriteIntent};
use crate::crypto::hashing::{canonical_json, snapshot_digest, snapshot_digest_bytes};
use crate::domain::model::SalarySnapshotInput;
use crate::domain::payload::{Payload, RecordId, WriteTarget};
use crate::domain::policy::WritePolicy;
use crate::storage::schema::SALARY_SNAPSHOTS;
use crate::storage::{BlobStore, Filter, RecordStore};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{info, warn};

pub fn salary_snapshot_policy(max_attempts: u32, require_progress: bool) -> WritePolicy {
    WritePolicy::new(SALARY_SNAPSHOTS.name)
        .essential(["site_id", "worker_id", "period", "blob_key"])
        .removable(["digest", "gross_total", "updated_at"])
        .conflict_key(["site_id", "worker_id", "period"])
        .max_attempts(max_attempts)
        .require_progress(require_progress)
}

pub fn blob_key(input: &SalarySnapshotInput, digest: &str) -> String {
    format!(
        "salary-snapshots/{}/{}/{}-{}.json",
        input.site_id, input.period, input.worker_id, digest
    )
}

/// The digest embedded in a key built by [`blob_key`].
pub fn digest_from_blob_key(key: &str) -> Option<&str> {
    let file = key.rsplit('/').next()?.strip_suffix(".json")?;
    let (_, digest) = file.rsplit_once('-')?;
    let well_formed = digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit());
    well_formed.then_some(digest)
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedSnapshot {
    pub record: JsonValue,
    pub digest: String,
    pub blob_key: String,
    pub reissued: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotView {
    pub record: JsonValue,
    pub snapshot: JsonValue,
    /// Digest the stored document was checked against.
    pub digest: String,
}

pub struct SalarySnapshotService {
    store: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    known_missing: KnownMissingColumns,
    policy: WritePolicy,
}

impl SalarySnapshotService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        known_missing: KnownMissingColumns,
        policy: WritePolicy,
    ) -> Self {
        Self { store, blobs, known_missing, policy }
    }

    pub async fn issue(&self, input: SalarySnapshotInput) -> Result<IssuedSnapshot, ServiceError> {
        input.validate().map_err(ServiceError::Invalid)?;

        let issued_at = Utc::now().to_rfc3339();
        let document = input.to_document(&issued_at);
        let digest = snapshot_digest(&document);
        let key = blob_key(&input, &digest);
        self.blobs.put(&key, canonical_json(&document)).await?;

        let mut payload = Payload::new();
        payload.insert("site_id", JsonValue::from(input.site_id.as_str()));
        payload.insert("worker_id", JsonValue::from(input.worker_id.as_str()));
        payload.insert("period", JsonValue::from(input.period.as_str()));
        payload.insert("blob_key", JsonValue::from(key.as_str()));
        payload.insert("digest", JsonValue::from(digest.as_str()));
        payload.insert("gross_total", JsonValue::from(input.gross_total()));
        payload.insert("updated_at", JsonValue::from(issued_at));

        let outcome = AdaptiveUpsert::new(self.store.as_ref(), &self.policy)
            .with_known_missing(&self.known_missing)
            .execute(WriteIntent::insert(payload))
            .await?;
        let reissued = matches!(outcome.target, WriteTarget::Update(_));
        info!(
            site_id = %input.site_id,
            worker_id = %input.worker_id,
            period = %input.period,
            digest = %digest,
            reissued,
            "salary snapshot issued"
        );
        Ok(IssuedSnapshot { record: outcome.row, digest, blob_key: key, reissued })
    }

    pub async fn fetch(&self, id: &RecordId) -> Result<SnapshotView, ServiceError> {
        let filter: Filter = vec![(self.policy.primary_key.clone(), JsonValue::from(id.as_str()))];
        let record = self
            .store
            .find_one(SALARY_SNAPSHOTS.name, &filter)
            .await?
            .ok_or(ServiceError::NotFound)?;
        let key = record
            .get("blob_key")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| ServiceError::Integrity(format!("snapshot {id} has no blob key")))?;
        let bytes = self
            .blobs
            .get(key)
            .await?
            .ok_or_else(|| ServiceError::Integrity(format!("snapshot blob {key} is missing")))?;
        let expected = expected_digest(&record, key)
            .ok_or_else(|| ServiceError::Integrity(format!("snapshot {id} has no consistent digest to verify against")))?;
        let actual = snapshot_digest_bytes(&bytes);
        if actual != expected {
            warn!(id = %id, expected = %expected, actual = %actual, "snapshot digest mismatch");
            return Err(ServiceError::Integrity(format!(
                "snapshot {id} does not match its recorded digest"
            )));
        }
        let snapshot: JsonValue = serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::Integrity(format!("snapshot blob {key} is not JSON: {e}")))?;
        Ok(SnapshotView { record, snapshot, digest: expected })
    }
}

/// The row's digest column, or the digest in the blob key when the column is absent.
/// Both must agree when both are present.
fn expected_digest(record: &JsonValue, key: &str) -> Option<String> {
    let from_key = digest_from_blob_key(key);
    match record.get("digest").and_then(JsonValue::as_str) {
        Some(column) if from_key.map_or(true, |k| k == column) => Some(column.to_string()),
        Some(_) => None,
        None => from_key.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DIGEST: &str = "5f3c1e0a9b7d2c4e6f8a0b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f708192a3b4";

    #[test]
    fn digest_is_read_back_from_the_blob_key() {
        let key = format!("salary-snapshots/site-1/2024-06/w-42-{DIGEST}.json");
        assert_eq!(digest_from_blob_key(&key), Some(DIGEST));
        assert_eq!(digest_from_blob_key("salary-snapshots/site-1/2024-06/w-42-abc.json"), None);
        assert_eq!(digest_from_blob_key("salary-snapshots/site-1/2024-06/w42.json"), None);
    }

    #[test]
    fn row_digest_must_agree_with_the_key() {
        let key = format!("salary-snapshots/s/2024-06/w-{DIGEST}.json");
        assert_eq!(expected_digest(&json!({}), &key).as_deref(), Some(DIGEST));
        assert_eq!(expected_digest(&json!({ "digest": DIGEST }), &key).as_deref(), Some(DIGEST));
        assert_eq!(expected_digest(&json!({ "digest": "0".repeat(64) }), &key), None);
        assert_eq!(expected_digest(&json!({}), "salary-snapshots/s/2024-06/w.json"), None);
    }
}
