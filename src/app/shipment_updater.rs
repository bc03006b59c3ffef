//! Shipment updates that shed optional columns the live schema lacks.
//!
//! Unlike [`crate::app::upsert::AdaptiveUpsert`] this loop only understands missing
//! columns. Each one discovered goes into the shared [`KnownMissingColumns`] set, so
//! later updates skip it up front. The loop is bounded by the number of optional
//! columns: every retry must have removed one of them.

use crate::app::known_columns::KnownMissingColumns;
use crate::domain::payload::{Payload, RecordId};
use crate::storage::{RecordStore, StoreError};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ShipmentUpdateError {
    #[error("no updatable fields remain after removing unsupported columns {stripped:?}")]
    NothingToUpdate { stripped: Vec<String> },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct ShipmentUpdater<'a> {
    store: &'a dyn RecordStore,
    known_missing: &'a KnownMissingColumns,
    table: &'a str,
    optional_columns: &'a [&'a str],
}

impl<'a> ShipmentUpdater<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        known_missing: &'a KnownMissingColumns,
        table: &'a str,
        optional_columns: &'a [&'a str],
    ) -> Self {
        Self { store, known_missing, table, optional_columns }
    }

    pub fn max_attempts(&self) -> usize {
        self.optional_columns.len() + 1
    }

    pub async fn update(
        &self,
        id: &RecordId,
        mut payload: Payload,
    ) -> Result<JsonValue, ShipmentUpdateError> {
        let mut stripped = self.known_missing.strip(self.table, &mut payload, &[]).await;

        for attempt in 1..=self.max_attempts() {
            if payload.is_empty() {
                return Err(ShipmentUpdateError::NothingToUpdate { stripped });
            }
            match self.store.update(self.table, id, &payload).await {
                Ok(row) => return Ok(row),
                Err(StoreError::MissingColumn { column })
                    if self.optional_columns.contains(&column.as_str())
                        && payload.contains(&column) =>
                {
                    debug!(table = self.table, attempt, column = %column, "dropping missing shipment column");
                    if self.known_missing.insert(self.table, &column).await {
                        info!(table = self.table, column = %column, "recorded missing column");
                    }
                    payload.remove(&column);
                    stripped.push(column);
                }
                Err(e) => return Err(e.into()),
            }
        }
        // Each retry removed a distinct optional column, so the last attempt either
        // returned or ran out of columns.
        Err(ShipmentUpdateError::NothingToUpdate { stripped })
    }
}
