//! Adaptive create-or-update against a schema that may have drifted.
//!
//! Each attempt writes the current payload. A failure is healed according to the
//! table's [`WritePolicy`] (drop a column the schema lacks, default a required value,
//! redirect a duplicate insert to an update, drop cache-sensitive JSON columns) and the
//! write is retried, up to `max_attempts`. Anything that cannot be healed ends the loop
//! immediately.

use crate::app::known_columns::KnownMissingColumns;
use crate::domain::payload::{Payload, RecordId, WriteTarget};
use crate::domain::policy::WritePolicy;
use crate::storage::{Filter, RecordStore, StoreError};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lookups made when resolving a unique violation before giving up.
const CONFLICT_LOOKUPS: usize = 2;

#[derive(Debug, Clone)]
pub struct WriteIntent {
    pub target: WriteTarget,
    pub payload: Payload,
    /// Status the caller wants the record to end up in; feeds status defaults.
    pub desired_status: Option<String>,
}

impl WriteIntent {
    pub fn insert(payload: Payload) -> Self {
        Self { target: WriteTarget::Insert, payload, desired_status: None }
    }

    pub fn update(id: RecordId, payload: Payload) -> Self {
        Self { target: WriteTarget::Update(id), payload, desired_status: None }
    }

    pub fn with_desired_status(mut self, status: Option<String>) -> Self {
        self.desired_status = status;
        self
    }
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    /// The row as returned by the store.
    pub row: JsonValue,
    pub attempts: u32,
    /// Final target; `Update` when a duplicate insert was redirected.
    pub target: WriteTarget,
    pub dropped: Vec<String>,
    pub defaulted: Vec<String>,
}

#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("essential column '{column}' rejected by the database: {source}")]
    EssentialColumn { column: String, source: StoreError },
    #[error("column '{column}' is required and has no default")]
    NoDefault { column: String },
    #[error("duplicate record but the conflicting row could not be located")]
    ConflictUnresolved,
    #[error("attempt {attempt} made no progress: {last}")]
    Stalled { attempt: u32, last: StoreError },
    #[error("write failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: StoreError },
    #[error(transparent)]
    Store(StoreError),
}

impl UpsertError {
    /// The store error at the root of this failure, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            UpsertError::EssentialColumn { source, .. } => Some(source),
            UpsertError::Stalled { last, .. } | UpsertError::Exhausted { last, .. } => Some(last),
            UpsertError::Store(e) => Some(e),
            UpsertError::NoDefault { .. } | UpsertError::ConflictUnresolved => None,
        }
    }
}

pub struct AdaptiveUpsert<'a> {
    store: &'a dyn RecordStore,
    policy: &'a WritePolicy,
    known_missing: Option<&'a KnownMissingColumns>,
}

struct AttemptState {
    target: WriteTarget,
    payload: Payload,
    dropped: Vec<String>,
    defaulted: Vec<String>,
}

impl<'a> AdaptiveUpsert<'a> {
    pub fn new(store: &'a dyn RecordStore, policy: &'a WritePolicy) -> Self {
        Self { store, policy, known_missing: None }
    }

    /// Shares discovered missing columns across calls; known ones are stripped before
    /// the first attempt.
    pub fn with_known_missing(mut self, known: &'a KnownMissingColumns) -> Self {
        self.known_missing = Some(known);
        self
    }

    pub async fn execute(&self, intent: WriteIntent) -> Result<UpsertOutcome, UpsertError> {
        let table = self.policy.table.as_str();
        let desired_status = intent.desired_status.as_deref();
        let mut state = AttemptState {
            target: intent.target,
            payload: intent.payload,
            dropped: Vec::new(),
            defaulted: Vec::new(),
        };

        if let Some(known) = self.known_missing {
            let stripped = known.strip(table, &mut state.payload, &self.policy.essential).await;
            if !stripped.is_empty() {
                debug!(table, columns = ?stripped, "stripped known-missing columns");
                state.dropped.extend(stripped);
            }
        }

        let mut last_error: Option<StoreError> = None;
        for attempt in 1..=self.policy.max_attempts {
            let result = match &state.target {
                WriteTarget::Insert => self.store.insert(table, &state.payload).await,
                WriteTarget::Update(id) => self.store.update(table, id, &state.payload).await,
            };
            let err = match result {
                Ok(row) => {
                    if attempt > 1 {
                        info!(
                            table,
                            attempt,
                            dropped = ?state.dropped,
                            defaulted = ?state.defaulted,
                            "write succeeded after healing"
                        );
                    }
                    return Ok(UpsertOutcome {
                        row,
                        attempts: attempt,
                        target: state.target,
                        dropped: state.dropped,
                        defaulted: state.defaulted,
                    });
                }
                Err(e) => e,
            };

            debug!(table, attempt, error = %err, "write attempt failed");
            let progressed = self.heal(&mut state, &err, desired_status).await?;
            if !progressed {
                if self.policy.require_progress {
                    warn!(table, attempt, error = %err, "heal made no progress, aborting");
                    return Err(UpsertError::Stalled { attempt, last: err });
                }
                warn!(table, attempt, error = %err, "retrying with an unchanged payload");
            }
            last_error = Some(err);
        }

        let last = last_error.unwrap_or_else(|| StoreError::Other("no attempt was made".to_string()));
        warn!(table, attempts = self.policy.max_attempts, error = %last, "attempt ceiling reached");
        Err(UpsertError::Exhausted { attempts: self.policy.max_attempts, last })
    }

    /// Reshapes the attempt after `err`. `Ok(true)` when the payload or target changed,
    /// `Ok(false)` when the same write would be repeated, `Err` when the failure is fatal.
    async fn heal(
        &self,
        state: &mut AttemptState,
        err: &StoreError,
        desired_status: Option<&str>,
    ) -> Result<bool, UpsertError> {
        let table = self.policy.table.as_str();
        match err {
            StoreError::MissingColumn { column } => {
                if self.policy.is_essential(column) {
                    return Err(UpsertError::EssentialColumn {
                        column: column.clone(),
                        source: err.clone(),
                    });
                }
                if !self.policy.is_removable(column) && !state.payload.contains(column) {
                    return Err(UpsertError::Store(err.clone()));
                }
                if let Some(known) = self.known_missing {
                    if known.insert(table, column).await {
                        info!(table, column = %column, "recorded missing column");
                    }
                }
                let removed = state.payload.remove(column).is_some();
                if removed {
                    state.dropped.push(column.clone());
                }
                Ok(removed)
            }
            StoreError::NotNull { column } => {
                if self.policy.is_essential(column) {
                    return Err(UpsertError::EssentialColumn {
                        column: column.clone(),
                        source: err.clone(),
                    });
                }
                let Some(rule) = self.policy.default_rule(column) else {
                    return Err(UpsertError::NoDefault { column: column.clone() });
                };
                let value = rule.resolve(desired_status);
                let changed = state.payload.get(column) != Some(&value);
                state.payload.insert(column.clone(), value);
                if changed {
                    state.defaulted.push(column.clone());
                }
                Ok(changed)
            }
            StoreError::UniqueConflict { .. } => {
                if !state.target.is_insert() {
                    return Err(UpsertError::Store(err.clone()));
                }
                let id = self.locate_conflict(&state.payload).await?;
                info!(table, id = %id, "duplicate insert redirected to update");
                state.target = WriteTarget::Update(id);
                Ok(true)
            }
            StoreError::StaleSchemaCache => {
                let mut removed_any = false;
                for column in &self.policy.stale_cache_columns {
                    if state.payload.remove(column).is_some() {
                        state.dropped.push(column.clone());
                        removed_any = true;
                    }
                }
                Ok(removed_any)
            }
            StoreError::PermissionDenied(_)
            | StoreError::NotFound
            | StoreError::InvalidIdentifier(_)
            | StoreError::Unavailable(_)
            | StoreError::Other(_) => Err(UpsertError::Store(err.clone())),
        }
    }

    async fn locate_conflict(&self, payload: &Payload) -> Result<RecordId, UpsertError> {
        let table = self.policy.table.as_str();
        let mut filter: Filter = Vec::with_capacity(self.policy.conflict_key.len());
        for column in &self.policy.conflict_key {
            match payload.get(column) {
                Some(v) if !v.is_null() => filter.push((column.clone(), v.clone())),
                _ => return Err(UpsertError::ConflictUnresolved),
            }
        }
        if filter.is_empty() {
            return Err(UpsertError::ConflictUnresolved);
        }

        for lookup in 1..=CONFLICT_LOOKUPS {
            let found = self.store.find_one(table, &filter).await.map_err(UpsertError::Store)?;
            if let Some(id) = found
                .as_ref()
                .and_then(|row| RecordId::from_row(row, &self.policy.primary_key))
            {
                return Ok(id);
            }
            debug!(table, lookup, "conflicting row not visible yet");
        }
        Err(UpsertError::ConflictUnresolved)
    }
}
