//! In-process record store.
//!
//! Mirrors the Postgres adapter's contract over a declared schema and can simulate a
//! drifted deployment: columns can be dropped from a table, failures can be queued for
//! the next writes, and reads can be made to fail.

use crate::domain::payload::{json_scalar_text, Payload, RecordId};
use crate::storage::error::StoreError;
use crate::storage::schema::{ColumnDefault, ColumnType, TableDef, BASELINE_TABLES};
use crate::storage::{checked_ident, Filter, ListQuery, RecordStore};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct MemColumn {
    serial: bool,
    not_null: bool,
    default: Option<ColumnDefault>,
}

#[derive(Debug, Default)]
struct MemTable {
    primary_key: String,
    columns: BTreeMap<String, MemColumn>,
    unique: Vec<Vec<String>>,
    rows: Vec<Map<String, JsonValue>>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct MemState {
    tables: HashMap<String, MemTable>,
    queued_failures: HashMap<String, VecDeque<StoreError>>,
    sticky_failures: HashMap<String, StoreError>,
    fail_reads: Option<StoreError>,
    write_calls: HashMap<String, u32>,
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: Mutex<MemState>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with every baseline table.
    pub fn baseline() -> Self {
        BASELINE_TABLES.iter().fold(Self::new(), |store, def| store.with_table(def))
    }

    pub fn with_table(mut self, def: &TableDef) -> Self {
        let columns = def
            .columns
            .iter()
            .map(|c| {
                (
                    c.name.to_string(),
                    MemColumn {
                        serial: c.col_type == ColumnType::BigSerial,
                        not_null: c.not_null,
                        default: c.default,
                    },
                )
            })
            .collect();
        let table = MemTable {
            primary_key: def.primary_key.to_string(),
            columns,
            unique: def.unique.iter().map(|k| k.iter().map(|c| c.to_string()).collect()).collect(),
            rows: Vec::new(),
            next_id: 1,
        };
        self.state.get_mut().tables.insert(def.name.to_string(), table);
        self
    }

    /// Simulates a deployment whose table lacks `column`.
    pub fn without_column(mut self, table: &str, column: &str) -> Self {
        if let Some(t) = self.state.get_mut().tables.get_mut(table) {
            t.columns.remove(column);
            for key in &mut t.unique {
                key.retain(|c| c != column);
            }
            t.unique.retain(|k| !k.is_empty());
        }
        self
    }

    /// Simulates a deployment where `column` is required with no default.
    pub fn require_column(mut self, table: &str, column: &str) -> Self {
        if let Some(c) = self
            .state
            .get_mut()
            .tables
            .get_mut(table)
            .and_then(|t| t.columns.get_mut(column))
        {
            c.not_null = true;
            c.default = None;
        }
        self
    }

    /// The next write against `table` fails with `err` (queued, consumed in order).
    pub async fn fail_next_write(&self, table: &str, err: StoreError) {
        let mut state = self.state.lock().await;
        state.queued_failures.entry(table.to_string()).or_default().push_back(err);
    }

    /// Every write against `table` fails with `err` until cleared.
    pub async fn fail_all_writes(&self, table: &str, err: StoreError) {
        let mut state = self.state.lock().await;
        state.sticky_failures.insert(table.to_string(), err);
    }

    pub async fn clear_failures(&self) {
        let mut state = self.state.lock().await;
        state.queued_failures.clear();
        state.sticky_failures.clear();
        state.fail_reads = None;
    }

    /// Every `find_one`/`list` fails with `err` until cleared.
    pub async fn fail_reads(&self, err: StoreError) {
        self.state.lock().await.fail_reads = Some(err);
    }

    /// Number of insert/update calls made against `table`.
    pub async fn write_calls(&self, table: &str) -> u32 {
        self.state.lock().await.write_calls.get(table).copied().unwrap_or(0)
    }

    pub async fn rows(&self, table: &str) -> Vec<JsonValue> {
        let state = self.state.lock().await;
        state
            .tables
            .get(table)
            .map(|t| t.rows.iter().cloned().map(JsonValue::Object).collect())
            .unwrap_or_default()
    }

    /// Writes a row bypassing every check, as if another client had inserted it.
    pub async fn seed_row(&self, table: &str, row: JsonValue) -> Result<JsonValue, StoreError> {
        let mut state = self.state.lock().await;
        let t = state.tables.get_mut(table).ok_or(StoreError::NotFound)?;
        let mut obj = match row {
            JsonValue::Object(o) => o,
            _ => return Err(StoreError::Other("seed row must be an object".to_string())),
        };
        if !obj.contains_key(&t.primary_key) {
            obj.insert(t.primary_key.clone(), JsonValue::from(t.next_id));
            t.next_id += 1;
        }
        t.rows.push(obj.clone());
        Ok(JsonValue::Object(obj))
    }

    fn take_injected(state: &mut MemState, table: &str) -> Option<StoreError> {
        *state.write_calls.entry(table.to_string()).or_insert(0) += 1;
        if let Some(err) = state.sticky_failures.get(table) {
            return Some(err.clone());
        }
        state.queued_failures.get_mut(table).and_then(VecDeque::pop_front)
    }
}

fn now_json() -> JsonValue {
    JsonValue::from(Utc::now().to_rfc3339())
}

fn check_columns(table: &MemTable, payload: &Payload) -> Result<(), StoreError> {
    for key in payload.keys() {
        checked_ident(key)?;
        if !table.columns.contains_key(key) {
            return Err(StoreError::MissingColumn { column: key.to_string() });
        }
    }
    Ok(())
}

fn check_not_null(table: &MemTable, row: &Map<String, JsonValue>) -> Result<(), StoreError> {
    for (name, col) in &table.columns {
        if col.not_null && row.get(name).map_or(true, JsonValue::is_null) {
            return Err(StoreError::NotNull { column: name.clone() });
        }
    }
    Ok(())
}

fn check_unique(
    table: &MemTable,
    row: &Map<String, JsonValue>,
    skip_index: Option<usize>,
) -> Result<(), StoreError> {
    for key in &table.unique {
        let values: Option<Vec<String>> =
            key.iter().map(|c| row.get(c).and_then(json_scalar_text)).collect();
        // NULLs never collide.
        let Some(values) = values else { continue };
        let clash = table.rows.iter().enumerate().any(|(idx, existing)| {
            Some(idx) != skip_index
                && key
                    .iter()
                    .zip(&values)
                    .all(|(c, v)| existing.get(c).and_then(json_scalar_text).as_deref() == Some(v.as_str()))
        });
        if clash {
            return Err(StoreError::UniqueConflict { constraint: Some(key.join("_")) });
        }
    }
    Ok(())
}

fn matches_filter(row: &Map<String, JsonValue>, filter: &Filter) -> bool {
    filter.iter().all(|(column, value)| {
        let have = row.get(column).and_then(json_scalar_text);
        have == json_scalar_text(value)
    })
}

fn compare_json(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    match (a, b) {
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (a, b) => a
            .and_then(json_scalar_text)
            .cmp(&b.and_then(json_scalar_text)),
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, table: &str, payload: &Payload) -> Result<JsonValue, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(err) = Self::take_injected(&mut state, table) {
            return Err(err);
        }
        let t = state
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::Other(format!("relation \"{table}\" does not exist")))?;
        check_columns(t, payload)?;

        let mut row = payload.as_map().clone();
        let mut assigned_serial = false;
        for (name, col) in &t.columns {
            if row.contains_key(name) {
                continue;
            }
            if col.serial {
                row.insert(name.clone(), JsonValue::from(t.next_id));
                assigned_serial = true;
            } else {
                match col.default {
                    Some(ColumnDefault::Now) => {
                        row.insert(name.clone(), now_json());
                    }
                    Some(ColumnDefault::Text(v)) => {
                        row.insert(name.clone(), JsonValue::from(v));
                    }
                    None => {}
                }
            }
        }
        check_not_null(t, &row)?;
        check_unique(t, &row, None)?;

        if assigned_serial {
            t.next_id += 1;
        }
        t.rows.push(row.clone());
        Ok(JsonValue::Object(row))
    }

    async fn update(
        &self,
        table: &str,
        id: &RecordId,
        payload: &Payload,
    ) -> Result<JsonValue, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(err) = Self::take_injected(&mut state, table) {
            return Err(err);
        }
        let t = state
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::Other(format!("relation \"{table}\" does not exist")))?;
        if payload.is_empty() {
            return Err(StoreError::Other("update payload has no columns".to_string()));
        }
        check_columns(t, payload)?;

        let pk = t.primary_key.clone();
        let idx = t
            .rows
            .iter()
            .position(|r| r.get(&pk).and_then(json_scalar_text).as_deref() == Some(id.as_str()))
            .ok_or(StoreError::NotFound)?;

        let mut row = t.rows[idx].clone();
        for (k, v) in payload.iter() {
            row.insert(k.to_string(), v.clone());
        }
        check_not_null(t, &row)?;
        check_unique(t, &row, Some(idx))?;

        t.rows[idx] = row.clone();
        Ok(JsonValue::Object(row))
    }

    async fn find_one(&self, table: &str, filter: &Filter) -> Result<Option<JsonValue>, StoreError> {
        let state = self.state.lock().await;
        if let Some(err) = &state.fail_reads {
            return Err(err.clone());
        }
        let Some(t) = state.tables.get(table) else {
            return Err(StoreError::Other(format!("relation \"{table}\" does not exist")));
        };
        Ok(t
            .rows
            .iter()
            .find(|r| matches_filter(r, filter))
            .cloned()
            .map(JsonValue::Object))
    }

    async fn list(&self, table: &str, query: &ListQuery) -> Result<Vec<JsonValue>, StoreError> {
        let state = self.state.lock().await;
        if let Some(err) = &state.fail_reads {
            return Err(err.clone());
        }
        let Some(t) = state.tables.get(table) else {
            return Err(StoreError::Other(format!("relation \"{table}\" does not exist")));
        };
        let mut rows: Vec<&Map<String, JsonValue>> =
            t.rows.iter().filter(|r| matches_filter(r, &query.filters)).collect();
        if let Some((column, desc)) = &query.order_by {
            checked_ident(column)?;
            rows.sort_by(|a, b| {
                let ord = compare_json(a.get(column), b.get(column));
                if *desc {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(rows
            .into_iter()
            .take(limit)
            .cloned()
            .map(JsonValue::Object)
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
