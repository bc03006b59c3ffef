//! Write payloads and targets.
//!
//! A [`Payload`] is the field-name → value mapping submitted for one database write.
//! It is built per request and mutated between attempts by the adaptive write path
//! (fields dropped or defaulted), then discarded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, JsonValue>);

impl Payload {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_value(value: JsonValue) -> Result<Self, PayloadError> {
        match value {
            JsonValue::Object(map) => Ok(Self(map)),
            other => Err(PayloadError::NotAnObject(json_kind(&other))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.0.get(field)
    }

    /// Sets `field`, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: JsonValue) -> Option<JsonValue> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<JsonValue> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.0)
    }
}

impl From<Map<String, JsonValue>> for Payload {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

/// Textual primary key of a persisted row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Accepts string and integer primary keys as returned in a row.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        if let Some(s) = value.as_str() {
            return Some(Self(s.to_string()));
        }
        if let Some(i) = value.as_i64() {
            return Some(Self(i.to_string()));
        }
        if let Some(u) = value.as_u64() {
            return Some(Self(u.to_string()));
        }
        None
    }

    /// Reads the primary key field out of a returned row.
    pub fn from_row(row: &JsonValue, pk_field: &str) -> Option<Self> {
        row.get(pk_field).and_then(Self::from_json)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    Insert,
    Update(RecordId),
}

impl WriteTarget {
    pub fn is_insert(&self) -> bool {
        matches!(self, WriteTarget::Insert)
    }
}

pub(crate) fn json_kind(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Renders a scalar the way Postgres prints it through `::text`.
pub(crate) fn json_scalar_text(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
