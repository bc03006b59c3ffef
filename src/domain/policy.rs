//! Per-table rules for healing a failed write.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Value supplied when the database rejects a null/omitted column.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultRule {
    /// Human-readable placeholder, e.g. an author name.
    Text(String),
    EmptyString,
    Zero,
    Json(JsonValue),
    /// The status the request asked for, or `fallback` when it asked for none.
    Status { fallback: String },
}

impl DefaultRule {
    pub fn resolve(&self, desired_status: Option<&str>) -> JsonValue {
        match self {
            DefaultRule::Text(s) => JsonValue::from(s.as_str()),
            DefaultRule::EmptyString => JsonValue::from(""),
            DefaultRule::Zero => JsonValue::from(0),
            DefaultRule::Json(v) => v.clone(),
            DefaultRule::Status { fallback } => {
                JsonValue::from(desired_status.unwrap_or(fallback.as_str()))
            }
        }
    }
}

/// How the adaptive write path may reshape a payload for one table.
#[derive(Debug, Clone)]
pub struct WritePolicy {
    pub table: String,
    pub primary_key: String,
    /// Identifying columns; a failure naming one of these is never healed.
    pub essential: Vec<String>,
    /// Optional columns that may be dropped when the live schema lacks them.
    pub removable: Vec<String>,
    /// Optional JSON-bearing columns dropped when the schema cache is stale.
    pub stale_cache_columns: Vec<String>,
    pub defaults: BTreeMap<String, DefaultRule>,
    /// Columns identifying "the same record" for unique-violation redirects.
    pub conflict_key: Vec<String>,
    pub max_attempts: u32,
    /// Abort as soon as a heal leaves the payload and target unchanged instead of
    /// spending the remaining attempts.
    pub require_progress: bool,
}

impl WritePolicy {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: "id".to_string(),
            essential: Vec::new(),
            removable: Vec::new(),
            stale_cache_columns: Vec::new(),
            defaults: BTreeMap::new(),
            conflict_key: Vec::new(),
            max_attempts: 6,
            require_progress: false,
        }
    }

    pub fn primary_key(mut self, pk: impl Into<String>) -> Self {
        self.primary_key = pk.into();
        self
    }

    pub fn essential<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.essential.extend(cols.into_iter().map(Into::into));
        self
    }

    pub fn removable<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.removable.extend(cols.into_iter().map(Into::into));
        self
    }

    pub fn stale_cache_columns<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stale_cache_columns.extend(cols.into_iter().map(Into::into));
        self
    }

    pub fn default_for(mut self, column: impl Into<String>, rule: DefaultRule) -> Self {
        self.defaults.insert(column.into(), rule);
        self
    }

    pub fn conflict_key<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflict_key = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn require_progress(mut self, on: bool) -> Self {
        self.require_progress = on;
        self
    }

    pub fn is_essential(&self, column: &str) -> bool {
        self.essential.iter().any(|c| c == column)
    }

    pub fn is_removable(&self, column: &str) -> bool {
        self.removable.iter().any(|c| c == column)
    }

    pub fn default_rule(&self, column: &str) -> Option<&DefaultRule> {
        self.defaults.get(column)
    }
}
