//! Typed failures returned by record stores.
//!
//! Adapters decide the classification themselves (SQLSTATE codes, driver metadata);
//! callers never parse human-readable driver text. [`classify_message`] exists for
//! backends that only hand back a message.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("column '{column}' does not exist")]
    MissingColumn { column: String },
    #[error("null value in column '{column}' violates not-null constraint")]
    NotNull { column: String },
    #[error("duplicate key violates unique constraint ({constraint:?})")]
    UniqueConflict { constraint: Option<String> },
    #[error("schema cache is stale")]
    StaleSchemaCache,
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("record not found")]
    NotFound,
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Other(String),
}

static UNDEFINED_COLUMN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"column "?([A-Za-z_][A-Za-z0-9_.]*)"?(?: of relation "[^"]+")? does not exist"#)
        .expect("static regex")
});
static SCHEMA_CACHE_COLUMN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Could not find the '([^']+)' column of '[^']+' in the schema cache")
        .expect("static regex")
});
static NOT_NULL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"null value in column "([^"]+)""#).expect("static regex")
});
static UNIQUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"duplicate key value violates unique constraint "([^"]+)""#)
        .expect("static regex")
});

/// Classifies a raw driver/REST error message.
pub fn classify_message(message: &str) -> StoreError {
    if let Some(c) = SCHEMA_CACHE_COLUMN.captures(message) {
        return StoreError::MissingColumn { column: c[1].to_string() };
    }
    if let Some(c) = UNDEFINED_COLUMN.captures(message) {
        // Postgres may qualify the name (`t.col`); keep the column part.
        let raw = &c[1];
        let column = raw.rsplit('.').next().unwrap_or(raw);
        return StoreError::MissingColumn { column: column.to_string() };
    }
    if let Some(c) = NOT_NULL.captures(message) {
        return StoreError::NotNull { column: c[1].to_string() };
    }
    if let Some(c) = UNIQUE.captures(message) {
        return StoreError::UniqueConflict { constraint: Some(c[1].to_string()) };
    }
    let lower = message.to_lowercase();
    if lower.contains("schema cache") || lower.contains("cached plan must not change result type") {
        return StoreError::StaleSchemaCache;
    }
    if lower.contains("permission denied") {
        return StoreError::PermissionDenied(message.to_string());
    }
    StoreError::Other(message.to_string())
}
