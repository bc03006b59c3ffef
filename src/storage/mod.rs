//! Record and blob storage seams.

pub mod blob;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;

pub use blob::{BlobError, BlobStore, FsBlobStore, MemoryBlobStore};
pub use error::{classify_message, StoreError};
pub use memory::InMemoryRecordStore;
pub use postgres::PgRecordStore;

use crate::domain::payload::{Payload, RecordId};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Equality filter: every `(column, value)` pair must match.
pub type Filter = Vec<(String, JsonValue)>;

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filters: Filter,
    /// `(column, descending)`
    pub order_by: Option<(String, bool)>,
    pub limit: Option<u32>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: impl Into<String>, value: JsonValue) -> Self {
        self.filters.push((column.into(), value));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, desc: bool) -> Self {
        self.order_by = Some((column.into(), desc));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Query-builder style access to application tables.
///
/// Rows are returned as JSON objects exactly as persisted, including server-assigned
/// fields (generated ids, default timestamps).
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, table: &str, payload: &Payload) -> Result<JsonValue, StoreError>;

    async fn update(
        &self,
        table: &str,
        id: &RecordId,
        payload: &Payload,
    ) -> Result<JsonValue, StoreError>;

    async fn find_one(&self, table: &str, filter: &Filter) -> Result<Option<JsonValue>, StoreError>;

    async fn list(&self, table: &str, query: &ListQuery) -> Result<Vec<JsonValue>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

pub fn validate_ident(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn checked_ident(ident: &str) -> Result<&str, StoreError> {
    if validate_ident(ident) {
        Ok(ident)
    } else {
        Err(StoreError::InvalidIdentifier(ident.to_string()))
    }
}
