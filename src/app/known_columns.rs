//! Columns discovered to be absent from the live schema.
//!
//! Shared across requests so a missing column is discovered once per process rather
//! than once per request. Entries are only ever added.

use crate::domain::payload::Payload;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct KnownMissingColumns {
    inner: Arc<RwLock<HashSet<(String, String)>>>,
}

impl KnownMissingColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the column was not known before.
    pub async fn insert(&self, table: &str, column: &str) -> bool {
        self.inner
            .write()
            .await
            .insert((table.to_string(), column.to_string()))
    }

    pub async fn contains(&self, table: &str, column: &str) -> bool {
        self.inner
            .read()
            .await
            .contains(&(table.to_string(), column.to_string()))
    }

    pub async fn for_table(&self, table: &str) -> Vec<String> {
        let mut cols: Vec<String> = self
            .inner
            .read()
            .await
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, c)| c.clone())
            .collect();
        cols.sort();
        cols
    }

    /// Removes every known-missing column of `table` from `payload`, except those in
    /// `keep`. Returns the removed names.
    pub async fn strip(&self, table: &str, payload: &mut Payload, keep: &[String]) -> Vec<String> {
        let known = self.for_table(table).await;
        known
            .into_iter()
            .filter(|c| !keep.contains(c))
            .filter(|c| payload.remove(c).is_some())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
