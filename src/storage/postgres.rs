//! Postgres-backed record store.
//!
//! Column values are not cast client-side: the payload is bound once as JSONB and
//! expanded with `jsonb_populate_record`, so the live table decides the types. A
//! payload key the table lacks therefore surfaces as SQLSTATE 42703, which is mapped
//! to [`StoreError::MissingColumn`] here rather than by callers.

use crate::domain::payload::{json_scalar_text, Payload, RecordId};
use crate::storage::error::{classify_message, StoreError};
use crate::storage::schema::{create_table_sql, primary_key_of, BASELINE_TABLES};
use crate::storage::{checked_ident, Filter, ListQuery, RecordStore};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgDatabaseError, PgPoolOptions};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Creates any missing baseline tables. Existing tables are left as they are,
    /// drift included.
    pub async fn bootstrap_schema(&self) -> anyhow::Result<()> {
        for table in BASELINE_TABLES {
            sqlx::query(&create_table_sql(table)).execute(&self.pool).await?;
            info!(table = table.name, "baseline table ensured");
        }
        Ok(())
    }
}

fn quote(ident: &str) -> Result<String, StoreError> {
    Ok(format!("\"{}\"", checked_ident(ident)?))
}

fn quoted_columns(payload: &Payload) -> Result<Vec<String>, StoreError> {
    payload.keys().map(quote).collect()
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) -> Result<(), StoreError> {
    for (idx, (column, value)) in filter.iter().enumerate() {
        qb.push(if idx == 0 { " WHERE " } else { " AND " });
        qb.push(quote(column)?);
        match json_scalar_text(value) {
            Some(text) => {
                qb.push("::text = ").push_bind(text);
            }
            None => {
                qb.push(" IS NULL");
            }
        }
    }
    Ok(())
}

/// `UPDATE` of the payload columns on the row whose primary key matches `$2`.
fn update_sql(table: &str, payload: &Payload) -> Result<String, StoreError> {
    let t = quote(table)?;
    let pk = quote(primary_key_of(table))?;
    let cols = quoted_columns(payload)?;
    let targets = if cols.len() == 1 {
        cols[0].clone()
    } else {
        format!("({})", cols.join(", "))
    };
    Ok(format!(
        "UPDATE {t} SET {targets} = (SELECT {cols} FROM jsonb_populate_record(NULL::{t}, $1::jsonb)) \
         WHERE {pk}::text = $2 RETURNING row_to_json({t}.*) AS record",
        cols = cols.join(", ")
    ))
}

/// Maps a driver error onto the typed taxonomy using SQLSTATE first and message
/// text only to recover the column name.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string());
            let message = db_err.message().to_string();
            let pg_column = db_err
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.column())
                .map(str::to_string);
            match code.as_deref() {
                Some("42703") | Some("PGRST204") => match classify_message(&message) {
                    missing @ StoreError::MissingColumn { .. } => missing,
                    _ => StoreError::Other(message),
                },
                Some("23502") => match pg_column {
                    Some(column) => StoreError::NotNull { column },
                    None => match classify_message(&message) {
                        not_null @ StoreError::NotNull { .. } => not_null,
                        _ => StoreError::Other(message),
                    },
                },
                Some("23505") => StoreError::UniqueConflict {
                    constraint: db_err.constraint().map(str::to_string),
                },
                Some("0A000") if message.contains("cached plan") => StoreError::StaleSchemaCache,
                Some("42501") => StoreError::PermissionDenied(message),
                _ => classify_message(&message),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Other(err.to_string()),
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert(&self, table: &str, payload: &Payload) -> Result<JsonValue, StoreError> {
        let t = quote(table)?;
        let sql = if payload.is_empty() {
            format!("INSERT INTO {t} DEFAULT VALUES RETURNING row_to_json({t}.*) AS record")
        } else {
            let cols = quoted_columns(payload)?.join(", ");
            format!(
                "INSERT INTO {t} ({cols}) SELECT {cols} FROM jsonb_populate_record(NULL::{t}, $1::jsonb) \
                 RETURNING row_to_json({t}.*) AS record"
            )
        };
        debug!(table, columns = payload.len(), "insert");

        let mut query = sqlx::query(&sql);
        if !payload.is_empty() {
            query = query.bind(payload.clone().into_value());
        }
        let row = query.fetch_one(&self.pool).await.map_err(map_sqlx_error)?;
        row.try_get::<JsonValue, _>("record").map_err(map_sqlx_error)
    }

    async fn update(
        &self,
        table: &str,
        id: &RecordId,
        payload: &Payload,
    ) -> Result<JsonValue, StoreError> {
        if payload.is_empty() {
            return Err(StoreError::Other("update payload has no columns".to_string()));
        }
        let sql = update_sql(table, payload)?;
        debug!(table, id = %id, columns = payload.len(), "update");

        let row = sqlx::query(&sql)
            .bind(payload.clone().into_value())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(StoreError::NotFound)?;
        row.try_get::<JsonValue, _>("record").map_err(map_sqlx_error)
    }

    async fn find_one(&self, table: &str, filter: &Filter) -> Result<Option<JsonValue>, StoreError> {
        let t = quote(table)?;
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("");
        qb.push(format!("SELECT row_to_json({t}.*) AS record FROM {t}"));
        push_filters(&mut qb, filter)?;
        qb.push(" LIMIT 1");

        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        match row {
            Some(r) => Ok(Some(r.try_get::<JsonValue, _>("record").map_err(map_sqlx_error)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, table: &str, query: &ListQuery) -> Result<Vec<JsonValue>, StoreError> {
        let t = quote(table)?;
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("");
        qb.push(format!("SELECT row_to_json({t}.*) AS record FROM {t}"));
        push_filters(&mut qb, &query.filters)?;
        if let Some((column, desc)) = &query.order_by {
            qb.push(" ORDER BY ")
                .push(quote(column)?)
                .push(if *desc { " DESC" } else { " ASC" });
        }
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = qb.build().fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        rows.into_iter()
            .map(|r| r.try_get::<JsonValue, _>("record").map_err(map_sqlx_error))
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}
