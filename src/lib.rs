pub mod app;
pub mod crypto;
pub mod domain;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::{AdaptiveUpsert, KnownMissingColumns, ServiceError, UpsertError, UpsertOutcome, WriteIntent};
pub use domain::payload::{Payload, RecordId, WriteTarget};
pub use domain::policy::{DefaultRule, WritePolicy};
pub use infra::config::{Config, StoreBackend};
pub use storage::{InMemoryRecordStore, PgRecordStore, RecordStore, StoreError};
