use crate::app::shipment_updater::ShipmentUpdateError;
use crate::app::upsert::UpsertError;
use crate::domain::payload::PayloadError;
use crate::storage::{BlobError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Invalid(String),
    #[error("record not found")]
    NotFound,
    #[error("integrity check failed: {0}")]
    Integrity(String),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Upsert(#[from] UpsertError),
    #[error(transparent)]
    ShipmentUpdate(#[from] ShipmentUpdateError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Blob(#[from] BlobError),
}

impl ServiceError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ServiceError::Invalid(msg.into())
    }

    /// The underlying store error, looking through the write-path wrappers.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ServiceError::Store(e) => Some(e),
            ServiceError::Upsert(e) => e.store_error(),
            ServiceError::ShipmentUpdate(ShipmentUpdateError::Store(e)) => Some(e),
            _ => None,
        }
    }
}
