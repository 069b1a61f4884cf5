//! Error types for the ledger service

use thiserror::Error;
use voltlog_api::ValidationError;
use voltlog_store::StoreError;
use voltlog_util::{BatteryId, CategoryId};

/// Errors returned by [`crate::BatteryService`]
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Battery not found: {0}")]
    NotFound(BatteryId),

    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for LedgerError {
    fn from(e: tokio::task::JoinError) -> Self {
        LedgerError::Task(e.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
