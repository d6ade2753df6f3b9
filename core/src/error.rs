// core/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;
use uuid::Uuid;

use crate::model::Version;

/// Failures raised by a record store backend.
///
/// Any `StorageError` surfacing from a transaction means the transaction was (or will be,
/// once dropped) rolled back: nothing it staged is visible to other readers.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Row {id} was written without being locked in the same transaction")]
  RowNotLocked { id: Uuid },

  #[error("Row {id} must be written at version {expected}, got {attempted}")]
  VersionSkew {
    id: Uuid,
    expected: Version,
    attempted: Version,
  },

  #[error("Row {id} is at the highest representable version ({current}) and cannot change again")]
  VersionExhausted { id: Uuid, current: Version },

  #[error("Storage backend failure. Source: {source}")]
  Backend {
    #[source]
    source: AnyhowError,
  },
}

impl From<AnyhowError> for StorageError {
  fn from(err: AnyhowError) -> Self {
    StorageError::Backend { source: err }
  }
}

/// Typed outcome of every product operation. The HTTP status (if any) is chosen by the caller.
#[derive(Debug, Error)]
pub enum ProductError {
  #[error("Product {id} not found")]
  NotFound { id: Uuid },

  #[error("Product {id} was modified concurrently: expected version {expected}, current version {actual}")]
  VersionConflict {
    id: Uuid,
    expected: Version,
    actual: Version,
  },

  #[error("Cannot set stock_total of product {id} to {requested_total}: {committed} units are currently committed")]
  StockBelowCommitted {
    id: Uuid,
    requested_total: i32,
    committed: i32,
  },

  #[error("Cannot reserve {requested} units of product {id}: only {available} available")]
  InsufficientStock { id: Uuid, requested: i32, available: i32 },

  #[error("Cannot release {requested} units of product {id}: only {committed} are committed")]
  ReleaseExceedsCommitted { id: Uuid, requested: i32, committed: i32 },

  #[error("Stored stock of product {id} is inconsistent (stock_total {stock_total}, stock_available {stock_available})")]
  InconsistentStock {
    id: Uuid,
    stock_total: i32,
    stock_available: i32,
  },

  #[error("Invalid input: {0}")]
  InvalidInput(String),

  #[error("Storage failure: {0}")]
  Storage(#[from] StorageError),
}

impl ProductError {
  /// True for failures the caller may resolve by re-reading the product and retrying.
  pub fn is_retryable(&self) -> bool {
    matches!(self, ProductError::VersionConflict { .. })
  }
}

pub type StoreResult<T, E = StorageError> = std::result::Result<T, E>;

pub type ProductResult<T, E = ProductError> = std::result::Result<T, E>;
