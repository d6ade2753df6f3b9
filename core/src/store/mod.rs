// core/src/store/mod.rs

//! The versioned record store.
//!
//! A `ProductStore` owns the persisted rows. Reads hand out snapshots; every mutation goes through
//! a `ProductTransaction`, which locks the rows it touches until it is committed or dropped.
//! Dropping a transaction without committing is a rollback: the store must discard everything it
//! staged. That is also what happens when the future driving a transaction is cancelled.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use crate::error::{StorageError, StoreResult};
use crate::model::{NewProduct, Product, ProductFilter, Version};

pub use memory::MemoryProductStore;
pub use postgres::PgProductStore;

/// Keyed storage of product rows with transactional read-modify-write support.
#[async_trait]
pub trait ProductStore: Send + Sync + 'static {
  /// Opens a transaction scope. Row locks taken inside it are held until commit or drop.
  async fn begin(&self) -> StoreResult<Box<dyn ProductTransaction>>;

  /// Committed snapshot of a row. Soft-deleted rows are only returned with `include_deleted`.
  async fn get(&self, id: Uuid, include_deleted: bool) -> StoreResult<Option<Product>>;

  /// Committed rows matching `filter`, ordered by name then id.
  async fn list(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>>;

  /// Persists a brand-new row: version 1, every unit available, not deleted.
  async fn insert(&self, new_product: &NewProduct) -> StoreResult<Product>;

  /// Soft-deletes an active row: stamps `deleted_at`, clears `is_active`, bumps the version.
  /// Returns `None` when there is no active row with this id.
  #[instrument(name = "ProductStore::soft_delete", skip(self), fields(product_id = %id))]
  async fn soft_delete(&self, id: Uuid) -> StoreResult<Option<Product>> {
    let mut txn = self.begin().await?;
    let Some(current) = txn.lock_for_update(id).await? else {
      event!(Level::DEBUG, "No active row to soft-delete.");
      return Ok(None);
    };
    let mut next = current.clone();
    next.deleted_at = Some(Utc::now());
    next.is_active = false;
    next.version = next_version(id, current.version)?;
    let written = txn.write(next).await?;
    txn.commit().await?;
    Ok(Some(written))
  }

  /// Restores a soft-deleted row: clears `deleted_at`, sets `is_active`, bumps the version.
  /// Returns `None` when there is no deleted row with this id.
  #[instrument(name = "ProductStore::restore", skip(self), fields(product_id = %id))]
  async fn restore(&self, id: Uuid) -> StoreResult<Option<Product>> {
    let mut txn = self.begin().await?;
    let Some(current) = txn.lock_deleted_for_update(id).await? else {
      event!(Level::DEBUG, "No deleted row to restore.");
      return Ok(None);
    };
    let mut next = current.clone();
    next.deleted_at = None;
    next.is_active = true;
    next.version = next_version(id, current.version)?;
    let written = txn.write(next).await?;
    txn.commit().await?;
    Ok(Some(written))
  }
}

/// A single atomic unit of work against a `ProductStore`.
#[async_trait]
pub trait ProductTransaction: Send {
  /// Locks an active (not soft-deleted) row for the rest of the transaction and returns its
  /// current committed state. Concurrent lockers of the same id wait here.
  async fn lock_for_update(&mut self, id: Uuid) -> StoreResult<Option<Product>>;

  /// Same as `lock_for_update`, but only matches soft-deleted rows.
  async fn lock_deleted_for_update(&mut self, id: Uuid) -> StoreResult<Option<Product>>;

  /// Stages a full replacement of a row locked by this transaction and advances its
  /// `updated_at`. `row.version` must be exactly one above the locked version.
  async fn write(&mut self, row: Product) -> StoreResult<Product>;

  /// Makes every staged write visible and releases the locks.
  async fn commit(self: Box<Self>) -> StoreResult<()>;

  /// Discards every staged write and releases the locks. Equivalent to dropping.
  async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// The version a row moves to on its next write.
pub(crate) fn next_version(id: Uuid, current: Version) -> StoreResult<Version> {
  current.next().ok_or(StorageError::VersionExhausted { id, current })
}
