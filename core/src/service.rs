// core/src/service.rs

//! The concurrency-safe update protocol.
//!
//! `ProductService` is the only entry point that mutates product rows. Every mutation runs as
//! lock → (optional) version check → stock sanity check → recompute → write → commit inside one
//! store transaction; any failure rolls the transaction back, so a rejected request never leaves
//! a partial write or a version bump behind.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ProductError, ProductResult};
use crate::model::{NewProduct, Product, ProductFilter, ProductPatch, Version};
use crate::stock::StockLevels;
use crate::store::{next_version, ProductStore, ProductTransaction};

/// Product operations over an injected storage handle.
#[derive(Clone)]
pub struct ProductService {
  store: Arc<dyn ProductStore>,
}

impl std::fmt::Debug for ProductService {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProductService").finish_non_exhaustive()
  }
}

impl ProductService {
  pub fn new(store: Arc<dyn ProductStore>) -> Self {
    Self { store }
  }

  #[instrument(name = "ProductService::create", skip(self, new_product), fields(name = %new_product.name))]
  pub async fn create(&self, new_product: NewProduct) -> ProductResult<Product> {
    new_product.validate()?;
    let created = self.store.insert(&new_product).await.map_err(|e| {
      error!("Failed to insert product: {}", e);
      ProductError::from(e)
    })?;
    info!(product_id = %created.id, "Product created.");
    Ok(created)
  }

  /// Committed snapshot of a product; soft-deleted rows only with `include_deleted`.
  pub async fn get(&self, id: Uuid, include_deleted: bool) -> ProductResult<Product> {
    self
      .store
      .get(id, include_deleted)
      .await?
      .ok_or(ProductError::NotFound { id })
  }

  pub async fn list(&self, filter: &ProductFilter) -> ProductResult<Vec<Product>> {
    Ok(self.store.list(filter).await?)
  }

  /// Applies a partial edit.
  ///
  /// With `expected_version` set, the edit only lands if the stored row is still at that
  /// version; `None` means last writer wins. A new `stock_total` keeps the units currently
  /// committed elsewhere and moves the whole difference into `stock_available`.
  #[instrument(
    name = "ProductService::apply_update",
    skip(self, patch),
    fields(product_id = %id, expected_version = ?expected_version.map(Version::get))
  )]
  pub async fn apply_update(
    &self,
    id: Uuid,
    patch: ProductPatch,
    expected_version: Option<Version>,
  ) -> ProductResult<Product> {
    // Malformed input never reaches the store.
    patch.validate()?;

    self
      .mutate(id, expected_version, move |current| {
        let mut next = patch.merge_onto(current);
        if let Some(new_total) = patch.stock_total {
          StockLevels::of(current)
            .with_total(id, new_total)?
            .apply_to(&mut next);
        }
        Ok(next)
      })
      .await
  }

  /// Commits `quantity` units of an active product (a rental going out).
  #[instrument(name = "ProductService::reserve", skip(self), fields(product_id = %id))]
  pub async fn reserve(&self, id: Uuid, quantity: i32, expected_version: Option<Version>) -> ProductResult<Product> {
    ensure_quantity(quantity)?;
    self
      .mutate(id, expected_version, move |current| {
        let mut next = current.clone();
        StockLevels::of(current).reserve(id, quantity)?.apply_to(&mut next);
        Ok(next)
      })
      .await
  }

  /// Returns `quantity` committed units of an active product to availability.
  #[instrument(name = "ProductService::release", skip(self), fields(product_id = %id))]
  pub async fn release(&self, id: Uuid, quantity: i32, expected_version: Option<Version>) -> ProductResult<Product> {
    ensure_quantity(quantity)?;
    self
      .mutate(id, expected_version, move |current| {
        let mut next = current.clone();
        StockLevels::of(current).release(id, quantity)?.apply_to(&mut next);
        Ok(next)
      })
      .await
  }

  #[instrument(name = "ProductService::soft_delete", skip(self), fields(product_id = %id))]
  pub async fn soft_delete(&self, id: Uuid) -> ProductResult<Product> {
    match self.store.soft_delete(id).await? {
      Some(deleted) => {
        info!(version = %deleted.version, "Product soft-deleted.");
        Ok(deleted)
      }
      None => {
        warn!("Soft delete refused: no active product.");
        Err(ProductError::NotFound { id })
      }
    }
  }

  #[instrument(name = "ProductService::restore", skip(self), fields(product_id = %id))]
  pub async fn restore(&self, id: Uuid) -> ProductResult<Product> {
    match self.store.restore(id).await? {
      Some(restored) => {
        info!(version = %restored.version, "Product restored.");
        Ok(restored)
      }
      None => {
        warn!("Restore refused: no deleted product.");
        Err(ProductError::NotFound { id })
      }
    }
  }

  /// Runs one read-modify-write cycle in its own transaction. `compute` gets the locked row and
  /// returns the replacement; version and `updated_at` are taken care of here and in the store.
  async fn mutate<F>(&self, id: Uuid, expected_version: Option<Version>, compute: F) -> ProductResult<Product>
  where
    F: FnOnce(&Product) -> ProductResult<Product> + Send,
  {
    let mut txn = self.store.begin().await?;
    match locked_cycle(&mut *txn, id, expected_version, compute).await {
      Ok(written) => {
        txn.commit().await.map_err(|e| {
          error!("Commit failed; nothing was applied: {}", e);
          ProductError::from(e)
        })?;
        Ok(written)
      }
      Err(err) => {
        if let Err(rollback_err) = txn.rollback().await {
          // The backend discards the transaction when its connection goes away.
          warn!("Explicit rollback failed: {}", rollback_err);
        }
        match &err {
          ProductError::Storage(e) => error!("Storage failure, transaction rolled back: {}", e),
          other => warn!("Mutation refused: {}", other),
        }
        Err(err)
      }
    }
  }
}

async fn locked_cycle<F>(
  txn: &mut dyn ProductTransaction,
  id: Uuid,
  expected_version: Option<Version>,
  compute: F,
) -> ProductResult<Product>
where
  F: FnOnce(&Product) -> ProductResult<Product> + Send,
{
  let current = txn
    .lock_for_update(id)
    .await?
    .ok_or(ProductError::NotFound { id })?;

  if let Some(expected) = expected_version {
    if expected != current.version {
      return Err(ProductError::VersionConflict {
        id,
        expected,
        actual: current.version,
      });
    }
  }

  // A row that already breaks `0 <= available <= total` is never rewritten, whatever the edit.
  StockLevels::of(&current).ensure_consistent(id)?;

  let mut next = compute(&current)?;
  next.id = current.id;
  next.version = next_version(id, current.version)?;
  let written = txn.write(next).await?;
  info!(
    from_version = %current.version,
    to_version = %written.version,
    stock_total = written.stock_total,
    stock_available = written.stock_available,
    "Product row updated."
  );
  Ok(written)
}

fn ensure_quantity(quantity: i32) -> ProductResult<()> {
  if quantity < 1 {
    return Err(ProductError::InvalidInput("quantity: must be at least 1".to_string()));
  }
  Ok(())
}
