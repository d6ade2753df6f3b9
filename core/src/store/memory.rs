// core/src/store/memory.rs

//! In-process `ProductStore`.
//!
//! Each row has an async gate (`tokio::sync::Mutex<()>`) that a transaction holds, through an
//! owned guard, from `lock_for_update` until commit or drop, plus a committed snapshot behind a
//! `parking_lot::RwLock`. Transactions stage writes privately and publish them on commit, so
//! readers never observe a half-applied edit and an abandoned transaction leaves no trace.
//!
//! IMPORTANT: the `parking_lot` guards here are blocking and are never held across `.await`.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{event, Level};
use uuid::Uuid;

use super::{next_version, ProductStore, ProductTransaction};
use crate::coerce;
use crate::error::{StorageError, StoreResult};
use crate::model::{NewProduct, Product, ProductFilter, Version};

struct RowCell {
  gate: Arc<AsyncMutex<()>>,
  committed: RwLock<Product>,
}

impl RowCell {
  fn new(product: Product) -> Arc<Self> {
    Arc::new(Self {
      gate: Arc::new(AsyncMutex::new(())),
      committed: RwLock::new(product),
    })
  }

  fn snapshot(&self) -> Product {
    self.committed.read().clone()
  }
}

type RowTable = Arc<RwLock<HashMap<Uuid, Arc<RowCell>>>>;

/// Product rows kept in memory. Cloning shares the same rows.
#[derive(Clone, Default)]
pub struct MemoryProductStore {
  rows: RowTable,
}

impl std::fmt::Debug for MemoryProductStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MemoryProductStore")
      .field("rows", &self.rows.read().len())
      .finish()
  }
}

impl MemoryProductStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Loads rows verbatim, bypassing every check. Intended for fixtures and seeding, including
  /// rows that deliberately break the stock invariant.
  pub fn from_rows(rows: impl IntoIterator<Item = Product>) -> Self {
    let table = rows
      .into_iter()
      .map(|row| (row.id, RowCell::new(row)))
      .collect::<HashMap<_, _>>();
    Self {
      rows: Arc::new(RwLock::new(table)),
    }
  }

  pub fn len(&self) -> usize {
    self.rows.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn cell(&self, id: Uuid) -> Option<Arc<RowCell>> {
    self.rows.read().get(&id).cloned()
  }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
  async fn begin(&self) -> StoreResult<Box<dyn ProductTransaction>> {
    Ok(Box::new(MemoryTransaction {
      store: self.clone(),
      locks: HashMap::new(),
    }))
  }

  async fn get(&self, id: Uuid, include_deleted: bool) -> StoreResult<Option<Product>> {
    Ok(
      self
        .cell(id)
        .map(|cell| cell.snapshot())
        .filter(|row| include_deleted || !row.is_deleted()),
    )
  }

  async fn list(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
    let cells: Vec<Arc<RowCell>> = self.rows.read().values().cloned().collect();
    let mut rows: Vec<Product> = cells
      .iter()
      .map(|cell| cell.snapshot())
      .filter(|row| filter.matches(row))
      .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    Ok(rows)
  }

  async fn insert(&self, new_product: &NewProduct) -> StoreResult<Product> {
    let now = Utc::now();
    let row = Product {
      id: Uuid::new_v4(),
      name: new_product.name.clone(),
      description: new_product.description.clone(),
      image_url: new_product.image_url.clone(),
      price: coerce::to_cents(new_product.price),
      stock_total: new_product.stock_total,
      stock_available: new_product.stock_total,
      is_active: new_product.is_active,
      version: Version::INITIAL,
      deleted_at: None,
      created_at: now,
      updated_at: now,
    };
    self.rows.write().insert(row.id, RowCell::new(row.clone()));
    Ok(row)
  }
}

struct LockedRow {
  cell: Arc<RowCell>,
  _guard: OwnedMutexGuard<()>,
  locked: Product,
  staged: Option<Product>,
}

impl LockedRow {
  fn current(&self) -> &Product {
    self.staged.as_ref().unwrap_or(&self.locked)
  }
}

/// Transaction over a `MemoryProductStore`. Dropping it releases every row gate and forgets
/// staged writes.
pub struct MemoryTransaction {
  store: MemoryProductStore,
  locks: HashMap<Uuid, LockedRow>,
}

impl MemoryTransaction {
  async fn lock(&mut self, id: Uuid, want_deleted: bool) -> StoreResult<Option<Product>> {
    if let Some(held) = self.locks.get(&id) {
      let current = held.current();
      return Ok((current.is_deleted() == want_deleted).then(|| current.clone()));
    }

    let Some(cell) = self.store.cell(id) else {
      return Ok(None);
    };
    let guard = cell.gate.clone().lock_owned().await;
    let snapshot = cell.snapshot();
    if snapshot.is_deleted() != want_deleted {
      // Gate is released when `guard` drops here.
      return Ok(None);
    }
    self.locks.insert(
      id,
      LockedRow {
        cell,
        _guard: guard,
        locked: snapshot.clone(),
        staged: None,
      },
    );
    Ok(Some(snapshot))
  }
}

#[async_trait]
impl ProductTransaction for MemoryTransaction {
  async fn lock_for_update(&mut self, id: Uuid) -> StoreResult<Option<Product>> {
    self.lock(id, false).await
  }

  async fn lock_deleted_for_update(&mut self, id: Uuid) -> StoreResult<Option<Product>> {
    self.lock(id, true).await
  }

  async fn write(&mut self, mut row: Product) -> StoreResult<Product> {
    let held = self
      .locks
      .get_mut(&row.id)
      .ok_or(StorageError::RowNotLocked { id: row.id })?;
    let previous = held.current();
    let expected = next_version(row.id, previous.version)?;
    if row.version != expected {
      return Err(StorageError::VersionSkew {
        id: row.id,
        expected,
        attempted: row.version,
      });
    }
    row.created_at = previous.created_at;
    row.updated_at = Utc::now().max(previous.updated_at + Duration::microseconds(1));
    held.staged = Some(row.clone());
    Ok(row)
  }

  async fn commit(mut self: Box<Self>) -> StoreResult<()> {
    for (id, held) in self.locks.drain() {
      if let Some(staged) = held.staged {
        *held.cell.committed.write() = staged;
        event!(Level::TRACE, product_id = %id, "Published staged row.");
      }
    }
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> StoreResult<()> {
    Ok(())
  }
}

impl Drop for MemoryTransaction {
  fn drop(&mut self) {
    let discarded = self.locks.values().filter(|held| held.staged.is_some()).count();
    if discarded > 0 {
      event!(Level::DEBUG, discarded, "Transaction dropped without commit; staged rows discarded.");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal::Decimal;

  fn tent() -> NewProduct {
    NewProduct::new("Tent", Decimal::new(4500, 2), 10)
  }

  #[tokio::test]
  async fn insert_starts_fully_available_at_version_one() {
    let store = MemoryProductStore::new();
    let row = store.insert(&tent()).await.unwrap();
    assert_eq!(row.version, Version::INITIAL);
    assert_eq!(row.stock_available, 10);
    assert_eq!(store.get(row.id, false).await.unwrap(), Some(row));
  }

  #[tokio::test]
  async fn staged_writes_are_invisible_until_commit() {
    let store = MemoryProductStore::new();
    let row = store.insert(&tent()).await.unwrap();

    let mut txn = store.begin().await.unwrap();
    let mut next = txn.lock_for_update(row.id).await.unwrap().unwrap();
    next.name = "Dome tent".to_string();
    next.version = next.version.next().unwrap();
    let written = txn.write(next).await.unwrap();
    assert!(written.updated_at > row.updated_at);

    assert_eq!(store.get(row.id, false).await.unwrap().unwrap().name, "Tent");
    txn.commit().await.unwrap();
    let after = store.get(row.id, false).await.unwrap().unwrap();
    assert_eq!(after.name, "Dome tent");
    assert_eq!(after.version.get(), 2);
  }

  #[tokio::test]
  async fn dropping_a_transaction_rolls_back() {
    let store = MemoryProductStore::new();
    let row = store.insert(&tent()).await.unwrap();
    {
      let mut txn = store.begin().await.unwrap();
      let mut next = txn.lock_for_update(row.id).await.unwrap().unwrap();
      next.version = next.version.next().unwrap();
      txn.write(next).await.unwrap();
    }
    assert_eq!(store.get(row.id, false).await.unwrap(), Some(row.clone()));

    // The gate was released: a new transaction can lock immediately.
    let mut txn = store.begin().await.unwrap();
    assert!(txn.lock_for_update(row.id).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn write_requires_a_lock_and_the_next_version() {
    let store = MemoryProductStore::new();
    let row = store.insert(&tent()).await.unwrap();
    let mut txn = store.begin().await.unwrap();

    let unlocked = txn.write(row.clone()).await.unwrap_err();
    assert!(matches!(unlocked, StorageError::RowNotLocked { .. }));

    let locked = txn.lock_for_update(row.id).await.unwrap().unwrap();
    let skipped = Product {
      version: Version::new(locked.version.get() + 2).unwrap(),
      ..locked
    };
    assert!(matches!(
      txn.write(skipped).await.unwrap_err(),
      StorageError::VersionSkew { .. }
    ));
  }

  #[tokio::test]
  async fn lock_for_update_skips_deleted_rows() {
    let store = MemoryProductStore::new();
    let row = store.insert(&tent()).await.unwrap();
    store.soft_delete(row.id).await.unwrap().unwrap();

    let mut txn = store.begin().await.unwrap();
    assert!(txn.lock_for_update(row.id).await.unwrap().is_none());
    assert!(txn.lock_deleted_for_update(row.id).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn list_orders_by_name_and_applies_filter() {
    let store = MemoryProductStore::new();
    let zelt = store.insert(&NewProduct::new("Zelt", Decimal::ONE, 1)).await.unwrap();
    let _axe = store.insert(&NewProduct::new("Axe", Decimal::ONE, 1)).await.unwrap();
    let mut hidden = NewProduct::new("Lantern", Decimal::ONE, 1);
    hidden.is_active = false;
    store.insert(&hidden).await.unwrap();
    store.soft_delete(zelt.id).await.unwrap();

    let names = |rows: Vec<Product>| rows.into_iter().map(|p| p.name).collect::<Vec<_>>();
    assert_eq!(names(store.list(&ProductFilter::default()).await.unwrap()), vec!["Axe"]);
    let everything = ProductFilter {
      include_inactive: true,
      include_deleted: true,
      search: None,
    };
    assert_eq!(
      names(store.list(&everything).await.unwrap()),
      vec!["Axe", "Lantern", "Zelt"]
    );
    let search = ProductFilter {
      include_inactive: true,
      search: Some("ANT".to_string()),
      ..Default::default()
    };
    assert_eq!(names(store.list(&search).await.unwrap()), vec!["Lantern"]);
  }
}
