// tests/common/mod.rs
#![allow(dead_code)] // Each test binary uses a different subset of these helpers.

use anyhow::anyhow;
use async_trait::async_trait;
use backoffice::{
  MemoryProductStore, NewProduct, Product, ProductFilter, ProductService, ProductStore, ProductTransaction,
  StoreResult, Version,
};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::Level;
use uuid::Uuid;

// --- Row fixtures ---

/// A product row with the given stock and version, as if it had been stored long ago.
pub fn product_row(stock_total: i32, stock_available: i32, version: i64) -> Product {
  let long_ago = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
  Product {
    id: Uuid::new_v4(),
    name: "Folding chair".to_string(),
    description: Some("Grey, steel frame".to_string()),
    image_url: None,
    price: Decimal::new(350, 2),
    stock_total,
    stock_available,
    is_active: true,
    version: Version::new(version).unwrap(),
    deleted_at: None,
    created_at: long_ago,
    updated_at: long_ago,
  }
}

pub fn deleted_row(stock_total: i32, stock_available: i32, version: i64) -> Product {
  let mut row = product_row(stock_total, stock_available, version);
  row.deleted_at = Some(Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap());
  row.is_active = false;
  row
}

/// Service over an in-memory store preloaded with `rows`.
pub fn service_with(rows: Vec<Product>) -> (ProductService, MemoryProductStore) {
  let store = MemoryProductStore::from_rows(rows);
  (ProductService::new(Arc::new(store.clone())), store)
}

pub fn v(raw: i64) -> Version {
  Version::new(raw).unwrap()
}

pub fn new_tent(stock_total: i32) -> NewProduct {
  NewProduct::new("Tent", Decimal::new(4500, 2), stock_total)
}

// --- Fault injection ---

/// Where a `FaultyStore` fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
  Begin,
  Write,
  Commit,
}

/// Wraps an in-memory store and fails at one configured point, the way a dropped database
/// connection would.
#[derive(Clone)]
pub struct FaultyStore {
  pub inner: MemoryProductStore,
  pub fault: Fault,
}

#[async_trait]
impl ProductStore for FaultyStore {
  async fn begin(&self) -> StoreResult<Box<dyn ProductTransaction>> {
    if self.fault == Fault::Begin {
      return Err(anyhow!("connection refused").into());
    }
    Ok(Box::new(FaultyTransaction {
      inner: self.inner.begin().await?,
      fault: self.fault,
    }))
  }

  async fn get(&self, id: Uuid, include_deleted: bool) -> StoreResult<Option<Product>> {
    self.inner.get(id, include_deleted).await
  }

  async fn list(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
    self.inner.list(filter).await
  }

  async fn insert(&self, new_product: &NewProduct) -> StoreResult<Product> {
    self.inner.insert(new_product).await
  }
}

struct FaultyTransaction {
  inner: Box<dyn ProductTransaction>,
  fault: Fault,
}

#[async_trait]
impl ProductTransaction for FaultyTransaction {
  async fn lock_for_update(&mut self, id: Uuid) -> StoreResult<Option<Product>> {
    self.inner.lock_for_update(id).await
  }

  async fn lock_deleted_for_update(&mut self, id: Uuid) -> StoreResult<Option<Product>> {
    self.inner.lock_deleted_for_update(id).await
  }

  async fn write(&mut self, row: Product) -> StoreResult<Product> {
    if self.fault == Fault::Write {
      return Err(anyhow!("disk full").into());
    }
    self.inner.write(row).await
  }

  async fn commit(self: Box<Self>) -> StoreResult<()> {
    if self.fault == Fault::Commit {
      // Dropping the inner transaction discards what it staged.
      return Err(anyhow!("connection reset during commit").into());
    }
    self.inner.commit().await
  }

  async fn rollback(self: Box<Self>) -> StoreResult<()> {
    self.inner.rollback().await
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
