// core/src/store/postgres.rs

//! PostgreSQL `ProductStore` on top of `sqlx`.
//!
//! `lock_for_update` is a `SELECT ... FOR UPDATE`; `write` is an `UPDATE` that additionally
//! compares the stored version (a compare-and-swap on top of the row lock). A
//! `sqlx::Transaction` rolls back when dropped, which covers the cancellation path.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::Transaction;
use std::collections::HashMap;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use super::{next_version, ProductStore, ProductTransaction};
use crate::error::{StorageError, StoreResult};
use crate::model::{NewProduct, Product, ProductFilter, Version};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

const COLUMNS: &str = "id, name, description, image_url, price, stock_total, stock_available, \
                       is_active, version, deleted_at, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgProductStore {
  pool: PgPool,
}

impl PgProductStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  /// Creates the `products` table and its indexes when missing.
  #[instrument(name = "PgProductStore::ensure_schema", skip(self))]
  pub async fn ensure_schema(&self) -> StoreResult<()> {
    sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
    event!(Level::INFO, "Product schema is in place.");
    Ok(())
  }
}

#[async_trait]
impl ProductStore for PgProductStore {
  async fn begin(&self) -> StoreResult<Box<dyn ProductTransaction>> {
    let txn = self.pool.begin().await?;
    Ok(Box::new(PgTransaction {
      txn,
      locked: HashMap::new(),
    }))
  }

  async fn get(&self, id: Uuid, include_deleted: bool) -> StoreResult<Option<Product>> {
    let sql = format!(
      "SELECT {} FROM products WHERE id = $1 AND ($2 OR deleted_at IS NULL)",
      COLUMNS
    );
    let row = sqlx::query_as::<_, Product>(&sql)
      .bind(id)
      .bind(include_deleted)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row)
  }

  async fn list(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
    // `COLLATE "C"` keeps the ordering byte-wise, like the in-memory store.
    let sql = format!(
      "SELECT {} FROM products \
       WHERE ($1 OR deleted_at IS NULL) \
         AND (deleted_at IS NOT NULL OR $2 OR is_active) \
         AND ($3::TEXT IS NULL OR position(lower($3::TEXT) IN lower(name)) > 0) \
       ORDER BY name COLLATE \"C\", id",
      COLUMNS
    );
    let search = filter
      .search
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty());
    let rows = sqlx::query_as::<_, Product>(&sql)
      .bind(filter.include_deleted)
      .bind(filter.include_inactive)
      .bind(search)
      .fetch_all(&self.pool)
      .await?;
    Ok(rows)
  }

  async fn insert(&self, new_product: &NewProduct) -> StoreResult<Product> {
    let sql = format!(
      "INSERT INTO products \
         (id, name, description, image_url, price, stock_total, stock_available, is_active, version) \
       VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8) \
       RETURNING {}",
      COLUMNS
    );
    let row = sqlx::query_as::<_, Product>(&sql)
      .bind(Uuid::new_v4())
      .bind(&new_product.name)
      .bind(&new_product.description)
      .bind(&new_product.image_url)
      .bind(new_product.price)
      .bind(new_product.stock_total)
      .bind(new_product.is_active)
      .bind(Version::INITIAL)
      .fetch_one(&self.pool)
      .await?;
    Ok(row)
  }
}

/// Transaction over a `PgProductStore`. Remembers the version of every row it locked (or last
/// wrote) so that `write` can enforce the +1 step.
pub struct PgTransaction {
  txn: Transaction<'static, Postgres>,
  locked: HashMap<Uuid, Version>,
}

impl PgTransaction {
  async fn lock(&mut self, id: Uuid, want_deleted: bool) -> StoreResult<Option<Product>> {
    let sql = format!(
      "SELECT {} FROM products WHERE id = $1 AND (deleted_at IS NOT NULL) = $2 FOR UPDATE",
      COLUMNS
    );
    let row = sqlx::query_as::<_, Product>(&sql)
      .bind(id)
      .bind(want_deleted)
      .fetch_optional(&mut *self.txn)
      .await?;
    if let Some(row) = &row {
      self.locked.insert(row.id, row.version);
    }
    Ok(row)
  }
}

#[async_trait]
impl ProductTransaction for PgTransaction {
  async fn lock_for_update(&mut self, id: Uuid) -> StoreResult<Option<Product>> {
    self.lock(id, false).await
  }

  async fn lock_deleted_for_update(&mut self, id: Uuid) -> StoreResult<Option<Product>> {
    self.lock(id, true).await
  }

  async fn write(&mut self, row: Product) -> StoreResult<Product> {
    let previous = *self
      .locked
      .get(&row.id)
      .ok_or(StorageError::RowNotLocked { id: row.id })?;
    let expected = next_version(row.id, previous)?;
    if row.version != expected {
      return Err(StorageError::VersionSkew {
        id: row.id,
        expected,
        attempted: row.version,
      });
    }

    let sql = format!(
      "UPDATE products SET \
         name = $2, description = $3, image_url = $4, price = $5, \
         stock_total = $6, stock_available = $7, is_active = $8, \
         version = $9, deleted_at = $10, \
         updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond') \
       WHERE id = $1 AND version = $11 \
       RETURNING {}",
      COLUMNS
    );
    let written = sqlx::query_as::<_, Product>(&sql)
      .bind(row.id)
      .bind(&row.name)
      .bind(&row.description)
      .bind(&row.image_url)
      .bind(row.price)
      .bind(row.stock_total)
      .bind(row.stock_available)
      .bind(row.is_active)
      .bind(row.version)
      .bind(row.deleted_at)
      .bind(previous)
      .fetch_optional(&mut *self.txn)
      .await?
      .ok_or(StorageError::VersionSkew {
        id: row.id,
        expected,
        attempted: row.version,
      })?;
    self.locked.insert(written.id, written.version);
    Ok(written)
  }

  async fn commit(self: Box<Self>) -> StoreResult<()> {
    self.txn.commit().await?;
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> StoreResult<()> {
    self.txn.rollback().await?;
    Ok(())
  }
}
