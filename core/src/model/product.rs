// core/src/model/product.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::Version;

/// A persisted product row.
///
/// Values of this type are snapshots: the store owns the row, callers only ever hold copies.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Product {
  pub id: Uuid,
  pub name: String,
  pub description: Option<String>,
  pub image_url: Option<String>,
  pub price: Decimal,
  pub stock_total: i32,
  pub stock_available: i32,
  pub is_active: bool,
  pub version: Version,
  pub deleted_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Lifecycle state guarded by soft delete / restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductState {
  Active,
  Deleted,
}

impl Product {
  pub fn state(&self) -> ProductState {
    if self.deleted_at.is_some() {
      ProductState::Deleted
    } else {
      ProductState::Active
    }
  }

  pub fn is_deleted(&self) -> bool {
    self.state() == ProductState::Deleted
  }

  /// Units committed elsewhere (rented out, reserved) against the current total.
  pub fn rented_now(&self) -> i32 {
    self.stock_total - self.stock_available
  }

  pub fn etag(&self) -> String {
    self.version.to_etag()
  }
}

/// Read-side filter for product listings.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
  pub include_inactive: bool,
  pub include_deleted: bool,
  /// Case-insensitive substring match on the product name.
  pub search: Option<String>,
}

impl ProductFilter {
  pub fn matches(&self, product: &Product) -> bool {
    // Deleted rows are always inactive, so they are governed by `include_deleted` alone.
    if product.is_deleted() {
      if !self.include_deleted {
        return false;
      }
    } else if !self.include_inactive && !product.is_active {
      return false;
    }
    match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
      Some(needle) => product.name.to_lowercase().contains(&needle.to_lowercase()),
      None => true,
    }
  }
}
