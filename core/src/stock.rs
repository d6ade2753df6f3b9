// core/src/stock.rs

//! Stock arithmetic shared by edits, reservations and returns.
//!
//! Every function starts from the locked, stored row and assumes nothing about it: the row's own
//! `0 <= available <= total` invariant is checked first, so a negative "rented-now" figure can never
//! leak into a new row.

use uuid::Uuid;

use crate::error::{ProductError, ProductResult};
use crate::model::Product;

/// The two stock columns of a product row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevels {
  pub total: i32,
  pub available: i32,
}

impl StockLevels {
  pub fn of(product: &Product) -> Self {
    Self {
      total: product.stock_total,
      available: product.stock_available,
    }
  }

  pub fn is_consistent(&self) -> bool {
    0 <= self.available && self.available <= self.total
  }

  /// Units committed elsewhere. Only meaningful on consistent levels.
  pub fn committed(&self) -> i32 {
    self.total - self.available
  }

  /// Fails `InconsistentStock` unless `0 <= available <= total`.
  pub(crate) fn ensure_consistent(&self, id: Uuid) -> ProductResult<()> {
    if self.is_consistent() {
      Ok(())
    } else {
      Err(ProductError::InconsistentStock {
        id,
        stock_total: self.total,
        stock_available: self.available,
      })
    }
  }

  /// New levels after changing the owned total. Committed units carry over unchanged and the
  /// whole delta flows into availability.
  pub fn with_total(&self, id: Uuid, new_total: i32) -> ProductResult<StockLevels> {
    self.ensure_consistent(id)?;
    if new_total < 0 {
      return Err(ProductError::InvalidInput("stock_total: must not be negative".to_string()));
    }
    let committed = self.committed();
    if new_total < committed {
      return Err(ProductError::StockBelowCommitted {
        id,
        requested_total: new_total,
        committed,
      });
    }
    Ok(StockLevels {
      total: new_total,
      available: new_total - committed,
    })
  }

  /// New levels after committing `quantity` more units (a rental going out).
  pub fn reserve(&self, id: Uuid, quantity: i32) -> ProductResult<StockLevels> {
    self.ensure_consistent(id)?;
    ensure_positive(quantity)?;
    if quantity > self.available {
      return Err(ProductError::InsufficientStock {
        id,
        requested: quantity,
        available: self.available,
      });
    }
    Ok(StockLevels {
      total: self.total,
      available: self.available - quantity,
    })
  }

  /// New levels after `quantity` committed units come back (a return).
  pub fn release(&self, id: Uuid, quantity: i32) -> ProductResult<StockLevels> {
    self.ensure_consistent(id)?;
    ensure_positive(quantity)?;
    let committed = self.committed();
    if quantity > committed {
      return Err(ProductError::ReleaseExceedsCommitted {
        id,
        requested: quantity,
        committed,
      });
    }
    Ok(StockLevels {
      total: self.total,
      available: self.available + quantity,
    })
  }

  pub(crate) fn apply_to(&self, product: &mut Product) {
    product.stock_total = self.total;
    product.stock_available = self.available;
  }
}

fn ensure_positive(quantity: i32) -> ProductResult<()> {
  if quantity < 1 {
    return Err(ProductError::InvalidInput("quantity: must be at least 1".to_string()));
  }
  Ok(())
}
