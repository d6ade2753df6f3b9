// core/src/model/new_product.rs

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::patch::validate_price;
use crate::coerce;
use crate::error::{ProductError, ProductResult};

/// Fields of a product to be created. The store assigns id, version and timestamps, and starts
/// the row with every unit available.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
  pub name: String,
  pub description: Option<String>,
  pub image_url: Option<String>,
  pub price: Decimal,
  pub stock_total: i32,
  pub is_active: bool,
}

impl NewProduct {
  pub fn new(name: impl Into<String>, price: Decimal, stock_total: i32) -> Self {
    Self {
      name: name.into(),
      description: None,
      image_url: None,
      price,
      stock_total,
      is_active: true,
    }
  }

  pub fn validate(&self) -> ProductResult<()> {
    coerce::parse_name("name", &self.name)?;
    validate_price(self.price)?;
    if self.stock_total < 0 {
      return Err(ProductError::InvalidInput("stock_total: must not be negative".to_string()));
    }
    Ok(())
  }
}

/// Loosely-typed creation request as sent by callers.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawNewProduct {
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub image_url: Option<String>,
  pub price: Value,
  #[serde(default)]
  pub stock_total: Option<Value>,
  #[serde(default)]
  pub is_active: Option<bool>,
}

impl TryFrom<RawNewProduct> for NewProduct {
  type Error = ProductError;

  fn try_from(raw: RawNewProduct) -> ProductResult<Self> {
    Ok(NewProduct {
      name: coerce::parse_name("name", &raw.name)?,
      description: raw.description,
      image_url: raw.image_url,
      price: coerce::parse_price("price", &raw.price)?,
      stock_total: match raw.stock_total {
        Some(v) => coerce::parse_stock("stock_total", &v)?,
        None => 0,
      },
      is_active: raw.is_active.unwrap_or(true),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn raw_request_is_coerced_with_defaults() {
    let raw: RawNewProduct = serde_json::from_value(json!({ "name": " Tent ", "price": "45.5" })).unwrap();
    let product = NewProduct::try_from(raw).unwrap();
    assert_eq!(product.name, "Tent");
    assert_eq!(product.price, Decimal::new(4550, 2));
    assert_eq!(product.stock_total, 0);
    assert!(product.is_active);
  }

  #[test]
  fn malformed_stock_is_rejected() {
    let raw: RawNewProduct =
      serde_json::from_value(json!({ "name": "Tent", "price": 1, "stock_total": "lots" })).unwrap();
    assert!(matches!(NewProduct::try_from(raw), Err(ProductError::InvalidInput(_))));
  }
}
