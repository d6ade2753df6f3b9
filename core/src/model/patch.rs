// core/src/model/patch.rs

//! Partial product edits.
//!
//! A `ProductPatch` carries one `Option` per editable field: `Some` overwrites, `None` keeps the
//! stored value. Nullable display fields use `Option<Option<_>>` so that "clear this field" (an
//! explicit JSON `null`) is distinguishable from "leave it alone" (field absent).

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{Product, Version};
use crate::coerce;
use crate::error::{ProductError, ProductResult};

/// Deserializes any present value (including `null`) as `Some`, leaving absent fields to
/// `#[serde(default)]`.
pub(crate) fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
  pub name: Option<String>,
  pub description: Option<Option<String>>,
  pub image_url: Option<Option<String>>,
  pub price: Option<Decimal>,
  pub stock_total: Option<i32>,
  pub is_active: Option<bool>,
}

impl ProductPatch {
  pub fn is_empty(&self) -> bool {
    *self == ProductPatch::default()
  }

  /// Re-checks field-level rules for patches built in code rather than parsed from a
  /// `RawProductPatch`. Runs before any transaction is opened.
  pub fn validate(&self) -> ProductResult<()> {
    if let Some(name) = &self.name {
      coerce::parse_name("name", name)?;
    }
    if let Some(price) = self.price {
      validate_price(price)?;
    }
    if let Some(total) = self.stock_total {
      if total < 0 {
        return Err(ProductError::InvalidInput("stock_total: must not be negative".to_string()));
      }
    }
    Ok(())
  }

  /// Shallow, field-by-field merge of the non-stock fields onto a snapshot of `current`.
  /// Stock fields, version and timestamps are carried over untouched; the update protocol
  /// owns those.
  pub(crate) fn merge_onto(&self, current: &Product) -> Product {
    let mut merged = current.clone();
    if let Some(name) = &self.name {
      merged.name = name.trim().to_string();
    }
    if let Some(description) = &self.description {
      merged.description = description.clone();
    }
    if let Some(image_url) = &self.image_url {
      merged.image_url = image_url.clone();
    }
    if let Some(price) = self.price {
      merged.price = coerce::to_cents(price);
    }
    if let Some(is_active) = self.is_active {
      merged.is_active = is_active;
    }
    merged
  }
}

pub(crate) fn validate_price(price: Decimal) -> ProductResult<()> {
  if price.is_sign_negative() && !price.is_zero() {
    return Err(ProductError::InvalidInput("price: must not be negative".to_string()));
  }
  if price.normalize().scale() > 2 {
    return Err(ProductError::InvalidInput("price: at most two decimal places".to_string()));
  }
  if price > coerce::max_price() {
    return Err(ProductError::InvalidInput(format!(
      "price: must not exceed {}",
      coerce::max_price()
    )));
  }
  Ok(())
}

/// Loosely-typed partial update as sent by callers.
///
/// `expected_version` travels with the edit but is not part of it; `into_parts` splits it off.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawProductPatch {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default, deserialize_with = "deserialize_present")]
  pub description: Option<Option<String>>,
  #[serde(default, deserialize_with = "deserialize_present")]
  pub image_url: Option<Option<String>>,
  #[serde(default, deserialize_with = "deserialize_present")]
  pub price: Option<Value>,
  #[serde(default, deserialize_with = "deserialize_present")]
  pub stock_total: Option<Value>,
  #[serde(default)]
  pub is_active: Option<bool>,
  #[serde(default, deserialize_with = "deserialize_present")]
  pub expected_version: Option<Value>,
}

impl RawProductPatch {
  /// Coerces every present field, returning the typed patch and the body-supplied expected
  /// version. Any malformed field rejects the whole request.
  pub fn into_parts(self) -> ProductResult<(ProductPatch, Option<Version>)> {
    let name = self.name.as_deref().map(|n| coerce::parse_name("name", n)).transpose()?;
    let price = self.price.as_ref().map(|v| coerce::parse_price("price", v)).transpose()?;
    let stock_total = self
      .stock_total
      .as_ref()
      .map(|v| coerce::parse_stock("stock_total", v))
      .transpose()?;
    let expected_version = match self.expected_version {
      None | Some(Value::Null) => None,
      Some(v) => Some(coerce::parse_version("expected_version", &v)?),
    };

    let patch = ProductPatch {
      name,
      description: self.description,
      image_url: self.image_url,
      price,
      stock_total,
      is_active: self.is_active,
    };
    Ok((patch, expected_version))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn raw(value: Value) -> RawProductPatch {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn absent_and_null_are_distinguished_for_nullable_fields() {
    let (patch, _) = raw(json!({ "description": null })).into_parts().unwrap();
    assert_eq!(patch.description, Some(None));
    assert_eq!(patch.image_url, None);

    let (patch, _) = raw(json!({ "image_url": "https://cdn/x.png" })).into_parts().unwrap();
    assert_eq!(patch.image_url, Some(Some("https://cdn/x.png".to_string())));
    assert_eq!(patch.description, None);
  }

  #[test]
  fn numeric_fields_are_coerced() {
    let (patch, expected) = raw(json!({ "price": "19.999", "stock_total": "8", "expected_version": 3 }))
      .into_parts()
      .unwrap();
    assert_eq!(patch.price, Some(Decimal::new(2000, 2)));
    assert_eq!(patch.stock_total, Some(8));
    assert_eq!(expected, Some(Version::new(3).unwrap()));
  }

  #[test]
  fn explicit_null_price_is_rejected() {
    let err = raw(json!({ "price": null })).into_parts().unwrap_err();
    assert!(matches!(err, ProductError::InvalidInput(_)));
  }

  #[test]
  fn null_expected_version_means_unconditional() {
    let (_, expected) = raw(json!({ "expected_version": null })).into_parts().unwrap();
    assert_eq!(expected, None);
  }

  #[test]
  fn unknown_fields_are_refused() {
    let parsed = serde_json::from_value::<RawProductPatch>(json!({ "stock_available": 3 }));
    assert!(parsed.is_err());
  }

  #[test]
  fn empty_body_is_an_empty_patch() {
    let (patch, expected) = raw(json!({})).into_parts().unwrap();
    assert!(patch.is_empty());
    assert_eq!(expected, None);
  }

  #[test]
  fn validate_catches_hand_built_mistakes() {
    let negative = ProductPatch {
      stock_total: Some(-1),
      ..Default::default()
    };
    assert!(negative.validate().is_err());

    let fractional_cents = ProductPatch {
      price: Some(Decimal::new(1001, 3)),
      ..Default::default()
    };
    assert!(fractional_cents.validate().is_err());

    let blank = ProductPatch {
      name: Some("  ".to_string()),
      ..Default::default()
    };
    assert!(blank.validate().is_err());

    let fine = ProductPatch {
      price: Some(Decimal::new(1000, 3)),
      ..Default::default()
    };
    assert!(fine.validate().is_ok());
  }

  #[test]
  fn merged_price_is_stored_in_cents() {
    let current = Product {
      id: uuid::Uuid::new_v4(),
      name: "Lantern".to_string(),
      description: None,
      image_url: None,
      price: Decimal::new(500, 2),
      stock_total: 3,
      stock_available: 3,
      is_active: true,
      version: Version::INITIAL,
      deleted_at: None,
      created_at: chrono::Utc::now(),
      updated_at: chrono::Utc::now(),
    };
    let patch = ProductPatch {
      price: Some(Decimal::new(1000, 3)),
      ..Default::default()
    };
    assert_eq!(patch.merge_onto(&current).price.to_string(), "1.00");
  }
}
