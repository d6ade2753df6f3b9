// core/src/coerce.rs

//! Defensive coercion of caller-supplied JSON values into typed product fields.
//!
//! Callers (HTTP forms, scripts, the SPA) send prices and quantities either as JSON numbers or as
//! numeric strings. Everything here runs before a transaction is opened; a value that cannot be
//! coerced becomes `ProductError::InvalidInput` and no storage is touched.

use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{ProductError, ProductResult};
use crate::model::Version;

/// Largest price a `NUMERIC(12,2)` column holds.
pub fn max_price() -> Decimal {
  Decimal::new(999_999_999_999, 2)
}

fn invalid(field: &str, detail: impl std::fmt::Display) -> ProductError {
  ProductError::InvalidInput(format!("{}: {}", field, detail))
}

fn decimal_from_text(text: &str) -> Option<Decimal> {
  Decimal::from_str(text).ok().or_else(|| Decimal::from_scientific(text).ok())
}

/// A validated price at the stored scale of exactly two decimal places, so `1`, `1.0` and
/// `1.000` all become `1.00`.
pub fn to_cents(price: Decimal) -> Decimal {
  let mut cents = price;
  cents.rescale(2);
  cents
}

/// Parses a price: non-negative, at most `max_price()`, rounded half away from zero to cents.
pub fn parse_price(field: &str, value: &Value) -> ProductResult<Decimal> {
  let parsed = match value {
    Value::Number(n) => decimal_from_text(&n.to_string()),
    Value::String(s) if !s.trim().is_empty() => decimal_from_text(s.trim()),
    Value::String(_) => return Err(invalid(field, "must not be empty")),
    other => return Err(invalid(field, format!("expected a number, got {}", other))),
  };
  let price = parsed.ok_or_else(|| invalid(field, format!("not a finite decimal: {}", value)))?;
  if price.is_sign_negative() && !price.is_zero() {
    return Err(invalid(field, "must not be negative"));
  }
  let price = price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
  if price > max_price() {
    return Err(invalid(field, format!("must not exceed {}", max_price())));
  }
  Ok(to_cents(price.abs()))
}

fn integer_from_f64(f: f64) -> Option<i64> {
  if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
    Some(f as i64)
  } else {
    None
  }
}

fn parse_integer(field: &str, value: &Value) -> ProductResult<i64> {
  let parsed = match value {
    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integer_from_f64)),
    Value::String(s) => {
      let s = s.trim();
      s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(integer_from_f64))
    }
    other => return Err(invalid(field, format!("expected an integer, got {}", other))),
  };
  parsed.ok_or_else(|| invalid(field, format!("not a finite integer: {}", value)))
}

/// Parses a stock count in `0..=i32::MAX`. Integral floats such as `8.0` are accepted.
pub fn parse_stock(field: &str, value: &Value) -> ProductResult<i32> {
  let raw = parse_integer(field, value)?;
  if raw < 0 {
    return Err(invalid(field, "must not be negative"));
  }
  i32::try_from(raw).map_err(|_| invalid(field, format!("must not exceed {}", i32::MAX)))
}

/// Parses a reservation quantity; like a stock count but strictly positive.
pub fn parse_quantity(field: &str, value: &Value) -> ProductResult<i32> {
  let quantity = parse_stock(field, value)?;
  if quantity == 0 {
    return Err(invalid(field, "must be at least 1"));
  }
  Ok(quantity)
}

pub fn parse_version(field: &str, value: &Value) -> ProductResult<Version> {
  let raw = parse_integer(field, value)?;
  Version::new(raw).map_err(|_| invalid(field, "must be a positive integer"))
}

/// Trims a required display name and rejects blank input.
pub fn parse_name(field: &str, value: &str) -> ProductResult<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(invalid(field, "must not be blank"));
  }
  Ok(trimmed.to_string())
}
