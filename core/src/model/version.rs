// core/src/model/version.rs

//! The per-row mutation counter and its precondition-tag representation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ProductError, ProductResult};

/// Monotonic mutation counter of a product row. Starts at 1 on creation and grows by exactly
/// one on every successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Version(i64);

impl Version {
  pub const INITIAL: Version = Version(1);

  /// Builds a version from a raw counter. Counters below 1 never belong to a stored row.
  pub fn new(raw: i64) -> ProductResult<Self> {
    if raw < 1 {
      return Err(ProductError::InvalidInput(format!(
        "version must be a positive integer, got {}",
        raw
      )));
    }
    Ok(Version(raw))
  }

  pub fn get(self) -> i64 {
    self.0
  }

  /// The version a successful mutation moves to; `None` once the counter is exhausted.
  pub fn next(self) -> Option<Self> {
    self.0.checked_add(1).map(Version)
  }

  /// Strong entity tag for this version, e.g. `"4"`.
  pub fn to_etag(self) -> String {
    format!("\"{}\"", self.0)
  }

  /// Parses an `If-Match` header value.
  ///
  /// `*` matches any current version and therefore yields `None`. For a list of tags only
  /// the first one is considered; a single product only ever has one current tag.
  pub fn from_if_match(header: &str) -> ProductResult<Option<Self>> {
    let first = header.split(',').next().unwrap_or_default().trim();
    if first == "*" {
      return Ok(None);
    }
    Self::from_etag(first).map(Some)
  }

  /// Parses a single entity tag (`"4"` or the weak form `W/"4"`).
  pub fn from_etag(tag: &str) -> ProductResult<Self> {
    let tag = tag.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    let inner = tag
      .strip_prefix('"')
      .and_then(|t| t.strip_suffix('"'))
      .ok_or_else(|| ProductError::InvalidInput(format!("malformed entity tag: {}", tag)))?;
    let raw = inner
      .parse::<i64>()
      .map_err(|_| ProductError::InvalidInput(format!("entity tag is not a version: {}", tag)))?;
    Self::new(raw)
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Picks the caller's expected version when it may arrive both in the request body and in a
/// precondition header. The body field takes precedence.
pub fn resolve_expected_version(body: Option<Version>, header: Option<Version>) -> Option<Version> {
  body.or(header)
}
