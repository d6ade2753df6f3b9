// src/lib.rs

//! Backoffice: versioned product records with optimistic, transaction-scoped updates.
//!
//! The crate protects two things under concurrent edits:
//!  - No silent overwrites: callers may pin an edit to the version they last read and get a
//!    `VersionConflict` instead of clobbering someone else's change.
//!  - Stock consistency: `0 <= stock_available <= stock_total` holds after every mutation, and
//!    units committed to rentals survive edits of the owned total.
//!
//! Storage is injected (`Arc<dyn ProductStore>`); an in-memory store and a PostgreSQL store are
//! provided.

pub mod coerce;
pub mod error;
pub mod model;
pub mod service;
pub mod stock;
pub mod store;

// --- Re-exports for the Public API ---

pub use crate::error::{ProductError, ProductResult, StorageError, StoreResult};
pub use crate::model::{
  resolve_expected_version, NewProduct, Product, ProductFilter, ProductPatch, ProductState, RawNewProduct,
  RawProductPatch, Version,
};
pub use crate::service::ProductService;
pub use crate::stock::StockLevels;
pub use crate::store::{MemoryProductStore, PgProductStore, ProductStore, ProductTransaction};

/*
    Typical flow for an edit coming from a form or API call:
    1. Deserialize the body into `RawProductPatch` and call `into_parts()` to coerce the fields
       and split off the body's `expected_version`.
    2. Combine it with a precondition header via `resolve_expected_version(body, header)`.
    3. Call `ProductService::apply_update(id, patch, expected)`.
    4. Send back the returned row and `product.etag()` so the caller can pin its next edit.
*/
