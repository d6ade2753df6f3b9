// core/src/model/mod.rs

//! Product records and the typed inputs that mutate them.

pub mod new_product;
pub mod patch;
pub mod product;
pub mod version;

pub use new_product::{NewProduct, RawNewProduct};
pub use patch::{ProductPatch, RawProductPatch};
pub use product::{Product, ProductFilter, ProductState};
pub use version::{resolve_expected_version, Version};
