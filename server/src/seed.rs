// server/src/seed.rs

use anyhow::Context;
use backoffice::{NewProduct, ProductFilter, ProductService};
use rust_decimal::Decimal;
use tracing::{info, instrument};

/// Inserts a handful of demo products unless the store already holds any rows.
#[instrument(name = "seed::demo_products", skip(service))]
pub async fn seed_demo_products(service: &ProductService) -> anyhow::Result<usize> {
  let everything = ProductFilter {
    include_inactive: true,
    include_deleted: true,
    search: None,
  };
  let existing = service
    .list(&everything)
    .await
    .context("Failed to check for existing products")?;
  if !existing.is_empty() {
    info!(existing = existing.len(), "Store already has products; skipping seed.");
    return Ok(0);
  }

  let mut demo = vec![
    NewProduct::new("Folding chair", Decimal::new(350, 2), 120),
    NewProduct::new("Banquet table", Decimal::new(1200, 2), 30),
    NewProduct::new("Party tent 6x3", Decimal::new(8900, 2), 4),
  ];
  let mut heater = NewProduct::new("Patio heater", Decimal::new(2500, 2), 6);
  heater.description = Some("Propane, bottle not included".to_string());
  heater.is_active = false;
  demo.push(heater);

  let count = demo.len();
  for product in demo {
    let name = product.name.clone();
    service
      .create(product)
      .await
      .with_context(|| format!("Failed to seed product '{}'", name))?;
  }
  info!(count, "Seeded demo products.");
  Ok(count)
}
