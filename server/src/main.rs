// server/src/main.rs

mod config;
mod errors;
mod seed;
mod state;
mod web;

use crate::config::{AppConfig, StoreBackend};
use crate::errors::{AppError, Result as AppResult}; // Use the app's Result alias
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer}; // Renamed web to actix_data
use backoffice::{MemoryProductStore, PgProductStore, ProductService, ProductStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan; // For span events in tracing
use tracing_subscriber::EnvFilter;

/// Opens the configured backend. The Postgres schema is created when missing.
async fn build_store(config: &AppConfig) -> AppResult<Arc<dyn ProductStore>> {
  match config.store_backend {
    StoreBackend::Memory => {
      tracing::info!("Using the in-memory product store; data is lost on shutdown.");
      Ok(Arc::new(MemoryProductStore::new()))
    }
    StoreBackend::Postgres => {
      let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| AppError::Config("DATABASE_URL is required for the postgres backend".to_string()))?;
      let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(url)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to connect to the database: {}", e)))?;
      tracing::info!("Successfully connected to the database.");

      let store = PgProductStore::new(pool);
      store
        .ensure_schema()
        .await
        .map_err(|e| AppError::Storage(format!("Failed to prepare the schema: {}", e)))?;
      Ok(Arc::new(store))
    }
  }
}

// Main function
#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::CLOSE) // Log when spans close, showing duration
    .init();

  tracing::info!("Starting back-office server...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }
  };

  let store = match build_store(&app_config).await {
    Ok(store) => store,
    Err(e) => {
      tracing::error!(error = %e, "Failed to initialise the product store.");
      return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }
  };
  let products = ProductService::new(store);

  if app_config.seed_db {
    if let Err(e) = seed::seed_demo_products(&products).await {
      tracing::error!(error = %AppError::from(e), "Failed to seed demo products.");
    }
  }

  let app_state = AppState {
    products,
    config: app_config.clone(),
  };

  let server_address = app_config.bind_address();
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone())) // Share AppState with handlers
      .wrap(tracing_actix_web::TracingLogger::default()) // Actix middleware for tracing requests
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
