// server/src/state.rs
use crate::config::AppConfig;
use backoffice::ProductService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub products: ProductService,
  pub config: Arc<AppConfig>, // Share loaded config
}
