// server/src/errors.rs

use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use backoffice::{ProductError, Version};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Version Conflict: {message}")]
  Conflict { message: String, current_version: Version },

  #[error("Unprocessable: {0}")]
  Unprocessable(String),

  #[error("Data Integrity Error: {0}")]
  DataIntegrity(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Storage Error: {0}")]
  Storage(String),

  #[error("Internal Server Error: {0}")]
  Internal(String), // For miscellaneous errors
}

impl From<ProductError> for AppError {
  fn from(err: ProductError) -> Self {
    let message = err.to_string();
    match err {
      ProductError::NotFound { .. } => AppError::NotFound(message),
      ProductError::VersionConflict { actual, .. } => AppError::Conflict {
        message,
        current_version: actual,
      },
      ProductError::StockBelowCommitted { .. }
      | ProductError::InsufficientStock { .. }
      | ProductError::ReleaseExceedsCommitted { .. } => AppError::Unprocessable(message),
      ProductError::InvalidInput(m) => AppError::Validation(m),
      ProductError::InconsistentStock { .. } => AppError::DataIntegrity(message),
      ProductError::Storage(e) => AppError::Storage(e.to_string()),
    }
  }
}

// Startup helpers (seeding, pool setup) report through anyhow.
impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<ProductError>() {
      Ok(product_err) => AppError::from(product_err),
      Err(err) => AppError::Internal(format!("{:#}", err)),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict { .. } => StatusCode::CONFLICT,
      AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
      AppError::DataIntegrity(_) | AppError::Config(_) | AppError::Storage(_) | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    if self.status_code().is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with client error");
    }
    match self {
      AppError::Validation(m) => HttpResponse::BadRequest().json(json!({"error": m})),
      AppError::NotFound(m) => HttpResponse::NotFound().json(json!({"error": m})),
      AppError::Conflict {
        message,
        current_version,
      } => HttpResponse::Conflict()
        .insert_header((header::ETAG, current_version.to_etag()))
        .json(json!({"error": message, "current_version": current_version})),
      AppError::Unprocessable(m) => HttpResponse::UnprocessableEntity().json(json!({"error": m})),
      AppError::DataIntegrity(m) => {
        HttpResponse::InternalServerError().json(json!({"error": "Stored product data is inconsistent", "detail": m}))
      }
      AppError::Config(m) => {
        HttpResponse::InternalServerError().json(json!({"error": "Configuration issue", "detail": m}))
      }
      // Backend details stay in the log.
      AppError::Storage(_) => HttpResponse::InternalServerError().json(json!({"error": "Storage operation failed"})),
      AppError::Internal(_) => HttpResponse::InternalServerError().json(json!({"error": "An internal error occurred"})),
    }
  }
}

// Define a Result type alias for the application
pub type Result<T, E = AppError> = std::result::Result<T, E>;
