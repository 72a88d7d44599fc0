// storefront/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use orka::OrkaError;

/// One order line that cannot be fulfilled from current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockIssue {
  pub product_name: String,
  pub requested: i64,
  pub available: i32,
}

impl StockIssue {
  fn describe(issues: &[StockIssue]) -> String {
    let details: Vec<String> = issues
      .iter()
      .map(|i| format!("{}: requested {}, only {} available", i.product_name, i.requested, i.available))
      .collect();
    format!("Insufficient stock. {}", details.join("; "))
  }
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("{}", StockIssue::describe(.0))]
  InsufficientStock(Vec<StockIssue>),

  /// The order exists but is in a state that does not allow the request.
  #[error("State Conflict: {0}")]
  Conflict(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Webhook Signature Rejected: {0}")]
  WebhookSignature(String),

  /// A verified gateway event of a known type whose order cannot be resolved.
  #[error("Unresolved Payment Event: {0}")]
  UnresolvedPaymentEvent(String),

  #[error("Payment Gateway Error: {0}")]
  Gateway(String),

  #[error("Order number collision: {0}")]
  OrderNumberCollision(String),

  #[error("Email Delivery Error: {0}")]
  Email(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Orka Workflow Error: {source}")]
  Workflow {
    #[from]
    source: OrkaError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<AppError>() {
      Ok(app_err) => app_err,
      Err(err) => match err.downcast::<sqlx::Error>() {
        Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
        Err(other) => AppError::Internal(other.to_string()),
      },
    }
  }
}

impl From<reqwest::Error> for AppError {
  fn from(err: reqwest::Error) -> Self {
    AppError::Gateway(err.without_url().to_string())
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_)
      | AppError::InsufficientStock(_)
      | AppError::Conflict(_)
      | AppError::WebhookSignature(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::OrderNumberCollision(_) => StatusCode::CONFLICT,
      AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
      AppError::UnresolvedPaymentEvent(_)
      | AppError::Email(_)
      | AppError::Config(_)
      | AppError::Sqlx(_)
      | AppError::Workflow { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with error");
    }
    let mut builder = HttpResponse::build(status);
    match self {
      AppError::Validation(m) | AppError::Conflict(m) | AppError::Auth(m) | AppError::NotFound(m) => {
        builder.json(json!({"error": m}))
      }
      AppError::InsufficientStock(issues) => builder.json(json!({"error": self.to_string(), "stockIssues": issues})),
      AppError::WebhookSignature(_) => builder.json(json!({"error": "Webhook signature verification failed"})),
      AppError::UnresolvedPaymentEvent(m) => {
        builder.json(json!({"error": "Payment event could not be reconciled", "detail": m}))
      }
      AppError::Gateway(_) => builder.json(json!({"error": "Payment provider unavailable, please retry"})),
      AppError::OrderNumberCollision(_) => builder.json(json!({"error": "Order could not be created, please retry"})),
      AppError::Sqlx(_) => builder.json(json!({"error": "Database operation failed"})),
      AppError::Workflow { source } => {
        tracing::error!(orka_error_source = ?source, "Workflow error details");
        builder.json(json!({"error": "Workflow processing error"}))
      }
      AppError::Email(_) | AppError::Config(_) | AppError::Internal(_) => {
        builder.json(json!({"error": "An internal error occurred"}))
      }
    }
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
