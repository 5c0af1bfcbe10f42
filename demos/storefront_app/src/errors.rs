// storefront_app/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use fulfillment::{FulfillmentError, PipelineError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Webhook verification failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Download link expired: {0}")]
  Gone(String),

  #[error("Payment Processing Error: {0}")]
  Payment(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error(transparent)]
  Fulfillment(#[from] FulfillmentError),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

// Lets the webhook pipeline use AppError as its error type.
impl From<PipelineError> for AppError {
  fn from(err: PipelineError) -> Self {
    AppError::Fulfillment(FulfillmentError::Workflow(err))
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Gone(_) => StatusCode::GONE,
      AppError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
      AppError::Fulfillment(err) => match err {
        FulfillmentError::OrderNotFound { .. } | FulfillmentError::GrantNotFound { .. } => StatusCode::NOT_FOUND,
        // Payment is recorded; delivery finishes on replay.
        FulfillmentError::FulfillmentIncomplete { .. } => StatusCode::ACCEPTED,
        FulfillmentError::InvalidPayment(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
      },
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, status = status.as_u16(), "Responding with client error");
    }

    let body = match self {
      AppError::Sqlx(_) => json!({"error": "Database operation failed"}),
      AppError::Config(m) => json!({"error": "Configuration issue", "detail": m}),
      AppError::Internal(m) => json!({"error": "An internal error occurred", "detail": m}),
      AppError::Fulfillment(FulfillmentError::FulfillmentIncomplete { order_id, .. }) => json!({
        "status": "accepted",
        "orderId": order_id,
        "detail": "Payment recorded; delivery will be completed shortly."
      }),
      AppError::Fulfillment(err) if status.is_server_error() => {
        tracing::error!(fulfillment_error = ?err, "Fulfillment error details");
        json!({"error": "Fulfillment processing error", "detail": err.to_string()})
      }
      other => json!({"error": other.to_string()}),
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
