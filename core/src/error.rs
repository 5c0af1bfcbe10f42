// fulfillment/src/error.rs
use anyhow::Error as AnyhowError;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Engine-level failures raised by `Pipeline` itself rather than by handlers.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Internal pipeline error: {0}")]
  Internal(String),
}

#[derive(Debug, Error)]
pub enum FulfillmentError {
  #[error("Order not found: {order_id}")]
  OrderNotFound { order_id: Uuid },

  #[error("Item index {index} out of range for order {order_number} ({len} items)")]
  ItemIndexOutOfRange {
    order_number: String,
    index: usize,
    len: usize,
  },

  #[error("Order {order_id} was modified concurrently (expected version {expected})")]
  VersionConflict { order_id: Uuid, expected: u64 },

  #[error("Persistence failure: {source}")]
  Persistence {
    #[source]
    source: AnyhowError,
  },

  #[error("Design file catalog lookup failed for product {product_id}: {source}")]
  CatalogLookup {
    product_id: String,
    #[source]
    source: AnyhowError,
  },

  #[error("No file access grant for order {order_id} and design file {design_file_id}")]
  GrantNotFound { order_id: Uuid, design_file_id: Uuid },

  #[error("Invalid payment: {0}")]
  InvalidPayment(String),

  #[error("Operation '{operation}' timed out after {after:?}")]
  Timeout { operation: String, after: Duration },

  /// Payment is recorded but delivery did not finish. The order has been
  /// parked in `processing` for a later replay.
  #[error("Fulfillment incomplete for order {order_id}: {source}")]
  FulfillmentIncomplete {
    order_id: Uuid,
    #[source]
    source: Box<FulfillmentError>,
  },

  #[error("Workflow error: {0}")]
  Workflow(#[from] PipelineError),
}

impl FulfillmentError {
  pub fn persistence(err: impl Into<AnyhowError>) -> Self {
    FulfillmentError::Persistence { source: err.into() }
  }

  /// Transient failures worth another attempt with backoff.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      FulfillmentError::VersionConflict { .. }
        | FulfillmentError::Persistence { .. }
        | FulfillmentError::CatalogLookup { .. }
        | FulfillmentError::Timeout { .. }
    )
  }
}

// Foreign failures reaching the core through `?` are storage problems unless
// they already carry a FulfillmentError.
impl From<AnyhowError> for FulfillmentError {
  fn from(err: AnyhowError) -> Self {
    match err.downcast::<FulfillmentError>() {
      Ok(inner) => inner,
      Err(other) => FulfillmentError::Persistence { source: other },
    }
  }
}

pub type FulfillmentResult<T, E = FulfillmentError> = std::result::Result<T, E>;
