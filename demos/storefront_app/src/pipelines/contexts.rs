// storefront_app/src/pipelines/contexts.rs

use crate::services::paypal::TransmissionHeaders;
use actix_web::web::Bytes;
use fulfillment::{FulfillmentOrchestrator, FulfillmentReport};
use uuid::Uuid;

/// A capture the webhook confirmed, ready to hand to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPayment {
  pub order_id: Uuid,
  pub transaction_id: String,
  pub amount_cents: i64,
}

#[derive(Clone)]
pub struct PayPalWebhookCtxData {
  pub orchestrator: FulfillmentOrchestrator,
  pub webhook_id: Option<String>,
  pub raw_payload: Bytes,
  pub headers: TransmissionHeaders,

  // Filled in by the pipeline
  pub event_id: Option<String>,
  pub event_type: Option<String>,
  pub resource: Option<serde_json::Value>,
  pub capture: Option<CapturedPayment>,
  pub report: Option<FulfillmentReport>,
}

impl PayPalWebhookCtxData {
  pub fn new(
    orchestrator: FulfillmentOrchestrator,
    webhook_id: Option<String>,
    raw_payload: Bytes,
    headers: TransmissionHeaders,
  ) -> Self {
    Self {
      orchestrator,
      webhook_id,
      raw_payload,
      headers,
      event_id: None,
      event_type: None,
      resource: None,
      capture: None,
      report: None,
    }
  }
}
