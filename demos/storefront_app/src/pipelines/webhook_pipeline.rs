// storefront_app/src/pipelines/webhook_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::pipelines::contexts::{CapturedPayment, PayPalWebhookCtxData};
use crate::services::paypal::{parse_amount_cents, CaptureResource, WebhookEvent, CAPTURE_COMPLETED};
use fulfillment::{ContextData, PaymentContext, Pipeline, PipelineControl, SkipCondition};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

type Ctx = ContextData<PayPalWebhookCtxData>;

// Verification needs a configured webhook id; without one the step is skipped
// and every unverified delivery is logged.
fn without_webhook_id() -> SkipCondition<PayPalWebhookCtxData> {
  Arc::new(|ctx: Ctx| {
    let guard = ctx.read();
    if guard.webhook_id.is_some() {
      return false;
    }
    warn!(
      transmission_id = ?guard.headers.transmission_id,
      "PAYPAL_WEBHOOK_ID is not configured; accepting webhook without signature verification."
    );
    true
  })
}

pub fn build_paypal_webhook_pipeline() -> Pipeline<PayPalWebhookCtxData, AppError> {
  let mut p = Pipeline::<PayPalWebhookCtxData, AppError>::new(&[
    ("verify_webhook_signature", false, Some(without_webhook_id())),
    ("parse_webhook_event", false, None),
    ("extract_capture", false, None),
    ("fulfill_order", false, None),
  ]);

  p.on_root("verify_webhook_signature", verify_webhook_signature);
  p.on_root("parse_webhook_event", parse_webhook_event);
  p.on_root("extract_capture", extract_capture);
  p.on_root("fulfill_order", fulfill_order);
  p
}

async fn verify_webhook_signature(ctx: Ctx) -> AppResult<PipelineControl> {
  let (headers, webhook_id) = {
    let guard = ctx.read();
    (guard.headers.clone(), guard.webhook_id.clone().unwrap_or_default())
  };
  headers.verify(&webhook_id).map_err(AppError::Auth)?;
  Ok(PipelineControl::Continue)
}

async fn parse_webhook_event(ctx: Ctx) -> AppResult<PipelineControl> {
  let raw = ctx.read().raw_payload.clone();
  let event: WebhookEvent =
    serde_json::from_slice(&raw).map_err(|e| AppError::Validation(format!("Invalid webhook payload: {}", e)))?;

  info!(event_id = ?event.id, event_type = %event.event_type, "PayPal webhook received.");
  let relevant = event.event_type == CAPTURE_COMPLETED;

  let mut guard = ctx.write();
  guard.event_id = event.id;
  guard.event_type = Some(event.event_type);
  if !relevant {
    // Acknowledged, nothing to do.
    return Ok(PipelineControl::Stop);
  }
  guard.resource = Some(event.resource);
  Ok(PipelineControl::Continue)
}

async fn extract_capture(ctx: Ctx) -> AppResult<PipelineControl> {
  let resource = ctx.read().resource.clone().unwrap_or_default();
  let capture = capture_from_resource(resource)?;
  info!(order_id = %capture.order_id, transaction_id = %capture.transaction_id, amount_cents = capture.amount_cents, "Capture extracted from webhook.");
  ctx.write().capture = Some(capture);
  Ok(PipelineControl::Continue)
}

pub(crate) fn capture_from_resource(resource: serde_json::Value) -> AppResult<CapturedPayment> {
  let resource: CaptureResource =
    serde_json::from_value(resource).map_err(|e| AppError::Validation(format!("Malformed capture resource: {}", e)))?;

  let custom_id = resource
    .custom_id
    .as_deref()
    .ok_or_else(|| AppError::Validation("Capture has no custom_id order reference".to_string()))?;
  let order_id = Uuid::parse_str(custom_id.trim())
    .map_err(|e| AppError::Validation(format!("custom_id '{}' is not an order id: {}", custom_id, e)))?;
  let amount_cents = parse_amount_cents(&resource.amount.value)
    .ok_or_else(|| AppError::Validation(format!("Invalid capture amount '{}'", resource.amount.value)))?;
  if let Some(currency) = resource.amount.currency_code.as_deref() {
    if currency != "USD" {
      warn!(%order_id, currency, "Capture in unexpected currency.");
    }
  }

  Ok(CapturedPayment {
    order_id,
    transaction_id: resource.id,
    amount_cents,
  })
}

async fn fulfill_order(ctx: Ctx) -> AppResult<PipelineControl> {
  let (orchestrator, capture) = {
    let guard = ctx.read();
    (guard.orchestrator.clone(), guard.capture.clone())
  };
  let capture = capture.ok_or_else(|| AppError::Internal("capture missing from webhook context".to_string()))?;

  let report = orchestrator
    .fulfill(
      capture.order_id,
      PaymentContext::webhook(capture.transaction_id, capture.amount_cents),
    )
    .await?;
  ctx.write().report = Some(report);
  Ok(PipelineControl::Continue)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::services::paypal::TransmissionHeaders;
  use actix_web::web::Bytes;
  use fulfillment::{
    FulfillmentConfig, FulfillmentOrchestrator, LogNotifier, MemoryDesignFileCatalog, MemoryGrantStore,
    MemoryOrderStore, PipelineResult,
  };
  use serde_json::json;

  #[test]
  fn capture_requires_an_order_reference() {
    let err = capture_from_resource(json!({"id": "CAP-1", "amount": {"value": "5.00"}})).unwrap_err();
    assert!(matches!(err, AppError::Validation(m) if m.contains("custom_id")));
  }

  #[test]
  fn capture_is_extracted() {
    let order_id = Uuid::new_v4();
    let capture = capture_from_resource(json!({
      "id": "CAP-2",
      "custom_id": order_id.to_string(),
      "amount": {"value": "42.50", "currency_code": "USD"}
    }))
    .unwrap();
    assert_eq!(
      capture,
      CapturedPayment {
        order_id,
        transaction_id: "CAP-2".into(),
        amount_cents: 4250
      }
    );
  }

  #[test]
  fn bad_amount_is_rejected() {
    let err = capture_from_resource(json!({
      "id": "CAP-3",
      "custom_id": Uuid::new_v4().to_string(),
      "amount": {"value": "12,00"}
    }))
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
  }

  fn ctx(webhook_id: Option<&str>, payload: serde_json::Value) -> Ctx {
    let orchestrator = FulfillmentOrchestrator::new(
      Arc::new(MemoryOrderStore::new()),
      Arc::new(MemoryDesignFileCatalog::new()),
      Arc::new(MemoryGrantStore::new()),
      Arc::new(LogNotifier),
      FulfillmentConfig::default(),
    );
    ContextData::new(PayPalWebhookCtxData::new(
      orchestrator,
      webhook_id.map(str::to_string),
      Bytes::from(payload.to_string()),
      TransmissionHeaders::default(),
    ))
  }

  #[tokio::test]
  async fn unsigned_delivery_is_rejected_when_webhook_id_is_configured() {
    let pipeline = build_paypal_webhook_pipeline();
    let ctx = ctx(Some("WH-1"), json!({"event_type": "PAYMENT.CAPTURE.DENIED", "resource": {}}));
    let err = pipeline.run(ctx.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::Auth(m) if m.contains("paypal-transmission-sig")));
    assert!(ctx.read().event_type.is_none());
  }

  #[tokio::test]
  async fn verification_is_skipped_without_webhook_id() {
    let pipeline = build_paypal_webhook_pipeline();
    let ctx = ctx(None, json!({"event_type": "PAYMENT.CAPTURE.DENIED", "resource": {}}));
    let result = pipeline.run(ctx.clone()).await.unwrap();
    assert_eq!(result, PipelineResult::Stopped);
    assert_eq!(ctx.read().event_type.as_deref(), Some("PAYMENT.CAPTURE.DENIED"));
  }

  #[test]
  fn pipeline_declares_steps_in_order() {
    let p = build_paypal_webhook_pipeline();
    assert_eq!(
      p.step_names(),
      vec!["verify_webhook_signature", "parse_webhook_event", "extract_capture", "fulfill_order"]
    );
  }
}
