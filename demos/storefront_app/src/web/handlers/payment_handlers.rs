// storefront_app/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::state::AppState;
use fulfillment::PaymentContext;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
  /// Provider-side order reference; defaults to our order id.
  pub provider_order_id: Option<String>,
}

#[instrument(name = "handler::capture_payment", skip(app_state, body))]
pub async fn capture_payment_handler(
  app_state: web::Data<AppState>,
  order_id: web::Path<Uuid>,
  body: Option<web::Json<CaptureRequest>>,
) -> AppResult<HttpResponse> {
  let order_id = order_id.into_inner();
  let order_ref = body
    .and_then(|b| b.into_inner().provider_order_id)
    .unwrap_or_else(|| order_id.to_string());

  let confirmation = app_state
    .gateway
    .capture(&order_ref)
    .await
    .map_err(|e| AppError::Payment(e.to_string()))?;
  info!(%order_id, transaction_id = %confirmation.transaction_id, "Payment captured; fulfilling order.");

  let report = app_state
    .orchestrator
    .fulfill(order_id, PaymentContext::captured(confirmation))
    .await?;
  Ok(HttpResponse::Ok().json(report))
}

#[instrument(name = "handler::free_checkout", skip(app_state))]
pub async fn free_checkout_handler(app_state: web::Data<AppState>, order_id: web::Path<Uuid>) -> AppResult<HttpResponse> {
  let report = app_state
    .orchestrator
    .fulfill(order_id.into_inner(), PaymentContext::free_checkout())
    .await?;
  Ok(HttpResponse::Ok().json(report))
}
