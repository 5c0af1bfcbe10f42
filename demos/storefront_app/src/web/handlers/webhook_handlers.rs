// storefront_app/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::Result as AppResult;
use crate::pipelines::PayPalWebhookCtxData;
use crate::services::paypal::TransmissionHeaders;
use crate::state::AppState;
use fulfillment::{ContextData, PipelineResult};

fn header(req: &HttpRequest, name: &str) -> Option<String> {
  req
    .headers()
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(String::from)
}

#[instrument(name = "handler::paypal_webhook", skip(app_state, req, body), fields(payload_bytes = body.len()))]
pub async fn paypal_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> AppResult<HttpResponse> {
  let headers = TransmissionHeaders {
    transmission_id: header(&req, "paypal-transmission-id"),
    transmission_sig: header(&req, "paypal-transmission-sig"),
    cert_url: header(&req, "paypal-cert-url"),
  };
  let ctx = ContextData::new(PayPalWebhookCtxData::new(
    app_state.orchestrator.clone(),
    app_state.config.paypal_webhook_id.clone(),
    body,
    headers,
  ));

  let result = app_state.webhook_pipeline.run(ctx.clone()).await?;
  let guard = ctx.read();
  match (result, &guard.report) {
    (PipelineResult::Completed, Some(report)) => {
      info!(order_id = %report.order_id, outcome = ?report.outcome, "PayPal capture handled.");
      Ok(HttpResponse::Ok().json(json!({"status": "processed", "report": report})))
    }
    _ => {
      info!(event_type = ?guard.event_type, "PayPal webhook acknowledged without action.");
      Ok(HttpResponse::Ok().json(json!({"status": "ignored", "eventType": guard.event_type})))
    }
  }
}
