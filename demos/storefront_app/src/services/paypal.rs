// storefront_app/src/services/paypal.rs

use async_trait::async_trait;
use fulfillment::{CaptureConfirmation, OrderStore, PaymentGateway};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const CAPTURE_COMPLETED: &str = "PAYMENT.CAPTURE.COMPLETED";

/// Stands in for the PayPal Orders API. The checkout created the PayPal order
/// with our order id as its reference, so the captured amount is the order total.
pub struct SimulatedPayPalGateway {
  orders: Arc<dyn OrderStore>,
  latency: Duration,
}

impl SimulatedPayPalGateway {
  pub fn new(orders: Arc<dyn OrderStore>) -> Self {
    Self {
      orders,
      latency: Duration::from_millis(50),
    }
  }
}

#[async_trait]
impl PaymentGateway for SimulatedPayPalGateway {
  #[instrument(skip(self))]
  async fn capture(&self, order_ref: &str) -> anyhow::Result<CaptureConfirmation> {
    let order_id = Uuid::parse_str(order_ref)?;
    let order = self.orders.load(order_id).await?;
    tokio::time::sleep(self.latency).await;

    // Arbitrary decline condition so the failure path can be exercised.
    if order.total_cents % 1000 == 123 {
      warn!(%order_id, "Simulated capture DECLINED");
      anyhow::bail!("capture declined by payment provider");
    }

    let transaction_id = format!("SIM{}", &Uuid::new_v4().simple().to_string()[..14].to_ascii_uppercase());
    info!(%order_id, %transaction_id, amount_cents = order.total_cents, "Simulated capture SUCCEEDED");
    Ok(CaptureConfirmation {
      transaction_id,
      amount_cents: order.total_cents,
      payer: Some(order.customer.email),
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
  pub id: Option<String>,
  pub event_type: String,
  #[serde(default)]
  pub resource: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct CaptureResource {
  pub id: String,
  pub custom_id: Option<String>,
  pub amount: Amount,
}

#[derive(Debug, Deserialize)]
pub struct Amount {
  pub value: String,
  #[serde(default)]
  pub currency_code: Option<String>,
}

/// Transmission headers PayPal attaches to every webhook delivery.
#[derive(Debug, Clone, Default)]
pub struct TransmissionHeaders {
  pub transmission_id: Option<String>,
  pub transmission_sig: Option<String>,
  pub cert_url: Option<String>,
}

impl TransmissionHeaders {
  // A real deployment posts these to PayPal's verify-webhook-signature API
  // together with the webhook id; the simulation only requires their presence.
  pub fn verify(&self, webhook_id: &str) -> Result<(), String> {
    let missing: Vec<&str> = [
      ("paypal-transmission-id", &self.transmission_id),
      ("paypal-transmission-sig", &self.transmission_sig),
      ("paypal-cert-url", &self.cert_url),
    ]
    .iter()
    .filter(|(_, v)| v.as_deref().map_or(true, str::is_empty))
    .map(|(name, _)| *name)
    .collect();
    if missing.is_empty() {
      info!(webhook_id, "Webhook transmission headers present (simulated verification)");
      Ok(())
    } else {
      Err(format!("missing headers: {}", missing.join(", ")))
    }
  }
}

/// Parses a decimal amount such as `"12.30"` into cents.
pub fn parse_amount_cents(value: &str) -> Option<i64> {
  let value = value.trim();
  let (whole, frac) = match value.split_once('.') {
    Some((w, f)) => (w, f),
    None => (value, ""),
  };
  if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) || frac.len() > 2 {
    return None;
  }
  if !frac.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  let whole: i64 = whole.parse().ok()?;
  let frac: i64 = match frac.len() {
    0 => 0,
    1 => frac.parse::<i64>().ok()? * 10,
    _ => frac.parse().ok()?,
  };
  whole.checked_mul(100)?.checked_add(frac)
}
