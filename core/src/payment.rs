// fulfillment/src/payment.rs

use crate::model::{HistoryActor, PaymentClaim, PaymentStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the payment provider reports after capturing funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfirmation {
  pub transaction_id: String,
  pub amount_cents: i64,
  #[serde(default)]
  pub payer: Option<String>,
}

/// Captures money for an order. The fulfillment core only consumes the
/// confirmation; callers invoke the gateway themselves.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
  async fn capture(&self, order_ref: &str) -> anyhow::Result<CaptureConfirmation>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
  Capture,
  Webhook,
  FreeCheckout,
}

/// The event that triggers a fulfillment pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentContext {
  pub source: PaymentSource,
  pub transaction_id: Option<String>,
  pub amount_cents: i64,
  /// Payer email as reported by the provider.
  pub payer: Option<String>,
}

impl PaymentContext {
  pub fn captured(confirmation: CaptureConfirmation) -> Self {
    Self {
      source: PaymentSource::Capture,
      transaction_id: Some(confirmation.transaction_id),
      amount_cents: confirmation.amount_cents,
      payer: confirmation.payer,
    }
  }

  pub fn webhook(transaction_id: impl Into<String>, amount_cents: i64) -> Self {
    Self {
      source: PaymentSource::Webhook,
      transaction_id: Some(transaction_id.into()),
      amount_cents,
      payer: None,
    }
  }

  pub fn free_checkout() -> Self {
    Self {
      source: PaymentSource::FreeCheckout,
      transaction_id: None,
      amount_cents: 0,
      payer: None,
    }
  }

  pub fn is_free(&self) -> bool {
    self.amount_cents == 0
  }

  pub(crate) fn to_claim(&self) -> PaymentClaim {
    let (status, actor, note) = match (self.is_free(), self.source) {
      (true, _) => (PaymentStatus::Free, HistoryActor::Customer, "Free checkout confirmed".to_string()),
      (false, PaymentSource::Webhook) => (
        PaymentStatus::Paid,
        HistoryActor::PaymentProvider,
        "Payment confirmed by provider webhook".to_string(),
      ),
      (false, _) => (PaymentStatus::Paid, HistoryActor::PaymentProvider, "Payment captured".to_string()),
    };
    PaymentClaim {
      status,
      transaction_id: self.transaction_id.clone(),
      payer_email: self.payer.clone(),
      actor,
      note,
    }
  }
}
