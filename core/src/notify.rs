// fulfillment/src/notify.rs

//! Outbound customer and admin notifications.
//!
//! Delivery outcomes never depend on these calls; `dispatch` bounds each one
//! with a timeout and swallows whatever goes wrong.

use crate::error::FulfillmentError;
use crate::retry::{retry_with_backoff, RetryPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
  pub product_name: String,
  pub file_name: String,
  pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedOrderEmail {
  pub order_number: String,
  pub customer_name: String,
  pub download_links: Vec<DownloadLink>,
  pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingItem {
  pub product_name: String,
  pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationProcessingEmail {
  pub order_number: String,
  pub customer_name: String,
  pub pending_items: Vec<PendingItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderNotification {
  pub order_id: Uuid,
  pub order_number: String,
  pub is_free_order: bool,
  pub has_customizations: bool,
  pub auto_completed: bool,
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
  async fn send_completed_order_email(&self, customer_email: &str, email: &CompletedOrderEmail) -> anyhow::Result<()>;

  async fn send_customization_processing_email(
    &self,
    customer_email: &str,
    email: &CustomizationProcessingEmail,
  ) -> anyhow::Result<()>;

  async fn send_admin_new_order_notification(&self, notification: &AdminOrderNotification) -> anyhow::Result<()>;
}

/// Writes notifications to the trace log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
  async fn send_completed_order_email(&self, customer_email: &str, email: &CompletedOrderEmail) -> anyhow::Result<()> {
    info!(
      to = customer_email,
      order_number = %email.order_number,
      links = email.download_links.len(),
      expires_at = %email.expires_at,
      "Files-ready email."
    );
    Ok(())
  }

  async fn send_customization_processing_email(
    &self,
    customer_email: &str,
    email: &CustomizationProcessingEmail,
  ) -> anyhow::Result<()> {
    info!(
      to = customer_email,
      order_number = %email.order_number,
      pending = email.pending_items.len(),
      "Customization-in-progress email."
    );
    Ok(())
  }

  async fn send_admin_new_order_notification(&self, n: &AdminOrderNotification) -> anyhow::Result<()> {
    info!(
      order_id = %n.order_id,
      order_number = %n.order_number,
      is_free_order = n.is_free_order,
      has_customizations = n.has_customizations,
      auto_completed = n.auto_completed,
      "Admin new-order notification."
    );
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  CompletedOrder,
  CustomizationProcessing,
  AdminNewOrder,
}

impl NotificationKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      NotificationKind::CompletedOrder => "completed_order_email",
      NotificationKind::CustomizationProcessing => "customization_processing_email",
      NotificationKind::AdminNewOrder => "admin_new_order_notification",
    }
  }
}

impl fmt::Display for NotificationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationSummary {
  pub sent: Vec<NotificationKind>,
  pub failed: Vec<NotificationKind>,
}

impl NotificationSummary {
  pub fn record(&mut self, kind: NotificationKind, delivered: bool) {
    if delivered {
      self.sent.push(kind);
    } else {
      self.failed.push(kind);
    }
  }

  pub fn was_sent(&self, kind: NotificationKind) -> bool {
    self.sent.contains(&kind)
  }
}

/// Runs one notifier call under `timeout` per attempt with retries. Returns
/// whether it eventually went through; errors are logged, never returned.
pub async fn dispatch<F, Fut>(kind: NotificationKind, timeout: Duration, policy: &RetryPolicy, mut send: F) -> bool
where
  F: FnMut() -> Fut,
  Fut: Future<Output = anyhow::Result<()>>,
{
  let outcome = retry_with_backoff(policy, kind.as_str(), |_: &anyhow::Error| true, || {
    let attempt = send();
    async move {
      match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::Error::new(FulfillmentError::Timeout {
          operation: kind.as_str().to_string(),
          after: timeout,
        })),
      }
    }
  })
  .await;

  match outcome {
    Ok(()) => true,
    Err(e) => {
      warn!(notification = %kind, error = %e, "Notification failed; continuing without it.");
      false
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn quick() -> RetryPolicy {
    RetryPolicy {
      max_attempts: 2,
      base_delay: Duration::from_millis(1),
      max_delay: Duration::from_millis(1),
    }
  }

  #[tokio::test]
  async fn slow_notifier_times_out_and_is_swallowed() {
    let calls = AtomicU32::new(0);
    let ok = dispatch(NotificationKind::AdminNewOrder, Duration::from_millis(5), &quick(), || {
      calls.fetch_add(1, Ordering::SeqCst);
      async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(())
      }
    })
    .await;
    assert!(!ok);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn successful_send_reports_true() {
    let ok = dispatch(NotificationKind::CompletedOrder, Duration::from_secs(1), &quick(), || async { Ok(()) }).await;
    assert!(ok);
  }

  #[test]
  fn summary_tracks_both_sides() {
    let mut summary = NotificationSummary::default();
    summary.record(NotificationKind::CompletedOrder, true);
    summary.record(NotificationKind::AdminNewOrder, false);
    assert!(summary.was_sent(NotificationKind::CompletedOrder));
    assert!(!summary.was_sent(NotificationKind::AdminNewOrder));
    assert_eq!(summary.failed, vec![NotificationKind::AdminNewOrder]);
  }
}
