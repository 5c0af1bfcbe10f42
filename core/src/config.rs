// fulfillment/src/config.rs

use crate::retry::RetryPolicy;
use std::time::Duration;

/// Settings injected into the orchestrator at construction.
#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
  /// Public origin the download links point at, without a trailing slash.
  pub download_base_url: String,
  /// How long download links stay valid after delivery.
  pub download_link_ttl: chrono::Duration,
  /// Per-attempt bound on each notifier call.
  pub notify_timeout: Duration,
  pub notify_retry: RetryPolicy,
  /// Governs the reload-apply-save unit and grant writes.
  pub persistence_retry: RetryPolicy,
}

impl Default for FulfillmentConfig {
  fn default() -> Self {
    Self {
      download_base_url: "http://localhost:8080".to_string(),
      download_link_ttl: chrono::Duration::days(30),
      notify_timeout: Duration::from_secs(10),
      notify_retry: RetryPolicy::default(),
      persistence_retry: RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(500),
      },
    }
  }
}

impl FulfillmentConfig {
  pub fn download_link(&self, order_id: uuid::Uuid, design_file_id: uuid::Uuid) -> String {
    format!(
      "{}/api/v1/downloads/{}/{}",
      self.download_base_url.trim_end_matches('/'),
      order_id,
      design_file_id
    )
  }
}
