// storefront_app/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use fulfillment::FulfillmentConfig;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  /// Public base URL; download links in customer emails point here.
  pub app_base_url: String,

  pub download_link_ttl_days: i64,
  pub notify_timeout: Duration,

  pub mail_sender: String,
  pub admin_email: String,

  /// When set, PayPal webhooks must carry transmission headers.
  pub paypal_webhook_id: Option<String>,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the config from any variable source; `from_env` passes the process environment.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| {
      lookup(var_name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|_| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url = get_env("DATABASE_URL")?;
    let app_base_url = get_env("APP_BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port));

    let download_link_ttl_days = get_env("DOWNLOAD_LINK_TTL_DAYS")
      .unwrap_or_else(|_| "30".to_string())
      .parse::<i64>()
      .map_err(|e| AppError::Config(format!("Invalid DOWNLOAD_LINK_TTL_DAYS: {}", e)))?;
    if download_link_ttl_days <= 0 {
      return Err(AppError::Config("DOWNLOAD_LINK_TTL_DAYS must be positive".to_string()));
    }
    let notify_timeout_ms = get_env("NOTIFY_TIMEOUT_MS")
      .unwrap_or_else(|_| "10000".to_string())
      .parse::<u64>()
      .map_err(|e| AppError::Config(format!("Invalid NOTIFY_TIMEOUT_MS: {}", e)))?;

    let mail_sender = get_env("MAIL_SENDER").unwrap_or_else(|_| "orders@example.com".to_string());
    let admin_email = get_env("ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string());
    let paypal_webhook_id = get_env("PAYPAL_WEBHOOK_ID").ok();

    tracing::info!("Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      database_url,
      app_base_url: app_base_url.trim_end_matches('/').to_string(),
      download_link_ttl_days,
      notify_timeout: Duration::from_millis(notify_timeout_ms),
      mail_sender,
      admin_email,
      paypal_webhook_id,
    })
  }

  pub fn fulfillment_config(&self) -> FulfillmentConfig {
    FulfillmentConfig {
      download_base_url: self.app_base_url.clone(),
      download_link_ttl: chrono::Duration::days(self.download_link_ttl_days),
      notify_timeout: self.notify_timeout,
      ..FulfillmentConfig::default()
    }
  }
}
