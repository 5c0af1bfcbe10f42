// fulfillment/src/model/design_file.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A deliverable asset attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignFile {
  pub id: Uuid,
  pub product_id: String,
  pub file_name: String,
  pub file_url: String,
  pub file_type: String,
  pub file_size: u64,
  pub is_color_variant: bool,
  /// Set iff `is_color_variant`.
  #[serde(default)]
  pub color_variant_hex: Option<String>,
  /// Produced ad hoc for one order; never offered to other orders.
  #[serde(default)]
  pub is_for_order: bool,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
}

impl DesignFile {
  /// True when this file satisfies `query`.
  pub fn matches(&self, query: &DesignFileQuery) -> bool {
    if self.product_id != query.product_id
      || self.is_color_variant != query.is_color_variant
      || self.is_for_order != query.is_for_order()
      || self.is_active != query.is_active()
    {
      return false;
    }
    match (query.color_variant_hex(), &self.color_variant_hex) {
      (Some(wanted), Some(have)) => normalize_hex(have) == wanted,
      (Some(_), None) => false,
      (None, _) => true,
    }
  }
}

/// A catalog lookup used for auto-delivery decisions.
///
/// Only constructible through `general` and `color_variant`, so every query
/// excludes order-specific and inactive files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignFileQuery {
  product_id: String,
  is_color_variant: bool,
  // Already normalized, see `normalize_hex`.
  color_variant_hex: Option<String>,
}

impl DesignFileQuery {
  pub fn general(product_id: impl Into<String>) -> Self {
    Self {
      product_id: product_id.into(),
      is_color_variant: false,
      color_variant_hex: None,
    }
  }

  pub fn color_variant(product_id: impl Into<String>, hex: &str) -> Self {
    Self {
      product_id: product_id.into(),
      is_color_variant: true,
      color_variant_hex: Some(normalize_hex(hex)),
    }
  }

  pub fn product_id(&self) -> &str {
    &self.product_id
  }

  pub fn is_color_variant(&self) -> bool {
    self.is_color_variant
  }

  pub fn color_variant_hex(&self) -> Option<&str> {
    self.color_variant_hex.as_deref()
  }

  pub fn is_for_order(&self) -> bool {
    false
  }

  pub fn is_active(&self) -> bool {
    true
  }
}

/// Canonical form for color codes: trimmed, upper-case, with a leading `#`.
pub fn normalize_hex(hex: &str) -> String {
  let trimmed = hex.trim().trim_start_matches('#');
  format!("#{}", trimmed.to_ascii_uppercase())
}

/// Grants one order access to one design file. Unique on (order_id, design_file_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDesignFile {
  pub order_id: Uuid,
  pub design_file_id: Uuid,
  pub download_count: u32,
  pub last_downloaded_at: Option<DateTime<Utc>>,
  pub is_active: bool,
  pub granted_at: DateTime<Utc>,
}

impl OrderDesignFile {
  pub fn new(order_id: Uuid, design_file_id: Uuid, now: DateTime<Utc>) -> Self {
    Self {
      order_id,
      design_file_id,
      download_count: 0,
      last_downloaded_at: None,
      is_active: true,
      granted_at: now,
    }
  }
}
