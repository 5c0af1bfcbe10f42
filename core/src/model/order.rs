// fulfillment/src/model/order.rs

use crate::error::{FulfillmentError, FulfillmentResult};
use crate::model::customization::{ColorSelection, Customizations};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
  Pending,
  Paid,
  Free,
  Failed,
  Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  Pending,
  Processing,
  AwaitingCustomization,
  Completed,
  Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomizationStatus {
  None,
  Pending,
  Processing,
  Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
  Pending,
  AutoDelivered,
  AwaitingCustomization,
  /// Free orders whose customer supplied real customization; an admin looks first.
  PendingReview,
}

macro_rules! status_str {
  ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
    impl $ty {
      pub fn as_str(&self) -> &'static str {
        match self {
          $(Self::$variant => $text,)+
        }
      }

      pub fn parse(value: &str) -> Option<Self> {
        match value {
          $($text => Some(Self::$variant),)+
          _ => None,
        }
      }
    }

    impl fmt::Display for $ty {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
      }
    }
  };
}

status_str!(PaymentStatus {
  Pending => "pending",
  Paid => "paid",
  Free => "free",
  Failed => "failed",
  Refunded => "refunded",
});

status_str!(OrderStatus {
  Pending => "pending",
  Processing => "processing",
  AwaitingCustomization => "awaiting_customization",
  Completed => "completed",
  Cancelled => "cancelled",
});

status_str!(CustomizationStatus {
  None => "none",
  Pending => "pending",
  Processing => "processing",
  Completed => "completed",
});

status_str!(DeliveryStatus {
  Pending => "pending",
  AutoDelivered => "auto_delivered",
  AwaitingCustomization => "awaiting_customization",
  PendingReview => "pending_review",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
  pub id: Uuid,
  pub name: String,
  pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryActor {
  System,
  Customer,
  Admin,
  PaymentProvider,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
  pub status: OrderStatus,
  pub timestamp: DateTime<Utc>,
  pub note: String,
  pub actor: HistoryActor,
}

/// One purchased line. Product fields are snapshots taken at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub product_id: String,
  pub product_name: String,
  pub quantity: u32,
  pub unit_price_cents: i64,
  /// Whether the product supported customization when the order was placed.
  /// Delivery decisions trust this snapshot over the live product.
  pub enable_customizations: bool,
  #[serde(default)]
  pub customizations: Option<Customizations>,
  /// Client-asserted; informational only.
  #[serde(default)]
  pub has_customizations: bool,
  pub delivery_status: DeliveryStatus,
  #[serde(default)]
  pub delivery_notes: Option<String>,
}

impl OrderItem {
  pub fn new(product_id: impl Into<String>, product_name: impl Into<String>, quantity: u32, unit_price_cents: i64) -> Self {
    Self {
      product_id: product_id.into(),
      product_name: product_name.into(),
      quantity,
      unit_price_cents,
      enable_customizations: false,
      customizations: None,
      has_customizations: false,
      delivery_status: DeliveryStatus::Pending,
      delivery_notes: None,
    }
  }

  pub fn customizable(mut self) -> Self {
    self.enable_customizations = true;
    self
  }

  pub fn with_customizations(mut self, customizations: Customizations) -> Self {
    self.has_customizations = true;
    self.customizations = Some(customizations);
    self
  }

  pub fn selected_colors(&self) -> &[ColorSelection] {
    self
      .customizations
      .as_ref()
      .map(|c| c.colors.as_slice())
      .unwrap_or(&[])
  }

  pub fn has_real_customization(&self) -> bool {
    self
      .customizations
      .as_ref()
      .map_or(false, Customizations::has_real_customization)
  }

  pub fn line_total_cents(&self) -> i64 {
    self.unit_price_cents * i64::from(self.quantity)
  }
}

/// What a confirmed payment writes onto the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentClaim {
  pub status: PaymentStatus,
  pub transaction_id: Option<String>,
  pub payer_email: Option<String>,
  pub actor: HistoryActor,
  pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
  #[error("order is completed but item {index} is {status}")]
  CompletedWithUndeliveredItem { index: usize, status: DeliveryStatus },
  #[error("order is awaiting customization but no item is")]
  AwaitingWithoutPendingItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub order_number: String,
  pub customer: Customer,
  pub items: Vec<OrderItem>,
  pub subtotal_cents: i64,
  pub promo_discount_cents: i64,
  pub total_cents: i64,
  pub payment_status: PaymentStatus,
  pub order_status: OrderStatus,
  pub customization_status: CustomizationStatus,
  pub transaction_id: Option<String>,
  pub paid_at: Option<DateTime<Utc>>,
  pub payer_email: Option<String>,
  pub download_expires_at: Option<DateTime<Utc>>,
  pub order_history: Vec<HistoryEntry>,
  /// Bumped by the store on every successful save.
  pub version: u64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  /// A freshly checked-out, unpaid order.
  pub fn new(order_number: impl Into<String>, customer: Customer, items: Vec<OrderItem>, now: DateTime<Utc>) -> Self {
    let subtotal: i64 = items.iter().map(OrderItem::line_total_cents).sum();
    let mut order = Self {
      id: Uuid::new_v4(),
      order_number: order_number.into(),
      customer,
      items,
      subtotal_cents: subtotal,
      promo_discount_cents: 0,
      total_cents: subtotal,
      payment_status: PaymentStatus::Pending,
      order_status: OrderStatus::Pending,
      customization_status: CustomizationStatus::None,
      transaction_id: None,
      paid_at: None,
      payer_email: None,
      download_expires_at: None,
      order_history: Vec::new(),
      version: 0,
      created_at: now,
      updated_at: now,
    };
    order.append_history(OrderStatus::Pending, "Order placed", HistoryActor::Customer, now);
    order
  }

  /// Applies a promo code; the total never drops below zero.
  pub fn with_promo_discount(mut self, discount_cents: i64) -> Self {
    self.promo_discount_cents = discount_cents.max(0);
    self.total_cents = (self.subtotal_cents - self.promo_discount_cents).max(0);
    self
  }

  pub fn is_payment_settled(&self) -> bool {
    matches!(self.payment_status, PaymentStatus::Paid | PaymentStatus::Free)
  }

  /// Nothing captured yet (or the last attempt failed) and not cancelled.
  /// Refunded and cancelled orders never take a payment again.
  pub fn accepts_payment(&self) -> bool {
    matches!(self.payment_status, PaymentStatus::Pending | PaymentStatus::Failed)
      && self.order_status != OrderStatus::Cancelled
  }

  pub fn is_free_checkout(&self) -> bool {
    self.total_cents == 0
  }

  /// Paid, still `processing`, and no delivery decision written yet. This is
  /// where an interrupted pass leaves an order.
  pub fn awaits_delivery_pass(&self) -> bool {
    self.is_payment_settled()
      && self.order_status == OrderStatus::Processing
      && (self.items.is_empty() || self.items.iter().any(|i| i.delivery_status == DeliveryStatus::Pending))
  }

  pub fn append_history(&mut self, status: OrderStatus, note: impl Into<String>, actor: HistoryActor, now: DateTime<Utc>) {
    self.order_history.push(HistoryEntry {
      status,
      timestamp: now,
      note: note.into(),
      actor,
    });
    self.updated_at = now;
  }

  /// Records a confirmed payment and moves the order into `processing`.
  pub fn record_payment(&mut self, claim: &PaymentClaim, now: DateTime<Utc>) {
    self.payment_status = claim.status;
    self.transaction_id = claim.transaction_id.clone();
    self.payer_email = claim.payer_email.clone();
    self.paid_at = Some(now);
    self.order_status = OrderStatus::Processing;
    self.append_history(OrderStatus::Processing, claim.note.clone(), claim.actor, now);
  }

  /// Sets both order-level statuses and logs the transition.
  pub fn transition(
    &mut self,
    order_status: OrderStatus,
    customization_status: CustomizationStatus,
    note: impl Into<String>,
    actor: HistoryActor,
    now: DateTime<Utc>,
  ) {
    self.order_status = order_status;
    self.customization_status = customization_status;
    self.append_history(order_status, note, actor, now);
  }

  pub fn mark_item_auto_delivered(
    &mut self,
    index: usize,
    note: impl Into<String>,
    now: DateTime<Utc>,
  ) -> FulfillmentResult<bool> {
    self.mark_item(index, DeliveryStatus::AutoDelivered, note.into(), now)
  }

  pub fn mark_item_awaiting_customization(
    &mut self,
    index: usize,
    note: impl Into<String>,
    now: DateTime<Utc>,
  ) -> FulfillmentResult<bool> {
    self.mark_item(index, DeliveryStatus::AwaitingCustomization, note.into(), now)
  }

  pub fn mark_item_pending_review(
    &mut self,
    index: usize,
    note: impl Into<String>,
    now: DateTime<Utc>,
  ) -> FulfillmentResult<bool> {
    self.mark_item(index, DeliveryStatus::PendingReview, note.into(), now)
  }

  // Re-applying the current value is a no-op so replayed passes converge.
  fn mark_item(&mut self, index: usize, status: DeliveryStatus, note: String, now: DateTime<Utc>) -> FulfillmentResult<bool> {
    let len = self.items.len();
    let item = self
      .items
      .get_mut(index)
      .ok_or_else(|| FulfillmentError::ItemIndexOutOfRange {
        order_number: self.order_number.clone(),
        index,
        len,
      })?;

    if item.delivery_status == status && item.delivery_notes.as_deref() == Some(note.as_str()) {
      return Ok(false);
    }

    let entry = format!("Item {} ({}) {}: {}", index + 1, item.product_name, status, note);
    item.delivery_status = status;
    item.delivery_notes = Some(note);
    let order_status = self.order_status;
    self.append_history(order_status, entry, HistoryActor::System, now);
    Ok(true)
  }

  /// Checks the status invariants, reporting the first one broken.
  pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
    match self.order_status {
      OrderStatus::Completed => {
        if let Some((index, item)) = self
          .items
          .iter()
          .enumerate()
          .find(|(_, item)| item.delivery_status != DeliveryStatus::AutoDelivered)
        {
          return Err(InvariantViolation::CompletedWithUndeliveredItem {
            index,
            status: item.delivery_status,
          });
        }
      }
      OrderStatus::AwaitingCustomization => {
        if !self
          .items
          .iter()
          .any(|item| item.delivery_status == DeliveryStatus::AwaitingCustomization)
        {
          return Err(InvariantViolation::AwaitingWithoutPendingItem);
        }
      }
      _ => {}
    }
    Ok(())
  }
}
