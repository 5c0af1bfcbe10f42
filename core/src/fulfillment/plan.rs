// fulfillment/src/fulfillment/plan.rs

//! Turns a resolver verdict into the concrete writes a fulfillment pass makes.

use crate::model::{CustomizationStatus, DeliveryStatus, DesignFile, Order, OrderStatus};
use crate::resolver::{DeliveryVerdict, ResolutionReason};
use serde::Serialize;

pub const MISSING_CUSTOMIZATION_NOTE: &str =
  "Awaiting customization: missing customization data, please send us your customization details";
pub const PENDING_REVIEW_NOTE: &str = "Free order: customization submitted, pending admin review";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentOutcome {
  /// The payment was already settled, or the order is past the stage this
  /// call handles. Nothing changed.
  AlreadyProcessed,
  AutoCompleted,
  PartiallyDelivered,
  AwaitingCustomWork,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
  pub index: usize,
  pub product_name: String,
  pub target: DeliveryStatus,
  pub note: String,
  pub files: Vec<DesignFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPlan {
  pub items: Vec<PlannedItem>,
  pub order_status: OrderStatus,
  pub customization_status: CustomizationStatus,
  pub outcome: FulfillmentOutcome,
}

impl DeliveryPlan {
  /// Builds the plan for `order`.
  ///
  /// Free orders refine items the resolver sent to custom work: customers who
  /// supplied real customization wait for admin review, customizable products
  /// with no data at all ask the customer to provide it.
  pub fn from_verdict(order: &Order, verdict: &DeliveryVerdict, is_free_order: bool) -> Self {
    let items: Vec<PlannedItem> = verdict
      .items
      .iter()
      .map(|resolution| {
        if resolution.is_auto_deliverable() {
          return PlannedItem {
            index: resolution.index,
            product_name: resolution.product_name.clone(),
            target: DeliveryStatus::AutoDelivered,
            note: resolution.reason.to_string(),
            files: resolution.files().to_vec(),
          };
        }

        let (target, note) = match order.items.get(resolution.index) {
          Some(item) if is_free_order && resolution.reason != ResolutionReason::CatalogUnavailable => {
            if item.enable_customizations && item.has_real_customization() {
              (DeliveryStatus::PendingReview, PENDING_REVIEW_NOTE.to_string())
            } else if item.enable_customizations && item.selected_colors().is_empty() {
              (DeliveryStatus::AwaitingCustomization, MISSING_CUSTOMIZATION_NOTE.to_string())
            } else {
              (DeliveryStatus::AwaitingCustomization, resolution.reason.to_string())
            }
          }
          _ => (DeliveryStatus::AwaitingCustomization, resolution.reason.to_string()),
        };
        PlannedItem {
          index: resolution.index,
          product_name: resolution.product_name.clone(),
          target,
          note,
          files: Vec::new(),
        }
      })
      .collect();

    let delivered = items.iter().filter(|i| i.target == DeliveryStatus::AutoDelivered).count();
    let awaiting = items
      .iter()
      .filter(|i| i.target == DeliveryStatus::AwaitingCustomization)
      .count();

    let (order_status, customization_status) = if !items.is_empty() && delivered == items.len() {
      (OrderStatus::Completed, CustomizationStatus::Completed)
    } else if awaiting > 0 {
      (OrderStatus::AwaitingCustomization, CustomizationStatus::Pending)
    } else {
      // Only admin-review items (or nothing at all) left.
      (OrderStatus::Processing, CustomizationStatus::Pending)
    };

    let outcome = match order_status {
      OrderStatus::Completed => FulfillmentOutcome::AutoCompleted,
      _ if delivered > 0 => FulfillmentOutcome::PartiallyDelivered,
      _ => FulfillmentOutcome::AwaitingCustomWork,
    };

    Self {
      items,
      order_status,
      customization_status,
      outcome,
    }
  }

  pub fn delivered(&self) -> impl Iterator<Item = &PlannedItem> {
    self.items.iter().filter(|i| i.target == DeliveryStatus::AutoDelivered)
  }

  pub fn pending(&self) -> impl Iterator<Item = &PlannedItem> {
    self.items.iter().filter(|i| i.target != DeliveryStatus::AutoDelivered)
  }

  pub fn sends_files_ready(&self) -> bool {
    self.delivered().next().is_some()
  }

  pub fn sends_customization_processing(&self) -> bool {
    self.pending().next().is_some()
  }

  pub fn history_note(&self) -> String {
    let delivered = self.delivered().count();
    let pending = self.items.len() - delivered;
    match self.outcome {
      FulfillmentOutcome::AutoCompleted => format!("All {} item(s) auto-delivered", delivered),
      FulfillmentOutcome::PartiallyDelivered => {
        format!("{} item(s) auto-delivered, {} awaiting custom work", delivered, pending)
      }
      _ => format!("{} item(s) awaiting custom work", pending),
    }
  }
}
