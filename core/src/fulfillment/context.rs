// fulfillment/src/fulfillment/context.rs

//! Data shared by the steps of one fulfillment run.

use crate::config::FulfillmentConfig;
use crate::fulfillment::plan::{DeliveryPlan, FulfillmentOutcome};
use crate::model::Order;
use crate::notify::{DownloadLink, NotificationSummary, Notifier};
use crate::payment::PaymentContext;
use crate::resolver::{DeliveryResolver, DeliveryVerdict};
use crate::store::{DesignFileCatalog, GrantStore, OrderStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Collaborators wired into every run.
pub struct FulfillmentServices {
  pub orders: Arc<dyn OrderStore>,
  pub catalog: Arc<dyn DesignFileCatalog>,
  pub grants: Arc<dyn GrantStore>,
  pub notifier: Arc<dyn Notifier>,
  pub resolver: DeliveryResolver,
  pub config: FulfillmentConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillmentMode {
  /// Triggered by a payment event; claims the payment first.
  Payment,
  /// Admin replay of an order left in `processing`.
  Redelivery,
}

#[derive(Clone)]
pub struct FulfillmentCtxData {
  pub services: Arc<FulfillmentServices>,
  pub order_id: Uuid,
  pub mode: FulfillmentMode,
  pub payment: Option<PaymentContext>,
  pub now: DateTime<Utc>,

  /// Latest copy of the order as saved by this run.
  pub order: Option<Order>,
  /// Set once the order is committed to this run; a failure past this point
  /// parks the order for replay.
  pub recovery_armed: bool,
  pub is_free_order: bool,
  pub verdict: Option<DeliveryVerdict>,
  pub plan: Option<DeliveryPlan>,
  pub grants_created: usize,
  pub download_links: Vec<DownloadLink>,
  pub notifications: NotificationSummary,
  /// Set when the run ends early without delivering anything.
  pub short_circuit: Option<FulfillmentOutcome>,
}

impl FulfillmentCtxData {
  pub fn new(
    services: Arc<FulfillmentServices>,
    order_id: Uuid,
    mode: FulfillmentMode,
    payment: Option<PaymentContext>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      services,
      order_id,
      mode,
      payment,
      now,
      order: None,
      recovery_armed: false,
      is_free_order: false,
      verdict: None,
      plan: None,
      grants_created: 0,
      download_links: Vec::new(),
      notifications: NotificationSummary::default(),
      short_circuit: None,
    }
  }
}
