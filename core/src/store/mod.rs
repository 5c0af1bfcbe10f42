// fulfillment/src/store/mod.rs

//! Persistence and catalog contracts consumed by the resolver and orchestrator.
//!
//! In-memory implementations live in `memory`; SQL-backed ones belong to the
//! hosting application.

pub mod memory;

use crate::error::{FulfillmentError, FulfillmentResult};
use crate::model::{DesignFile, DesignFileQuery, Order, OrderDesignFile, PaymentClaim};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

pub use memory::{MemoryDesignFileCatalog, MemoryGrantStore, MemoryOrderStore};

/// Bound on the reload/re-check loop of the default `claim_payment`.
const CLAIM_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub enum PaymentClaimOutcome {
  /// This caller recorded the payment; carries the saved order.
  Claimed(Order),
  /// The order no longer accepts a payment (already settled, refunded or
  /// cancelled); carries the current order.
  AlreadySettled(Order),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
  Created,
  AlreadyGranted,
}

#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
  /// Fails with `OrderNotFound` when the id is unknown.
  async fn load(&self, order_id: Uuid) -> FulfillmentResult<Order>;

  /// Persists `order` if the stored version still equals `order.version`,
  /// returning the stored copy with its version incremented. Otherwise fails
  /// with `VersionConflict`.
  async fn save(&self, order: &Order) -> FulfillmentResult<Order>;

  /// Records `claim` only while `Order::accepts_payment` holds.
  ///
  /// Every check runs against a freshly loaded order and the write goes
  /// through the versioned `save`, so two racing callers cannot both claim.
  async fn claim_payment(
    &self,
    order_id: Uuid,
    claim: &PaymentClaim,
    now: DateTime<Utc>,
  ) -> FulfillmentResult<PaymentClaimOutcome> {
    let mut last_err = None;
    for attempt in 0..CLAIM_ATTEMPTS {
      let mut order = self.load(order_id).await?;
      if !order.accepts_payment() {
        return Ok(PaymentClaimOutcome::AlreadySettled(order));
      }
      order.record_payment(claim, now);
      match self.save(&order).await {
        Ok(saved) => return Ok(PaymentClaimOutcome::Claimed(saved)),
        Err(e @ FulfillmentError::VersionConflict { .. }) => {
          debug!(%order_id, attempt, "Payment claim lost a version race; re-checking.");
          last_err = Some(e);
        }
        Err(e) => return Err(e),
      }
    }
    Err(last_err.unwrap_or(FulfillmentError::VersionConflict { order_id, expected: 0 }))
  }
}

/// Read-only view of product design files.
#[async_trait]
pub trait DesignFileCatalog: Send + Sync + 'static {
  async fn find_files(&self, query: &DesignFileQuery) -> FulfillmentResult<Vec<DesignFile>>;

  async fn file_by_id(&self, design_file_id: Uuid) -> FulfillmentResult<Option<DesignFile>>;
}

#[async_trait]
pub trait GrantStore: Send + Sync + 'static {
  /// Insert-if-absent on (order_id, design_file_id).
  async fn grant_access(&self, order_id: Uuid, design_file_id: Uuid, now: DateTime<Utc>) -> FulfillmentResult<GrantOutcome>;

  async fn grants_for_order(&self, order_id: Uuid) -> FulfillmentResult<Vec<OrderDesignFile>>;

  /// Bumps the download counter. Fails with `GrantNotFound` for a missing or
  /// inactive grant.
  async fn record_download(
    &self,
    order_id: Uuid,
    design_file_id: Uuid,
    now: DateTime<Utc>,
  ) -> FulfillmentResult<OrderDesignFile>;
}
