// fulfillment/src/fulfillment/orchestrator.rs

use crate::config::FulfillmentConfig;
use crate::core::ContextData;
use crate::error::{FulfillmentError, FulfillmentResult};
use crate::fulfillment::context::{FulfillmentCtxData, FulfillmentMode, FulfillmentServices};
use crate::fulfillment::plan::FulfillmentOutcome;
use crate::fulfillment::steps::build_fulfillment_pipeline;
use crate::model::{CustomizationStatus, HistoryActor, OrderStatus};
use crate::notify::{NotificationSummary, Notifier};
use crate::payment::PaymentContext;
use crate::pipeline::Pipeline;
use crate::resolver::DeliveryResolver;
use crate::retry::retry_with_backoff;
use crate::store::{DesignFileCatalog, GrantStore, OrderStore};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentReport {
  pub order_id: Uuid,
  pub order_number: String,
  pub outcome: FulfillmentOutcome,
  pub grants_created: usize,
  /// Item indexes delivered by this pass.
  pub delivered_items: Vec<usize>,
  /// Item indexes left for custom work or review.
  pub pending_items: Vec<usize>,
  pub notifications: NotificationSummary,
}

/// Drives a paid order to a stable state. Safe to invoke repeatedly and
/// concurrently for the same order: only the caller that records the payment
/// delivers anything.
#[derive(Clone)]
pub struct FulfillmentOrchestrator {
  services: Arc<FulfillmentServices>,
  pipeline: Arc<Pipeline<FulfillmentCtxData, FulfillmentError>>,
}

impl FulfillmentOrchestrator {
  pub fn new(
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn DesignFileCatalog>,
    grants: Arc<dyn GrantStore>,
    notifier: Arc<dyn Notifier>,
    config: FulfillmentConfig,
  ) -> Self {
    let services = FulfillmentServices {
      orders,
      resolver: DeliveryResolver::new(catalog.clone()),
      catalog,
      grants,
      notifier,
      config,
    };
    Self {
      services: Arc::new(services),
      pipeline: Arc::new(build_fulfillment_pipeline()),
    }
  }

  pub fn config(&self) -> &FulfillmentConfig {
    &self.services.config
  }

  /// Handles one payment event for `order_id`.
  #[instrument(
    name = "FulfillmentOrchestrator::fulfill",
    skip(self, payment),
    fields(source = ?payment.source, amount_cents = payment.amount_cents),
    err(Display)
  )]
  pub async fn fulfill(&self, order_id: Uuid, payment: PaymentContext) -> FulfillmentResult<FulfillmentReport> {
    let data = FulfillmentCtxData::new(
      self.services.clone(),
      order_id,
      FulfillmentMode::Payment,
      Some(payment),
      Utc::now(),
    );
    self.execute(data).await
  }

  /// Re-runs delivery for an order an earlier pass left in `processing`.
  #[instrument(name = "FulfillmentOrchestrator::redeliver", skip(self), err(Display))]
  pub async fn redeliver(&self, order_id: Uuid) -> FulfillmentResult<FulfillmentReport> {
    let data = FulfillmentCtxData::new(
      self.services.clone(),
      order_id,
      FulfillmentMode::Redelivery,
      None,
      Utc::now(),
    );
    self.execute(data).await
  }

  async fn execute(&self, data: FulfillmentCtxData) -> FulfillmentResult<FulfillmentReport> {
    let order_id = data.order_id;
    let ctx = ContextData::new(data);

    match self.pipeline.run(ctx.clone()).await {
      Ok(result) => {
        let report = build_report(&ctx.read());
        info!(
          %order_id,
          order_number = %report.order_number,
          outcome = ?report.outcome,
          grants_created = report.grants_created,
          pipeline_result = ?result,
          "Fulfillment pass finished."
        );
        Ok(report)
      }
      Err(err) => {
        let armed = ctx.read().recovery_armed;
        if !armed {
          return Err(err);
        }
        self.park_for_replay(order_id, &err).await;
        Err(FulfillmentError::FulfillmentIncomplete {
          order_id,
          source: Box::new(err),
        })
      }
    }
  }

  // The payment stands; make sure the order sits in a state `redeliver` picks up.
  async fn park_for_replay(&self, order_id: Uuid, cause: &FulfillmentError) {
    error!(%order_id, error = %cause, "Fulfillment failed after payment was recorded; parking order for replay.");
    let orders = self.services.orders.as_ref();
    let note = format!("Fulfillment incomplete, awaiting replay: {}", cause);
    let note = note.as_str();

    let parked = retry_with_backoff(
      &self.services.config.persistence_retry,
      "park_for_replay",
      FulfillmentError::is_retryable,
      || async move {
        let mut order = orders.load(order_id).await?;
        if order.order_status != OrderStatus::Processing {
          return Ok(());
        }
        order.transition(
          OrderStatus::Processing,
          CustomizationStatus::Pending,
          note,
          HistoryActor::System,
          Utc::now(),
        );
        orders.save(&order).await.map(|_| ())
      },
    )
    .await;

    if let Err(e) = parked {
      error!(%order_id, error = %e, "Could not record fallback state; order remains in processing.");
    }
  }
}

fn build_report(data: &FulfillmentCtxData) -> FulfillmentReport {
  let order_number = data
    .order
    .as_ref()
    .map(|o| o.order_number.clone())
    .unwrap_or_default();

  let (outcome, delivered_items, pending_items) = match (data.short_circuit, &data.plan) {
    (Some(outcome), _) => (outcome, Vec::new(), Vec::new()),
    (None, Some(plan)) => (
      plan.outcome,
      plan.delivered().map(|i| i.index).collect(),
      plan.pending().map(|i| i.index).collect(),
    ),
    (None, None) => (FulfillmentOutcome::AlreadyProcessed, Vec::new(), Vec::new()),
  };

  FulfillmentReport {
    order_id: data.order_id,
    order_number,
    outcome,
    grants_created: data.grants_created,
    delivered_items,
    pending_items,
    notifications: data.notifications.clone(),
  }
}
