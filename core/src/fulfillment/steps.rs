// fulfillment/src/fulfillment/steps.rs

//! The fulfillment pipeline and its step handlers.

use crate::core::{ContextData, PipelineControl, SkipCondition};
use crate::error::{FulfillmentError, FulfillmentResult, PipelineError};
use crate::fulfillment::context::{FulfillmentCtxData, FulfillmentMode};
use crate::fulfillment::plan::{DeliveryPlan, FulfillmentOutcome};
use crate::model::{DeliveryStatus, HistoryActor, Order, PaymentStatus};
use crate::notify::{
  dispatch, AdminOrderNotification, CompletedOrderEmail, CustomizationProcessingEmail, DownloadLink, NotificationKind,
  PendingItem,
};
use crate::pipeline::Pipeline;
use crate::retry::retry_with_backoff;
use crate::store::{GrantOutcome, OrderStore, PaymentClaimOutcome};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const CLAIM_PAYMENT: &str = "claim_payment";
pub const LOAD_FOR_REDELIVERY: &str = "load_for_redelivery";
pub const RESOLVE_DELIVERY: &str = "resolve_delivery";
pub const GRANT_FILE_ACCESS: &str = "grant_file_access";
pub const APPLY_DELIVERY: &str = "apply_delivery";
pub const NOTIFY_CUSTOMER: &str = "notify_customer";
pub const NOTIFY_ADMIN: &str = "notify_admin";

type Ctx = ContextData<FulfillmentCtxData>;

fn runs_only_in(mode: FulfillmentMode) -> SkipCondition<FulfillmentCtxData> {
  Arc::new(move |ctx: Ctx| ctx.read().mode != mode)
}

fn missing(what: &str) -> FulfillmentError {
  PipelineError::Internal(format!("{} not available in fulfillment context", what)).into()
}

pub fn build_fulfillment_pipeline() -> Pipeline<FulfillmentCtxData, FulfillmentError> {
  let mut p = Pipeline::new(&[
    (CLAIM_PAYMENT, false, Some(runs_only_in(FulfillmentMode::Payment))),
    (LOAD_FOR_REDELIVERY, false, Some(runs_only_in(FulfillmentMode::Redelivery))),
    (RESOLVE_DELIVERY, false, None),
    (GRANT_FILE_ACCESS, false, None),
    (APPLY_DELIVERY, false, None),
    (NOTIFY_CUSTOMER, true, None),
    (NOTIFY_ADMIN, true, None),
  ]);

  p.on_root(CLAIM_PAYMENT, claim_payment);
  p.on_root(LOAD_FOR_REDELIVERY, load_for_redelivery);
  p.on_root(RESOLVE_DELIVERY, resolve_delivery);
  p.on_root(GRANT_FILE_ACCESS, grant_file_access);
  p.on_root(APPLY_DELIVERY, apply_delivery);
  p.on_root(NOTIFY_CUSTOMER, notify_customer);
  p.on_root(NOTIFY_ADMIN, notify_admin);
  p
}

fn stop_as_processed(ctx: &Ctx, order: Order) -> PipelineControl {
  let mut guard = ctx.write();
  guard.order = Some(order);
  guard.short_circuit = Some(FulfillmentOutcome::AlreadyProcessed);
  PipelineControl::Stop
}

async fn claim_payment(ctx: Ctx) -> FulfillmentResult<PipelineControl> {
  let (services, order_id, payment, now) = {
    let guard = ctx.read();
    (guard.services.clone(), guard.order_id, guard.payment.clone(), guard.now)
  };
  let payment = payment.ok_or_else(|| FulfillmentError::InvalidPayment("no payment details supplied".to_string()))?;
  if payment.amount_cents < 0 {
    return Err(FulfillmentError::InvalidPayment(format!(
      "negative amount {} cents",
      payment.amount_cents
    )));
  }

  let current = services.orders.load(order_id).await?;
  if !current.accepts_payment() {
    info!(
      %order_id,
      order_number = %current.order_number,
      payment_status = %current.payment_status,
      order_status = %current.order_status,
      "Order no longer accepts a payment; nothing to do."
    );
    return Ok(stop_as_processed(&ctx, current));
  }
  if payment.is_free() && !current.is_free_checkout() {
    return Err(FulfillmentError::InvalidPayment(format!(
      "free checkout requested for order {} with total {} cents",
      current.order_number, current.total_cents
    )));
  }
  if !payment.is_free() && payment.amount_cents != current.total_cents {
    warn!(
      %order_id,
      paid_cents = payment.amount_cents,
      total_cents = current.total_cents,
      "Captured amount differs from order total."
    );
  }

  match services.orders.claim_payment(order_id, &payment.to_claim(), now).await? {
    PaymentClaimOutcome::Claimed(order) => {
      info!(%order_id, order_number = %order.order_number, payment_status = %order.payment_status, "Payment recorded.");
      let mut guard = ctx.write();
      guard.is_free_order = order.payment_status == PaymentStatus::Free;
      guard.order = Some(order);
      guard.recovery_armed = true;
      Ok(PipelineControl::Continue)
    }
    PaymentClaimOutcome::AlreadySettled(order) => {
      info!(%order_id, order_number = %order.order_number, "Payment claim refused; the order changed since it was loaded.");
      Ok(stop_as_processed(&ctx, order))
    }
  }
}

async fn load_for_redelivery(ctx: Ctx) -> FulfillmentResult<PipelineControl> {
  let (services, order_id) = {
    let guard = ctx.read();
    (guard.services.clone(), guard.order_id)
  };
  let order = services.orders.load(order_id).await?;
  if !order.awaits_delivery_pass() {
    info!(
      %order_id,
      order_status = %order.order_status,
      payment_status = %order.payment_status,
      "Order is not waiting for delivery; replay skipped."
    );
    return Ok(stop_as_processed(&ctx, order));
  }
  let mut guard = ctx.write();
  guard.is_free_order = order.payment_status == PaymentStatus::Free;
  guard.order = Some(order);
  guard.recovery_armed = true;
  Ok(PipelineControl::Continue)
}

async fn resolve_delivery(ctx: Ctx) -> FulfillmentResult<PipelineControl> {
  let (services, order, is_free_order) = {
    let guard = ctx.read();
    (guard.services.clone(), guard.order.clone(), guard.is_free_order)
  };
  let order = order.ok_or_else(|| missing("order"))?;

  let verdict = services.resolver.classify(&order).await;
  let plan = DeliveryPlan::from_verdict(&order, &verdict, is_free_order);
  info!(
    order_number = %order.order_number,
    verdict = ?verdict.kind,
    requires_custom_work = verdict.requires_custom_work,
    outcome = ?plan.outcome,
    "Delivery resolved."
  );

  let mut guard = ctx.write();
  guard.verdict = Some(verdict);
  guard.plan = Some(plan);
  Ok(PipelineControl::Continue)
}

async fn grant_file_access(ctx: Ctx) -> FulfillmentResult<PipelineControl> {
  let (services, order_id, plan, now) = {
    let guard = ctx.read();
    (guard.services.clone(), guard.order_id, guard.plan.clone(), guard.now)
  };
  let plan = plan.ok_or_else(|| missing("delivery plan"))?;
  let grants = services.grants.as_ref();

  let mut seen = HashSet::new();
  let mut created = 0;
  let mut links = Vec::new();
  for item in plan.delivered() {
    for file in &item.files {
      if !seen.insert(file.id) {
        continue;
      }
      let design_file_id = file.id;
      let outcome = retry_with_backoff(
        &services.config.persistence_retry,
        GRANT_FILE_ACCESS,
        FulfillmentError::is_retryable,
        || grants.grant_access(order_id, design_file_id, now),
      )
      .await?;
      if outcome == GrantOutcome::Created {
        created += 1;
      }
      links.push(DownloadLink {
        product_name: item.product_name.clone(),
        file_name: file.file_name.clone(),
        url: services.config.download_link(order_id, design_file_id),
      });
    }
  }
  info!(%order_id, grants_created = created, files = links.len(), "File access granted.");

  let mut guard = ctx.write();
  guard.grants_created = created;
  guard.download_links = links;
  Ok(PipelineControl::Continue)
}

async fn apply_delivery(ctx: Ctx) -> FulfillmentResult<PipelineControl> {
  let (services, order_id, plan, now) = {
    let guard = ctx.read();
    (guard.services.clone(), guard.order_id, guard.plan.clone(), guard.now)
  };
  let plan = plan.ok_or_else(|| missing("delivery plan"))?;
  let orders = services.orders.as_ref();
  let plan_ref = &plan;
  let ttl = services.config.download_link_ttl;

  let applied = retry_with_backoff(
    &services.config.persistence_retry,
    APPLY_DELIVERY,
    FulfillmentError::is_retryable,
    || apply_plan(orders, order_id, plan_ref, ttl, now),
  )
  .await?;

  match applied {
    Some(order) => {
      info!(
        %order_id,
        order_number = %order.order_number,
        order_status = %order.order_status,
        customization_status = %order.customization_status,
        "Delivery applied."
      );
      ctx.write().order = Some(order);
      Ok(PipelineControl::Continue)
    }
    None => {
      info!(%order_id, "Another pass already applied delivery; stopping.");
      ctx.write().short_circuit = Some(FulfillmentOutcome::AlreadyProcessed);
      Ok(PipelineControl::Stop)
    }
  }
}

// One reload-apply-save unit. `None` means the order moved on meanwhile.
async fn apply_plan(
  orders: &dyn OrderStore,
  order_id: Uuid,
  plan: &DeliveryPlan,
  ttl: chrono::Duration,
  now: DateTime<Utc>,
) -> FulfillmentResult<Option<Order>> {
  let mut order = orders.load(order_id).await?;
  if !order.awaits_delivery_pass() {
    return Ok(None);
  }

  for item in &plan.items {
    match item.target {
      DeliveryStatus::AutoDelivered => order.mark_item_auto_delivered(item.index, item.note.as_str(), now)?,
      DeliveryStatus::AwaitingCustomization => order.mark_item_awaiting_customization(item.index, item.note.as_str(), now)?,
      DeliveryStatus::PendingReview => order.mark_item_pending_review(item.index, item.note.as_str(), now)?,
      DeliveryStatus::Pending => false,
    };
  }
  if plan.sends_files_ready() {
    order.download_expires_at = Some(now + ttl);
  }
  order.transition(
    plan.order_status,
    plan.customization_status,
    plan.history_note(),
    HistoryActor::System,
    now,
  );
  if let Err(violation) = order.check_invariants() {
    error!(%order_id, %violation, "Delivery plan produced an inconsistent order.");
  }

  orders.save(&order).await.map(Some)
}

async fn notify_customer(ctx: Ctx) -> FulfillmentResult<PipelineControl> {
  let (services, order, plan, links) = {
    let guard = ctx.read();
    (
      guard.services.clone(),
      guard.order.clone(),
      guard.plan.clone(),
      guard.download_links.clone(),
    )
  };
  let order = order.ok_or_else(|| missing("order"))?;
  let plan = plan.ok_or_else(|| missing("delivery plan"))?;
  let config = &services.config;
  let notifier = services.notifier.as_ref();
  let to = order.customer.email.as_str();

  if plan.sends_files_ready() {
    let email = CompletedOrderEmail {
      order_number: order.order_number.clone(),
      customer_name: order.customer.name.clone(),
      download_links: links,
      expires_at: order.download_expires_at.unwrap_or_else(|| Utc::now() + config.download_link_ttl),
    };
    let email = &email;
    let sent = dispatch(
      NotificationKind::CompletedOrder,
      config.notify_timeout,
      &config.notify_retry,
      || notifier.send_completed_order_email(to, email),
    )
    .await;
    ctx.write().notifications.record(NotificationKind::CompletedOrder, sent);
  }

  if plan.sends_customization_processing() {
    let email = CustomizationProcessingEmail {
      order_number: order.order_number.clone(),
      customer_name: order.customer.name.clone(),
      pending_items: plan
        .pending()
        .map(|item| PendingItem {
          product_name: item.product_name.clone(),
          note: item.note.clone(),
        })
        .collect(),
    };
    let email = &email;
    let sent = dispatch(
      NotificationKind::CustomizationProcessing,
      config.notify_timeout,
      &config.notify_retry,
      || notifier.send_customization_processing_email(to, email),
    )
    .await;
    ctx
      .write()
      .notifications
      .record(NotificationKind::CustomizationProcessing, sent);
  }

  Ok(PipelineControl::Continue)
}

async fn notify_admin(ctx: Ctx) -> FulfillmentResult<PipelineControl> {
  let (services, order, plan, is_free_order) = {
    let guard = ctx.read();
    (
      guard.services.clone(),
      guard.order.clone(),
      guard.plan.clone(),
      guard.is_free_order,
    )
  };
  let order = order.ok_or_else(|| missing("order"))?;
  let plan = plan.ok_or_else(|| missing("delivery plan"))?;
  let config = &services.config;
  let notifier = services.notifier.as_ref();

  let notification = AdminOrderNotification {
    order_id: order.id,
    order_number: order.order_number.clone(),
    is_free_order,
    has_customizations: plan.sends_customization_processing(),
    auto_completed: plan.outcome == FulfillmentOutcome::AutoCompleted,
  };
  let notification = &notification;
  let sent = dispatch(
    NotificationKind::AdminNewOrder,
    config.notify_timeout,
    &config.notify_retry,
    || notifier.send_admin_new_order_notification(notification),
  )
  .await;
  ctx.write().notifications.record(NotificationKind::AdminNewOrder, sent);
  Ok(PipelineControl::Continue)
}
