// tests/orchestrator_tests.rs
mod common;

use common::*;
use fulfillment::fulfillment::{MISSING_CUSTOMIZATION_NOTE, PENDING_REVIEW_NOTE};
use fulfillment::{
  ColorSelection, CustomizationStatus, Customizations, DeliveryStatus, FulfillmentError, FulfillmentOrchestrator,
  FulfillmentOutcome, GrantStore, MemoryDesignFileCatalog, MemoryOrderStore, NotificationKind, OrderItem, OrderStatus,
  PaymentContext, PaymentStatus,
};
use serial_test::serial;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

fn paid(amount_cents: i64) -> PaymentContext {
  PaymentContext::webhook(format!("TX-{}", Uuid::new_v4().simple()), amount_cents)
}

#[tokio::test]
#[serial]
async fn plain_item_with_general_file_completes_the_order() {
  setup_tracing();
  let file = general_file("poster");
  let h = Harness::new(vec![file.clone()]);
  let order_id = h.place(order_with(vec![OrderItem::new("poster", "Poster", 1, 1500)]));

  let report = h.orchestrator.fulfill(order_id, paid(1500)).await.unwrap();

  assert_eq!(report.outcome, FulfillmentOutcome::AutoCompleted);
  assert_eq!(report.grants_created, 1);
  let order = h.order(order_id);
  assert_eq!(order.payment_status, PaymentStatus::Paid);
  assert_eq!(order.order_status, OrderStatus::Completed);
  assert_eq!(order.customization_status, CustomizationStatus::Completed);
  assert_eq!(order.items[0].delivery_status, DeliveryStatus::AutoDelivered);
  assert!(order.transaction_id.is_some());
  assert!(order.check_invariants().is_ok());

  let expires = order.download_expires_at.expect("download expiry set");
  let days = (expires - order.paid_at.unwrap()).num_days();
  assert!((29..=30).contains(&days));

  let grants = h.grants.grants_for_order(order_id).await.unwrap();
  assert_eq!(grants.len(), 1);
  assert_eq!(grants[0].design_file_id, file.id);

  assert_eq!(h.notifier.completed_count(), 1);
  assert_eq!(h.notifier.processing_count(), 0);
  let (to, email) = h.notifier.completed.lock()[0].clone();
  assert_eq!(to, "riley@example.com");
  assert_eq!(
    email.download_links[0].url,
    format!("https://shop.example.com/api/v1/downloads/{}/{}", order_id, file.id)
  );
  let admin = h.notifier.admin.lock()[0].clone();
  assert!(admin.auto_completed);
  assert!(!admin.has_customizations);
  assert!(!admin.is_free_order);
}

#[tokio::test]
#[serial]
async fn missing_color_variant_holds_item_for_custom_work() {
  setup_tracing();
  let h = Harness::new(vec![variant_file("tee", "#FF0000")]);
  let order_id = h.place(order_with(vec![OrderItem::new("tee", "Tee", 1, 2000).with_customizations(
    Customizations::with_colors(vec![
      ColorSelection::new("Red", "#FF0000"),
      ColorSelection::new("Lime", "#00FF00"),
    ]),
  )]));

  let report = h.orchestrator.fulfill(order_id, paid(2000)).await.unwrap();

  assert_eq!(report.outcome, FulfillmentOutcome::AwaitingCustomWork);
  let order = h.order(order_id);
  assert_eq!(order.items[0].delivery_status, DeliveryStatus::AwaitingCustomization);
  assert!(order.items[0].delivery_notes.as_deref().unwrap().contains("Lime"));
  assert_eq!(order.order_status, OrderStatus::AwaitingCustomization);
  assert_eq!(order.customization_status, CustomizationStatus::Pending);
  assert!(h.grants.is_empty());
  assert_eq!(h.notifier.completed_count(), 0);
  assert_eq!(h.notifier.processing_count(), 1);
}

#[tokio::test]
#[serial]
async fn mixed_order_delivers_what_it_can_and_sends_both_emails() {
  setup_tracing();
  let h = Harness::new(vec![general_file("poster"), general_file("mug")]);
  let order_id = h.place(order_with(vec![
    OrderItem::new("poster", "Poster", 1, 1500),
    OrderItem::new("mug", "Mug", 1, 900)
      .customizable()
      .with_customizations(Customizations::with_notes("make it blue")),
  ]));

  let report = h.orchestrator.fulfill(order_id, paid(2400)).await.unwrap();

  assert_eq!(report.outcome, FulfillmentOutcome::PartiallyDelivered);
  assert_eq!(report.delivered_items, vec![0]);
  assert_eq!(report.pending_items, vec![1]);
  let order = h.order(order_id);
  assert_eq!(order.order_status, OrderStatus::AwaitingCustomization);
  assert_eq!(order.customization_status, CustomizationStatus::Pending);
  assert_eq!(order.items[0].delivery_status, DeliveryStatus::AutoDelivered);
  assert_eq!(order.items[1].delivery_status, DeliveryStatus::AwaitingCustomization);
  assert!(order.download_expires_at.is_some());
  assert_eq!(h.grants.len(), 1);

  assert_eq!(h.notifier.completed_count(), 1);
  assert_eq!(h.notifier.processing_count(), 1);
  let (_, pending) = h.notifier.processing.lock()[0].clone();
  assert_eq!(pending.pending_items.len(), 1);
  assert_eq!(pending.pending_items[0].product_name, "Mug");
  assert!(h.notifier.admin.lock()[0].has_customizations);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_duplicate_events_fulfill_once() {
  setup_tracing();
  let h = Harness::new(vec![general_file("poster")]);
  let order_id = h.place(order_with(vec![OrderItem::new("poster", "Poster", 1, 1500)]));

  let first = h.orchestrator.clone();
  let second = h.orchestrator.clone();
  let (a, b) = tokio::join!(
    tokio::spawn(async move { first.fulfill(order_id, paid(1500)).await }),
    tokio::spawn(async move { second.fulfill(order_id, paid(1500)).await }),
  );
  let outcomes = [a.unwrap().unwrap().outcome, b.unwrap().unwrap().outcome];

  assert_eq!(
    outcomes.iter().filter(|o| **o == FulfillmentOutcome::AlreadyProcessed).count(),
    1
  );
  assert!(outcomes.contains(&FulfillmentOutcome::AutoCompleted));
  assert_eq!(h.grants.len(), 1);
  assert_eq!(h.notifier.completed_count(), 1);
  assert_eq!(h.notifier.admin_count(), 1);
  let order = h.order(order_id);
  let payment_entries = order
    .order_history
    .iter()
    .filter(|e| e.note.contains("Payment"))
    .count();
  assert_eq!(payment_entries, 1);
}

#[tokio::test]
#[serial]
async fn replaying_a_fulfilled_order_changes_nothing() {
  setup_tracing();
  let h = Harness::new(vec![general_file("poster"), variant_file("tee", "#000000")]);
  let order_id = h.place(order_with(vec![
    OrderItem::new("poster", "Poster", 1, 1500),
    OrderItem::new("tee", "Tee", 1, 2000)
      .with_customizations(Customizations::with_colors(vec![ColorSelection::new("Black", "#000000")])),
  ]));

  h.orchestrator.fulfill(order_id, paid(3500)).await.unwrap();
  let after_first = h.order(order_id);
  let grants_after_first = h.grants.len();

  let replay = h.orchestrator.fulfill(order_id, paid(3500)).await.unwrap();

  assert_eq!(replay.outcome, FulfillmentOutcome::AlreadyProcessed);
  assert_eq!(replay.grants_created, 0);
  assert_eq!(h.order(order_id), after_first);
  assert_eq!(h.grants.len(), grants_after_first);
  assert_eq!(h.notifier.completed_count(), 1);
}

#[tokio::test]
#[serial]
async fn replayed_capture_after_refund_leaves_order_cancelled() {
  setup_tracing();
  let h = Harness::new(vec![general_file("poster")]);
  let order_id = h.place(order_with(vec![OrderItem::new("poster", "Poster", 1, 1500)]));
  h.orchestrator.fulfill(order_id, PaymentContext::webhook("TX-1", 1500)).await.unwrap();

  let mut refunded = h.order(order_id);
  refunded.payment_status = PaymentStatus::Refunded;
  refunded.order_status = OrderStatus::Cancelled;
  h.place(refunded.clone());

  let replay = h.orchestrator.fulfill(order_id, PaymentContext::webhook("TX-1", 1500)).await.unwrap();

  assert_eq!(replay.outcome, FulfillmentOutcome::AlreadyProcessed);
  assert_eq!(h.order(order_id), refunded);
  assert_eq!(h.notifier.completed_count(), 1);

  let unpaid_cancelled = {
    let mut order = order_with(vec![OrderItem::new("poster", "Poster", 1, 1500)]);
    order.order_status = OrderStatus::Cancelled;
    order
  };
  let cancelled_id = h.place(unpaid_cancelled);
  let report = h.orchestrator.fulfill(cancelled_id, paid(1500)).await.unwrap();
  assert_eq!(report.outcome, FulfillmentOutcome::AlreadyProcessed);
  assert_eq!(h.order(cancelled_id).payment_status, PaymentStatus::Pending);
  assert_eq!(h.grants.grants_for_order(cancelled_id).await.unwrap().len(), 0);
}

#[tokio::test]
#[serial]
async fn notification_failures_do_not_fail_fulfillment() {
  setup_tracing();
  let h = Harness::with_notifier(vec![general_file("poster")], RecordingNotifier::failing());
  let order_id = h.place(order_with(vec![OrderItem::new("poster", "Poster", 1, 1500)]));

  let report = h.orchestrator.fulfill(order_id, paid(1500)).await.unwrap();

  assert_eq!(report.outcome, FulfillmentOutcome::AutoCompleted);
  assert_eq!(
    report.notifications.failed,
    vec![NotificationKind::CompletedOrder, NotificationKind::AdminNewOrder]
  );
  assert!(report.notifications.sent.is_empty());
  assert_eq!(h.order(order_id).order_status, OrderStatus::Completed);
}

#[tokio::test]
#[serial]
async fn unknown_order_is_reported_as_not_found() {
  setup_tracing();
  let h = Harness::new(vec![]);
  let missing = Uuid::new_v4();
  match h.orchestrator.fulfill(missing, paid(100)).await {
    Err(FulfillmentError::OrderNotFound { order_id }) => assert_eq!(order_id, missing),
    other => panic!("expected OrderNotFound, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn free_checkout_splits_items_three_ways() {
  setup_tracing();
  let h = Harness::new(vec![general_file("sticker")]);
  let order = order_with(vec![
    OrderItem::new("sticker", "Sticker", 1, 300),
    OrderItem::new("mug", "Mug", 1, 900)
      .customizable()
      .with_customizations(Customizations::with_notes("add my cat")),
    OrderItem::new("tote", "Tote", 1, 1200).customizable(),
  ])
  .with_promo_discount(2400);
  let order_id = h.place(order);

  let report = h.orchestrator.fulfill(order_id, PaymentContext::free_checkout()).await.unwrap();

  assert_eq!(report.outcome, FulfillmentOutcome::PartiallyDelivered);
  let order = h.order(order_id);
  assert_eq!(order.payment_status, PaymentStatus::Free);
  assert_eq!(order.items[0].delivery_status, DeliveryStatus::AutoDelivered);
  assert_eq!(order.items[1].delivery_status, DeliveryStatus::PendingReview);
  assert_eq!(order.items[1].delivery_notes.as_deref(), Some(PENDING_REVIEW_NOTE));
  assert_eq!(order.items[2].delivery_status, DeliveryStatus::AwaitingCustomization);
  assert_eq!(order.items[2].delivery_notes.as_deref(), Some(MISSING_CUSTOMIZATION_NOTE));
  assert_eq!(order.order_status, OrderStatus::AwaitingCustomization);
  assert!(order.check_invariants().is_ok());
  assert!(h.notifier.admin.lock()[0].is_free_order);
}

#[tokio::test]
#[serial]
async fn free_checkout_with_only_review_items_stays_processing() {
  setup_tracing();
  let h = Harness::new(vec![]);
  let order_id = h.place(
    order_with(vec![OrderItem::new("mug", "Mug", 1, 900)
      .customizable()
      .with_customizations(Customizations::with_notes("engrave 'Bo'"))])
    .with_promo_discount(900),
  );

  let report = h.orchestrator.fulfill(order_id, PaymentContext::free_checkout()).await.unwrap();

  assert_eq!(report.outcome, FulfillmentOutcome::AwaitingCustomWork);
  let order = h.order(order_id);
  assert_eq!(order.order_status, OrderStatus::Processing);
  assert_eq!(order.customization_status, CustomizationStatus::Pending);
  assert_eq!(order.items[0].delivery_status, DeliveryStatus::PendingReview);

  // Not an interrupted pass, so an admin replay leaves it alone.
  let replay = h.orchestrator.redeliver(order_id).await.unwrap();
  assert_eq!(replay.outcome, FulfillmentOutcome::AlreadyProcessed);
}

#[tokio::test]
#[serial]
async fn free_checkout_on_a_priced_order_is_rejected_untouched() {
  setup_tracing();
  let h = Harness::new(vec![general_file("poster")]);
  let order_id = h.place(order_with(vec![OrderItem::new("poster", "Poster", 1, 1500)]));
  let before = h.order(order_id);

  let err = h
    .orchestrator
    .fulfill(order_id, PaymentContext::free_checkout())
    .await
    .unwrap_err();

  assert!(matches!(err, FulfillmentError::InvalidPayment(_)));
  assert_eq!(h.order(order_id), before);
  assert!(h.grants.is_empty());
}

#[tokio::test]
#[serial]
async fn grant_failure_parks_order_until_redelivered() {
  setup_tracing();
  let orders = Arc::new(MemoryOrderStore::new());
  let catalog = Arc::new(MemoryDesignFileCatalog::with_files(vec![general_file("poster")]));
  let grants = Arc::new(SwitchableGrantStore::default());
  let notifier = Arc::new(RecordingNotifier::default());
  let orchestrator = FulfillmentOrchestrator::new(
    orders.clone(),
    catalog,
    grants.clone(),
    notifier.clone(),
    fast_config(),
  );
  let order = order_with(vec![OrderItem::new("poster", "Poster", 1, 1500)]);
  let order_id = order.id;
  orders.insert(order);

  grants.down.store(true, Ordering::SeqCst);
  let err = orchestrator.fulfill(order_id, paid(1500)).await.unwrap_err();
  match &err {
    FulfillmentError::FulfillmentIncomplete { order_id: id, source } => {
      assert_eq!(*id, order_id);
      assert!(matches!(**source, FulfillmentError::Persistence { .. }));
    }
    other => panic!("expected FulfillmentIncomplete, got {:?}", other),
  }

  let parked = orders.get(order_id).unwrap();
  assert_eq!(parked.payment_status, PaymentStatus::Paid);
  assert_eq!(parked.order_status, OrderStatus::Processing);
  assert_eq!(parked.customization_status, CustomizationStatus::Pending);
  assert!(parked.order_history.last().unwrap().note.contains("awaiting replay"));
  assert_eq!(notifier.completed_count(), 0);

  // A replayed payment webhook must not deliver; only the admin replay does.
  let replayed = orchestrator.fulfill(order_id, paid(1500)).await.unwrap();
  assert_eq!(replayed.outcome, FulfillmentOutcome::AlreadyProcessed);

  grants.down.store(false, Ordering::SeqCst);
  let report = orchestrator.redeliver(order_id).await.unwrap();
  assert_eq!(report.outcome, FulfillmentOutcome::AutoCompleted);
  assert_eq!(report.grants_created, 1);
  assert_eq!(orders.get(order_id).unwrap().order_status, OrderStatus::Completed);
  assert_eq!(notifier.completed_count(), 1);

  let again = orchestrator.redeliver(order_id).await.unwrap();
  assert_eq!(again.outcome, FulfillmentOutcome::AlreadyProcessed);
}

#[tokio::test]
#[serial]
async fn redeliver_ignores_unpaid_orders() {
  setup_tracing();
  let h = Harness::new(vec![general_file("poster")]);
  let order_id = h.place(order_with(vec![OrderItem::new("poster", "Poster", 1, 1500)]));

  let report = h.orchestrator.redeliver(order_id).await.unwrap();

  assert_eq!(report.outcome, FulfillmentOutcome::AlreadyProcessed);
  assert_eq!(h.order(order_id).payment_status, PaymentStatus::Pending);
  assert!(h.grants.is_empty());
}
