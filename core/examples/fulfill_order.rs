// fulfillment/examples/fulfill_order.rs

use chrono::Utc;
use fulfillment::{
  ColorSelection, Customer, Customizations, DesignFile, FulfillmentConfig, FulfillmentOrchestrator, LogNotifier,
  MemoryDesignFileCatalog, MemoryGrantStore, MemoryOrderStore, Order, OrderItem, PaymentContext,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

fn design_file(product_id: &str, hex: Option<&str>) -> DesignFile {
  let id = Uuid::new_v4();
  DesignFile {
    id,
    product_id: product_id.to_string(),
    file_name: match hex {
      Some(hex) => format!("{}-{}.svg", product_id, hex.trim_start_matches('#')),
      None => format!("{}.svg", product_id),
    },
    file_url: format!("https://cdn.example.com/designs/{}.svg", id),
    file_type: "image/svg+xml".to_string(),
    file_size: 52_100,
    is_color_variant: hex.is_some(),
    color_variant_hex: hex.map(str::to_string),
    is_for_order: false,
    is_active: true,
    created_at: Utc::now(),
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Fulfillment Example ---");

  // 1. Catalog: a poster with a general file, a tee with red and navy variants.
  let catalog = Arc::new(MemoryDesignFileCatalog::with_files(vec![
    design_file("poster", None),
    design_file("tee", Some("#FF0000")),
    design_file("tee", Some("#1B2A4A")),
  ]));
  let orders = Arc::new(MemoryOrderStore::new());
  let grants = Arc::new(MemoryGrantStore::new());

  let orchestrator = FulfillmentOrchestrator::new(
    orders.clone(),
    catalog,
    grants.clone(),
    Arc::new(LogNotifier),
    FulfillmentConfig::default(),
  );

  // 2. An order mixing deliverable items with one that needs a designer.
  let customer = Customer {
    id: Uuid::new_v4(),
    name: "Sam Example".to_string(),
    email: "sam@example.com".to_string(),
  };
  let order = Order::new(
    "ORD-1001",
    customer,
    vec![
      OrderItem::new("poster", "City Poster", 1, 1500),
      OrderItem::new("tee", "Logo Tee", 2, 2200).with_customizations(Customizations::with_colors(vec![
        ColorSelection::new("Red", "#ff0000"),
        ColorSelection::new("Navy", "#1b2a4a"),
      ])),
      OrderItem::new("mug", "Name Mug", 1, 1200)
        .customizable()
        .with_customizations(Customizations::with_notes("Print 'Sam' in script")),
    ],
    Utc::now(),
  );
  let order_id = order.id;
  let total = order.total_cents;
  orders.insert(order);

  // 3. The payment provider's webhook fires.
  let report = orchestrator
    .fulfill(order_id, PaymentContext::webhook("PAYID-EXAMPLE-1", total))
    .await?;
  info!("First pass report:\n{}", serde_json::to_string_pretty(&report)?);

  // 4. The provider retries the same webhook; nothing happens twice.
  let replay = orchestrator
    .fulfill(order_id, PaymentContext::webhook("PAYID-EXAMPLE-1", total))
    .await?;
  info!(outcome = ?replay.outcome, grants = grants.len(), "Replay handled.");

  if let Some(order) = orders.get(order_id) {
    info!(
      order_status = %order.order_status,
      customization_status = %order.customization_status,
      "Final order state."
    );
    for entry in &order.order_history {
      info!("  [{}] {} ({:?})", entry.status, entry.note, entry.actor);
    }
  }

  Ok(())
}
