// storefront_app/src/db/orders.rs

use super::db_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulfillment::model::PaymentClaim;
use fulfillment::{
  Customer, CustomizationStatus, FulfillmentError, FulfillmentResult, HistoryEntry, Order, OrderItem, OrderStatus,
  OrderStore, PaymentClaimOutcome, PaymentStatus,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

// Payment states from which a capture may still be recorded.
const CLAIMABLE: [&str; 2] = ["pending", "failed"];

#[derive(Debug, FromRow)]
struct OrderRow {
  id: Uuid,
  order_number: String,
  customer_id: Uuid,
  customer_name: String,
  customer_email: String,
  items: Json<Vec<OrderItem>>,
  subtotal_cents: i64,
  promo_discount_cents: i64,
  total_cents: i64,
  payment_status: String,
  order_status: String,
  customization_status: String,
  transaction_id: Option<String>,
  paid_at: Option<DateTime<Utc>>,
  payer_email: Option<String>,
  download_expires_at: Option<DateTime<Utc>>,
  order_history: Json<Vec<HistoryEntry>>,
  version: i64,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

fn parse_column<T>(column: &str, raw: &str, parse: fn(&str) -> Option<T>) -> FulfillmentResult<T> {
  parse(raw).ok_or_else(|| FulfillmentError::persistence(anyhow::anyhow!("unknown {} '{}' in orders table", column, raw)))
}

impl TryFrom<OrderRow> for Order {
  type Error = FulfillmentError;

  fn try_from(row: OrderRow) -> FulfillmentResult<Self> {
    Ok(Order {
      id: row.id,
      order_number: row.order_number,
      customer: Customer {
        id: row.customer_id,
        name: row.customer_name,
        email: row.customer_email,
      },
      items: row.items.0,
      subtotal_cents: row.subtotal_cents,
      promo_discount_cents: row.promo_discount_cents,
      total_cents: row.total_cents,
      payment_status: parse_column("payment_status", &row.payment_status, PaymentStatus::parse)?,
      order_status: parse_column("order_status", &row.order_status, OrderStatus::parse)?,
      customization_status: parse_column(
        "customization_status",
        &row.customization_status,
        CustomizationStatus::parse,
      )?,
      transaction_id: row.transaction_id,
      paid_at: row.paid_at,
      payer_email: row.payer_email,
      download_expires_at: row.download_expires_at,
      order_history: row.order_history.0,
      version: u64::try_from(row.version).unwrap_or_default(),
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

/// Orders table store. `save` is a version-checked UPDATE and `claim_payment`
/// a single conditional UPDATE, so racing payment events serialize in Postgres.
#[derive(Clone)]
pub struct PgOrderStore {
  pool: PgPool,
}

impl PgOrderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  async fn exists(&self, order_id: Uuid) -> FulfillmentResult<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
      .bind(order_id)
      .fetch_one(&self.pool)
      .await
      .map_err(db_error)
  }
}

#[async_trait]
impl OrderStore for PgOrderStore {
  #[instrument(skip(self))]
  async fn load(&self, order_id: Uuid) -> FulfillmentResult<Order> {
    let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?;
    match row {
      Some(row) => Order::try_from(row),
      None => Err(FulfillmentError::OrderNotFound { order_id }),
    }
  }

  #[instrument(skip(self, order), fields(order_id = %order.id, version = order.version))]
  async fn save(&self, order: &Order) -> FulfillmentResult<Order> {
    let row = sqlx::query_as::<_, OrderRow>(
      r#"
      UPDATE orders SET
        items = $3,
        promo_discount_cents = $4,
        total_cents = $5,
        payment_status = $6,
        order_status = $7,
        customization_status = $8,
        transaction_id = $9,
        paid_at = $10,
        payer_email = $11,
        download_expires_at = $12,
        order_history = $13,
        updated_at = $14,
        version = version + 1
      WHERE id = $1 AND version = $2
      RETURNING *
      "#,
    )
    .bind(order.id)
    .bind(order.version as i64)
    .bind(Json(&order.items))
    .bind(order.promo_discount_cents)
    .bind(order.total_cents)
    .bind(order.payment_status.as_str())
    .bind(order.order_status.as_str())
    .bind(order.customization_status.as_str())
    .bind(&order.transaction_id)
    .bind(order.paid_at)
    .bind(&order.payer_email)
    .bind(order.download_expires_at)
    .bind(Json(&order.order_history))
    .bind(order.updated_at)
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error)?;

    if let Some(row) = row {
      return Order::try_from(row);
    }
    if self.exists(order.id).await? {
      Err(FulfillmentError::VersionConflict {
        order_id: order.id,
        expected: order.version,
      })
    } else {
      Err(FulfillmentError::OrderNotFound { order_id: order.id })
    }
  }

  #[instrument(skip(self, claim), fields(payment_status = %claim.status))]
  async fn claim_payment(
    &self,
    order_id: Uuid,
    claim: &PaymentClaim,
    now: DateTime<Utc>,
  ) -> FulfillmentResult<PaymentClaimOutcome> {
    let entry = HistoryEntry {
      status: OrderStatus::Processing,
      timestamp: now,
      note: claim.note.clone(),
      actor: claim.actor,
    };
    let claimed = sqlx::query_as::<_, OrderRow>(
      r#"
      UPDATE orders SET
        payment_status = $2,
        transaction_id = $3,
        payer_email = $4,
        paid_at = $5,
        updated_at = $5,
        order_status = $6,
        order_history = order_history || $7,
        version = version + 1
      WHERE id = $1 AND payment_status = ANY($8) AND order_status <> $9
      RETURNING *
      "#,
    )
    .bind(order_id)
    .bind(claim.status.as_str())
    .bind(&claim.transaction_id)
    .bind(&claim.payer_email)
    .bind(now)
    .bind(OrderStatus::Processing.as_str())
    .bind(Json(vec![entry]))
    .bind(&CLAIMABLE[..])
    .bind(OrderStatus::Cancelled.as_str())
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error)?;

    match claimed {
      Some(row) => Ok(PaymentClaimOutcome::Claimed(Order::try_from(row)?)),
      None => {
        // Unknown, or no longer accepting payment; `load` tells which.
        let current = self.load(order_id).await?;
        debug!(%order_id, payment_status = %current.payment_status, "Conditional payment claim matched no row.");
        Ok(PaymentClaimOutcome::AlreadySettled(current))
      }
    }
  }
}
