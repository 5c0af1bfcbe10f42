// storefront_app/src/db/grants.rs

use super::db_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulfillment::{FulfillmentError, FulfillmentResult, GrantOutcome, GrantStore, OrderDesignFile};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct GrantRow {
  order_id: Uuid,
  design_file_id: Uuid,
  download_count: i32,
  last_downloaded_at: Option<DateTime<Utc>>,
  is_active: bool,
  granted_at: DateTime<Utc>,
}

impl From<GrantRow> for OrderDesignFile {
  fn from(row: GrantRow) -> Self {
    OrderDesignFile {
      order_id: row.order_id,
      design_file_id: row.design_file_id,
      download_count: u32::try_from(row.download_count).unwrap_or_default(),
      last_downloaded_at: row.last_downloaded_at,
      is_active: row.is_active,
      granted_at: row.granted_at,
    }
  }
}

#[derive(Clone)]
pub struct PgGrantStore {
  pool: PgPool,
}

impl PgGrantStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl GrantStore for PgGrantStore {
  #[instrument(skip(self, now))]
  async fn grant_access(
    &self,
    order_id: Uuid,
    design_file_id: Uuid,
    now: DateTime<Utc>,
  ) -> FulfillmentResult<GrantOutcome> {
    let inserted = sqlx::query(
      r#"
      INSERT INTO order_design_files (order_id, design_file_id, download_count, is_active, granted_at)
      VALUES ($1, $2, 0, TRUE, $3)
      ON CONFLICT (order_id, design_file_id) DO NOTHING
      "#,
    )
    .bind(order_id)
    .bind(design_file_id)
    .bind(now)
    .execute(&self.pool)
    .await
    .map_err(db_error)?
    .rows_affected();

    Ok(if inserted == 1 {
      GrantOutcome::Created
    } else {
      GrantOutcome::AlreadyGranted
    })
  }

  #[instrument(skip(self))]
  async fn grants_for_order(&self, order_id: Uuid) -> FulfillmentResult<Vec<OrderDesignFile>> {
    let rows = sqlx::query_as::<_, GrantRow>(
      "SELECT * FROM order_design_files WHERE order_id = $1 ORDER BY granted_at, design_file_id",
    )
    .bind(order_id)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(rows.into_iter().map(OrderDesignFile::from).collect())
  }

  #[instrument(skip(self, now))]
  async fn record_download(
    &self,
    order_id: Uuid,
    design_file_id: Uuid,
    now: DateTime<Utc>,
  ) -> FulfillmentResult<OrderDesignFile> {
    let row = sqlx::query_as::<_, GrantRow>(
      r#"
      UPDATE order_design_files
      SET download_count = download_count + 1, last_downloaded_at = $3
      WHERE order_id = $1 AND design_file_id = $2 AND is_active
      RETURNING *
      "#,
    )
    .bind(order_id)
    .bind(design_file_id)
    .bind(now)
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error)?;

    row.map(OrderDesignFile::from).ok_or(FulfillmentError::GrantNotFound {
      order_id,
      design_file_id,
    })
  }
}
