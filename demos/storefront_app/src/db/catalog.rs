// storefront_app/src/db/catalog.rs

use super::db_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulfillment::{DesignFile, DesignFileCatalog, DesignFileQuery, FulfillmentError, FulfillmentResult};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct DesignFileRow {
  id: Uuid,
  product_id: String,
  file_name: String,
  file_url: String,
  file_type: String,
  file_size: i64,
  is_color_variant: bool,
  color_variant_hex: Option<String>,
  is_for_order: bool,
  is_active: bool,
  created_at: DateTime<Utc>,
}

impl From<DesignFileRow> for DesignFile {
  fn from(row: DesignFileRow) -> Self {
    DesignFile {
      id: row.id,
      product_id: row.product_id,
      file_name: row.file_name,
      file_url: row.file_url,
      file_type: row.file_type,
      file_size: u64::try_from(row.file_size).unwrap_or_default(),
      is_color_variant: row.is_color_variant,
      color_variant_hex: row.color_variant_hex,
      is_for_order: row.is_for_order,
      is_active: row.is_active,
      created_at: row.created_at,
    }
  }
}

#[derive(Clone)]
pub struct PgDesignFileCatalog {
  pool: PgPool,
}

impl PgDesignFileCatalog {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl DesignFileCatalog for PgDesignFileCatalog {
  // Filters on the indexed columns in SQL; hex comparison happens on the
  // normalized form in `DesignFile::matches`, since stored codes vary in case.
  #[instrument(skip(self), fields(product_id = %query.product_id()))]
  async fn find_files(&self, query: &DesignFileQuery) -> FulfillmentResult<Vec<DesignFile>> {
    let rows = sqlx::query_as::<_, DesignFileRow>(
      r#"
      SELECT * FROM design_files
      WHERE product_id = $1 AND is_color_variant = $2 AND is_for_order = $3 AND is_active = $4
      ORDER BY created_at, id
      "#,
    )
    .bind(query.product_id())
    .bind(query.is_color_variant())
    .bind(query.is_for_order())
    .bind(query.is_active())
    .fetch_all(&self.pool)
    .await
    .map_err(|e| FulfillmentError::CatalogLookup {
      product_id: query.product_id().to_string(),
      source: e.into(),
    })?;

    Ok(
      rows
        .into_iter()
        .map(DesignFile::from)
        .filter(|file| file.matches(query))
        .collect(),
    )
  }

  #[instrument(skip(self))]
  async fn file_by_id(&self, design_file_id: Uuid) -> FulfillmentResult<Option<DesignFile>> {
    let row = sqlx::query_as::<_, DesignFileRow>("SELECT * FROM design_files WHERE id = $1")
      .bind(design_file_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(row.map(DesignFile::from))
  }
}
