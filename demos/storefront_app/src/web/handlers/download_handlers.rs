// storefront_app/src/web/handlers/download_handlers.rs

use actix_web::http::header;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::state::AppState;
use fulfillment::{DesignFileCatalog, GrantStore, Order, OrderStore};

fn ensure_not_expired(order: &Order, now: DateTime<Utc>) -> AppResult<()> {
  match order.download_expires_at {
    Some(expires_at) if expires_at > now => Ok(()),
    Some(expires_at) => Err(AppError::Gone(format!(
      "downloads for order {} expired at {}",
      order.order_number, expires_at
    ))),
    None => Err(AppError::NotFound(format!(
      "order {} has no downloadable files",
      order.order_number
    ))),
  }
}

#[instrument(name = "handler::download", skip(app_state))]
pub async fn download_handler(
  app_state: web::Data<AppState>,
  path: web::Path<(Uuid, Uuid)>,
) -> AppResult<HttpResponse> {
  let (order_id, design_file_id) = path.into_inner();
  let now = Utc::now();

  let order = app_state.orders.load(order_id).await?;
  ensure_not_expired(&order, now)?;

  let file = app_state
    .catalog
    .file_by_id(design_file_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("design file {}", design_file_id)))?;
  let grant = app_state.grants.record_download(order_id, design_file_id, now).await?;

  info!(
    %order_id,
    %design_file_id,
    download_count = grant.download_count,
    "Download granted; redirecting to file."
  );
  Ok(
    HttpResponse::Found()
      .insert_header((header::LOCATION, file.file_url))
      .finish(),
  )
}
