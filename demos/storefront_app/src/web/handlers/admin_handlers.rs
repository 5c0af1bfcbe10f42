// storefront_app/src/web/handlers/admin_handlers.rs

use actix_web::{web, HttpResponse};
use tracing::instrument;
use uuid::Uuid;

use crate::errors::Result as AppResult;
use crate::state::AppState;

/// Replays delivery for an order an earlier pass left in `processing`.
#[instrument(name = "handler::redeliver", skip(app_state))]
pub async fn redeliver_handler(app_state: web::Data<AppState>, order_id: web::Path<Uuid>) -> AppResult<HttpResponse> {
  let report = app_state.orchestrator.redeliver(order_id.into_inner()).await?;
  Ok(HttpResponse::Ok().json(report))
}
