// storefront_app/src/state.rs
use crate::config::AppConfig;
use crate::db::{PgDesignFileCatalog, PgGrantStore, PgOrderStore};
use crate::errors::AppError;
use crate::pipelines::PayPalWebhookCtxData;
use fulfillment::{FulfillmentOrchestrator, PaymentGateway, Pipeline};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub db_pool: PgPool,
  pub orders: Arc<PgOrderStore>,
  pub catalog: Arc<PgDesignFileCatalog>,
  pub grants: Arc<PgGrantStore>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub orchestrator: FulfillmentOrchestrator,
  pub webhook_pipeline: Arc<Pipeline<PayPalWebhookCtxData, AppError>>,
  pub config: Arc<AppConfig>,
}
