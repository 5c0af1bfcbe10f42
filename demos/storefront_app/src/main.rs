// storefront_app/src/main.rs

mod config;
mod db;
mod errors;
mod pipelines;
mod services;
mod state;
mod web;

use crate::config::AppConfig;
use crate::db::{PgDesignFileCatalog, PgGrantStore, PgOrderStore};
use crate::services::{MailNotifier, SimulatedPayPalGateway};
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use anyhow::Context;
use fulfillment::FulfillmentOrchestrator;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // RUST_LOG override
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting storefront server...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(anyhow::anyhow!("configuration error: {}", e));
    }
  };

  let db_pool = db::connect(&app_config.database_url)
    .await
    .context("connecting to the database")?;
  tracing::info!("Successfully connected to the database.");
  db::migrate(&db_pool).await.context("running database migrations")?;

  let orders = Arc::new(PgOrderStore::new(db_pool.clone()));
  let catalog = Arc::new(PgDesignFileCatalog::new(db_pool.clone()));
  let grants = Arc::new(PgGrantStore::new(db_pool.clone()));
  let notifier = Arc::new(MailNotifier::new(
    app_config.mail_sender.clone(),
    app_config.admin_email.clone(),
  ));

  let orchestrator = FulfillmentOrchestrator::new(
    orders.clone(),
    catalog.clone(),
    grants.clone(),
    notifier,
    app_config.fulfillment_config(),
  );

  let app_state = AppState {
    db_pool,
    gateway: Arc::new(SimulatedPayPalGateway::new(orders.clone())),
    orders,
    catalog,
    grants,
    orchestrator,
    webhook_pipeline: Arc::new(pipelines::build_paypal_webhook_pipeline()),
    config: app_config.clone(),
  };
  tracing::info!(
    webhook_verification = app_config.paypal_webhook_id.is_some(),
    "Fulfillment wired."
  );
  if app_config.paypal_webhook_id.is_none() {
    tracing::warn!("PAYPAL_WEBHOOK_ID is not set; PayPal webhooks will be accepted without signature verification.");
  }

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await?;
  Ok(())
}
