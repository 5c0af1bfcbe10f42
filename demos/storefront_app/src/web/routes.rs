// storefront_app/src/web/routes.rs

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::state::AppState;
use crate::web::handlers::{admin_handlers, download_handlers, payment_handlers, webhook_handlers};

async fn health_check_handler(app_state: web::Data<AppState>) -> HttpResponse {
  match sqlx::query("SELECT 1").execute(&app_state.db_pool).await {
    Ok(_) => HttpResponse::Ok().json(json!({ "status": "ok" })),
    Err(e) => {
      tracing::warn!(error = %e, "Health check could not reach the database.");
      HttpResponse::ServiceUnavailable().json(json!({ "status": "degraded", "database": "unreachable" }))
    }
  }
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/orders/{order_id}")
          .route("/capture", web::post().to(payment_handlers::capture_payment_handler))
          .route("/free-checkout", web::post().to(payment_handlers::free_checkout_handler)),
      )
      .route("/webhooks/paypal", web::post().to(webhook_handlers::paypal_webhook_handler))
      // Access control for the admin scope is the deployment's reverse proxy.
      .route(
        "/admin/orders/{order_id}/redeliver",
        web::post().to(admin_handlers::redeliver_handler),
      )
      .route(
        "/downloads/{order_id}/{design_file_id}",
        web::get().to(download_handlers::download_handler),
      ),
  );
}
