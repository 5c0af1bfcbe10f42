// storefront_app/src/web/handlers/mod.rs

pub mod admin_handlers;
pub mod download_handlers;
pub mod payment_handlers;
pub mod webhook_handlers;
