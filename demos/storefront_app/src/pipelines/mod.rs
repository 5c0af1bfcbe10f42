// storefront_app/src/pipelines/mod.rs

//! Request-side pipelines of the storefront. Order fulfillment itself runs in
//! the `fulfillment` crate's own pipeline.

pub mod contexts;
pub mod webhook_pipeline;

pub use contexts::PayPalWebhookCtxData;
pub use webhook_pipeline::build_paypal_webhook_pipeline;
