// fulfillment/src/fulfillment/mod.rs

//! The fulfillment orchestrator: claims the payment, resolves delivery,
//! grants file access, updates the order and notifies, as one pipeline run.

pub mod context;
pub mod orchestrator;
pub mod plan;
pub mod steps;

pub use context::{FulfillmentCtxData, FulfillmentMode, FulfillmentServices};
pub use orchestrator::{FulfillmentOrchestrator, FulfillmentReport};
pub use plan::{DeliveryPlan, FulfillmentOutcome, PlannedItem, MISSING_CUSTOMIZATION_NOTE, PENDING_REVIEW_NOTE};
pub use steps::build_fulfillment_pipeline;
