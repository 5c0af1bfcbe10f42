// src/lib.rs

//! Fulfillment: order delivery for a digital-goods storefront.
//!
//! Once a payment is confirmed, the crate decides per line item whether
//! existing design files can be delivered right away or a designer must
//! produce custom artwork, grants file access, updates the order and notifies
//! the customer and the shop admin. The work is an ordered pipeline of named
//! async steps over a shared context:
//!  - Named steps with before/on/after hooks and skip conditions.
//!  - Optional steps whose failures are logged instead of aborting the run.
//!  - Early stopping when a duplicate payment event is detected.
//!  - Pluggable stores, catalog, notifier and payment gateway behind traits.
//!
//! Typical wiring:
//!  1. Build a `FulfillmentOrchestrator` from an `OrderStore`, a
//!     `DesignFileCatalog`, a `GrantStore`, a `Notifier` and a
//!     `FulfillmentConfig`.
//!  2. On every payment event call `fulfill(order_id, PaymentContext)`.
//!     Replays and concurrent duplicates return `AlreadyProcessed`.
//!  3. Orders left in `processing` by a failed pass are picked up again with
//!     `redeliver(order_id)`.

pub mod config;
pub mod core;
pub mod error;
pub mod fulfillment;
pub mod model;
pub mod notify;
pub mod payment;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod store;

// --- Re-exports for the Public API ---

pub use crate::core::{ContextData, Handler, PipelineControl, PipelineResult, SkipCondition, StepDef};
pub use crate::pipeline::Pipeline;

pub use crate::config::FulfillmentConfig;
pub use crate::error::{FulfillmentError, FulfillmentResult, PipelineError};
pub use crate::fulfillment::{DeliveryPlan, FulfillmentOrchestrator, FulfillmentOutcome, FulfillmentReport};
pub use crate::model::{
  ColorSelection, Customer, CustomizationStatus, Customizations, DeliveryStatus, DesignFile, DesignFileQuery,
  HistoryActor, HistoryEntry, Order, OrderDesignFile, OrderItem, OrderStatus, PaymentStatus, TextChange, UploadedImage,
};
pub use crate::notify::{
  AdminOrderNotification, CompletedOrderEmail, CustomizationProcessingEmail, LogNotifier, NotificationKind,
  NotificationSummary, Notifier,
};
pub use crate::payment::{CaptureConfirmation, PaymentContext, PaymentGateway, PaymentSource};
pub use crate::resolver::{DeliveryKind, DeliveryResolver, DeliveryVerdict, ItemResolution, ItemVerdict, ResolutionReason};
pub use crate::retry::{retry_with_backoff, RetryPolicy};
pub use crate::store::{
  DesignFileCatalog, GrantOutcome, GrantStore, MemoryDesignFileCatalog, MemoryGrantStore, MemoryOrderStore, OrderStore,
  PaymentClaimOutcome,
};
