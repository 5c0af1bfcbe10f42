// fulfillment/src/model/mod.rs

//! Domain entities: orders with their line items, customer customizations,
//! catalog design files and per-order file-access grants.

pub mod customization;
pub mod design_file;
pub mod order;

pub use customization::{ColorSelection, Customizations, TextChange, UploadedImage};
pub use design_file::{normalize_hex, DesignFile, DesignFileQuery, OrderDesignFile};
pub use order::{
  CustomizationStatus, Customer, DeliveryStatus, HistoryActor, HistoryEntry, Order, OrderItem, OrderStatus,
  InvariantViolation, PaymentClaim, PaymentStatus,
};
