// fulfillment/src/core/mod.rs

//! Building blocks shared by every pipeline: the lockable context wrapper,
//! flow-control signals and step definitions.

pub mod context_data;
pub mod control;
pub mod step;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineResult};
pub use step::{Handler, SkipCondition, StepDef};
