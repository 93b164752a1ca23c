//! Workflow infrastructure: stage implementations and the engine that drives them

mod engine;
pub mod stages;

pub use engine::{InvoiceWorkflow, GUARD_LOG_STEP};
pub use stages::WorkflowDependencies;
