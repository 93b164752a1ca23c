//! Workflow domain module
//!
//! State model, partial updates and their merge policy, decision predicates,
//! the stage graph and the stage error taxonomy. The engine that drives the
//! graph lives in `infrastructure::workflow`.

mod error;
mod graph;
mod processor;
mod routing;
mod state;

pub use error::WorkflowError;
pub use graph::{Stage, Transition, WorkflowGraph, DEFAULT_MAX_TRANSITIONS};
pub use processor::{InvoiceProcessor, WorkflowInput};
pub use routing::{
    check_ocr_status, check_query_needed, check_validation_status, OcrDecision, QueryDecision,
    ValidationDecision,
};
pub use state::{
    DbStatus, LogStatus, MergePolicy, OcrStatus, ProcessingLogEntry, StateField, StateUpdate,
    WorkflowState,
};

#[cfg(test)]
pub use processor::MockInvoiceProcessor;
