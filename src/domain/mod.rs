//! Domain layer - Core business logic and entities

pub mod error;
pub mod invoice;
pub mod llm;
pub mod ocr;
pub mod query;
pub mod workflow;

pub use error::DomainError;
pub use invoice::{
    InvoiceItem, InvoiceLookup, InvoiceRecord, InvoiceRepository, InvoiceStatistics,
    InvoiceSummary, InvoiceValidator, Party, ProcessedInvoice, QueryOutcome, ValidationResult,
};
pub use llm::{
    ContentPart, FinishReason, LlmProvider, LlmRequest, LlmRequestBuilder, LlmResponse,
    LlmResponseFormat, Message, MessageRole, Usage,
};
pub use ocr::{InvoiceOcrService, OcrError, OcrResult};
pub use query::{InvoiceQueryAgent, QueryAnswer, QueryError, QueryResult};
pub use workflow::{
    DbStatus, InvoiceProcessor, OcrStatus, ProcessingLogEntry, Stage, StateUpdate, Transition,
    WorkflowError, WorkflowGraph, WorkflowInput, WorkflowState,
};
