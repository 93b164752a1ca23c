//! Workflow stage error taxonomy

use thiserror::Error;

use crate::domain::invoice::{MappingError, ValidationFault};
use crate::domain::ocr::OcrError;
use crate::domain::query::QueryError;

/// Faults raised inside a stage
///
/// Stages never let these escape; each one is turned into an `errors` entry
/// carrying [`WorkflowError::prefix`] and a failed log entry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("{0}")]
    Ocr(String),

    #[error("{0}")]
    DataMapping(String),

    #[error("{0}")]
    ValidationFault(String),

    #[error("{0}")]
    Persistence(String),

    #[error("{0}")]
    QueryGeneration(String),

    #[error("{0}")]
    QueryExecution(String),
}

impl WorkflowError {
    pub fn ocr(message: impl Into<String>) -> Self {
        Self::Ocr(message.into())
    }

    pub fn data_mapping(message: impl Into<String>) -> Self {
        Self::DataMapping(message.into())
    }

    pub fn validation_fault(message: impl Into<String>) -> Self {
        Self::ValidationFault(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    pub fn query_generation(message: impl Into<String>) -> Self {
        Self::QueryGeneration(message.into())
    }

    pub fn query_execution(message: impl Into<String>) -> Self {
        Self::QueryExecution(message.into())
    }

    /// Prefix of the `errors` entry for this fault
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Ocr(_) => "OCR Error",
            Self::DataMapping(_) => "Processing Error",
            Self::ValidationFault(_) => "Validation Error",
            Self::Persistence(_) => "Database Error",
            Self::QueryGeneration(_) | Self::QueryExecution(_) => "Query Error",
        }
    }

    /// Entry appended to the state's `errors` list
    pub fn state_message(&self) -> String {
        format!("{}: {}", self.prefix(), self)
    }

    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ocr(_) => "ocr",
            Self::DataMapping(_) => "data_mapping",
            Self::ValidationFault(_) => "validation_fault",
            Self::Persistence(_) => "persistence",
            Self::QueryGeneration(_) => "query_generation",
            Self::QueryExecution(_) => "query_execution",
        }
    }
}

impl From<OcrError> for WorkflowError {
    fn from(error: OcrError) -> Self {
        Self::Ocr(error.to_string())
    }
}

impl From<MappingError> for WorkflowError {
    fn from(error: MappingError) -> Self {
        Self::DataMapping(error.to_string())
    }
}

impl From<ValidationFault> for WorkflowError {
    fn from(error: ValidationFault) -> Self {
        Self::ValidationFault(error.to_string())
    }
}

impl From<QueryError> for WorkflowError {
    fn from(error: QueryError) -> Self {
        match error {
            QueryError::Generation(message) => Self::QueryGeneration(message),
            QueryError::Execution(message) => Self::QueryExecution(message),
        }
    }
}
