//! HTTP request, response and error types

pub mod error;
pub mod invoice;
pub mod json;

pub use error::{ApiError, ApiErrorResponse, ApiErrorType};
pub use invoice::{
    ProcessInvoiceParams, ProcessInvoiceResponse, ProcessingStatus, QueryRequest, QueryResponse,
    StatisticsResponse,
};
pub use json::Json;
