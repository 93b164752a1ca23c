//! Invoice OCR domain - service trait and extraction result

mod result;
mod service;

pub use result::OcrResult;
pub use service::{InvoiceOcrService, OcrError};

#[cfg(test)]
pub use service::MockInvoiceOcrService;
