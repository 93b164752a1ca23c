use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Failures of the OCR collaborator
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OcrError {
    #[error("Image not found: {path}")]
    ImageNotFound { path: String },

    #[error("Could not read image {path}: {message}")]
    Unreadable { path: String, message: String },

    #[error("OCR provider failed: {0}")]
    Provider(String),

    #[error("Malformed OCR response: {0}")]
    MalformedResponse(String),
}

impl OcrError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }
}

/// Image to structured invoice JSON
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InvoiceOcrService: Send + Sync + Debug {
    /// Extract the invoice payload from the image at `image_path`
    ///
    /// The returned value is a JSON object shaped like
    /// [`InvoiceExtraction`](crate::domain::invoice::InvoiceExtraction).
    async fn extract(&self, image_path: &str) -> Result<Value, OcrError>;
}
