//! Application state shared by the handlers

use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::{InvoiceProcessor, InvoiceQueryAgent, InvoiceRepository};

/// Collaborators behind the HTTP surface
#[derive(Debug, Clone)]
pub struct AppState {
    pub processor: Arc<dyn InvoiceProcessor>,
    pub query_agent: Arc<dyn InvoiceQueryAgent>,
    pub repository: Arc<dyn InvoiceRepository>,
    /// Uploaded images are written here for the duration of a run
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(
        processor: Arc<dyn InvoiceProcessor>,
        query_agent: Arc<dyn InvoiceQueryAgent>,
        repository: Arc<dyn InvoiceRepository>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            processor,
            query_agent,
            repository,
            upload_dir: upload_dir.into(),
        }
    }
}
