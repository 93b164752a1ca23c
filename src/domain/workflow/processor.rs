//! Entry point trait of the workflow

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use super::state::WorkflowState;

#[cfg(test)]
use mockall::automock;

/// One invoice to process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub image_path: String,
    #[serde(default)]
    pub user_query: Option<String>,
}

impl WorkflowInput {
    pub fn new(image_path: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            user_query: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.user_query = Some(query.into());
        self
    }
}

/// Runs the invoice workflow
///
/// `run` always returns the final state; failures are recorded in it rather
/// than returned as errors.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InvoiceProcessor: Send + Sync + Debug {
    async fn run(&self, image_path: &str, user_query: Option<String>) -> WorkflowState;

    /// Process independent inputs, at most `concurrency` at a time; output order matches input
    async fn run_batch(&self, inputs: Vec<WorkflowInput>, concurrency: usize) -> Vec<WorkflowState>;
}
