use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Failures of the NL-to-SQL agent
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    /// The model could not produce a usable statement
    #[error("SQL generation failed: {0}")]
    Generation(String),

    /// The statement was produced but running it failed
    #[error("SQL execution failed: {0}")]
    Execution(String),
}

/// Answer to a natural-language question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub question: String,
    pub sql: String,
    pub answer: String,
    pub row_count: u64,
}

/// Question to SQL to prose
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InvoiceQueryAgent: Send + Sync + Debug {
    /// Translate a question into one read-only SQL statement
    async fn generate_sql(&self, question: &str) -> Result<String, QueryError>;

    /// Generate, execute and summarise
    async fn answer(&self, question: &str) -> Result<QueryAnswer, QueryError>;
}
