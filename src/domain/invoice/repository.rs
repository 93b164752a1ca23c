//! Invoice repository trait

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

use super::record::InvoiceRecord;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Point lookup key for a stored invoice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceLookup {
    Id(String),
    Number(String),
}

/// Outcome of a raw SQL execution
///
/// Execution failures are data, not errors: the caller gets `success: false`
/// and the driver message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub row_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryOutcome {
    /// Rows returned by a SELECT
    pub fn rows(rows: Vec<Value>) -> Self {
        let row_count = rows.len() as u64;
        Self {
            success: true,
            data: Some(Value::Array(rows)),
            row_count,
            error: None,
        }
    }

    /// Statement without a result set
    pub fn affected(row_count: u64) -> Self {
        Self {
            success: true,
            data: None,
            row_count,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            row_count: 0,
            error: Some(error.into()),
        }
    }

    /// Returned rows, empty when the statement produced none
    pub fn data_rows(&self) -> &[Value] {
        match &self.data {
            Some(Value::Array(rows)) => rows,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentInvoice {
    pub invoice_number: String,
    pub total_amount: Decimal,
    pub invoice_date: Option<chrono::NaiveDate>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyerTotal {
    pub name: String,
    pub invoice_count: i64,
    pub total_amount: Decimal,
}

/// Dashboard figures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceStatistics {
    pub total_invoices: i64,
    pub total_amount: Decimal,
    pub average_confidence: Option<f64>,
    pub status_distribution: Vec<StatusCount>,
    pub recent_invoices: Vec<RecentInvoice>,
    pub top_buyers: Vec<BuyerTotal>,
}

/// Number of rows shown in the recent-invoice and top-buyer lists
pub const STATISTICS_LIST_LIMIT: usize = 5;

/// Repository for invoice persistence
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InvoiceRepository: Send + Sync + Debug {
    /// Store the record across all invoice tables in one transaction; returns the invoice ID
    async fn save_invoice(&self, record: &InvoiceRecord) -> Result<String, DomainError>;

    /// Fetch an invoice with its seller, buyer, items, summary and payment rows
    async fn get_invoice(&self, lookup: &InvoiceLookup) -> Result<Option<Value>, DomainError>;

    /// Execute a raw SQL statement
    async fn execute_query(&self, sql: &str) -> QueryOutcome;

    /// Aggregate figures for the dashboard
    async fn statistics(&self) -> Result<InvoiceStatistics, DomainError>;

    /// Check the store is reachable
    async fn health_check(&self) -> bool {
        self.execute_query("SELECT 1").await.success
    }
}
