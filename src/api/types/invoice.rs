//! Request and response bodies of the invoice endpoints

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    DbStatus, InvoiceStatistics, ProcessingLogEntry, QueryError, QueryResult, WorkflowState,
};

/// Overall outcome reported for an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Success,
    Failed,
}

/// Summary of one workflow run
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInvoiceResponse {
    pub invoice_id: Option<String>,
    pub status: ProcessingStatus,
    pub invoice_number: Option<String>,
    pub total_amount: Option<Decimal>,
    pub confidence_score: Option<f64>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub query_results: Vec<QueryResult>,
    pub processing_logs: Vec<ProcessingLogEntry>,
    /// Seconds
    pub processing_time: f64,
}

impl ProcessInvoiceResponse {
    pub fn from_state(state: &WorkflowState, processing_time: f64) -> Self {
        let status = if state.db_status() == DbStatus::Saved {
            ProcessingStatus::Success
        } else {
            ProcessingStatus::Failed
        };

        let invoice = state.processed_invoice();
        let validation = state.validation_result();

        Self {
            invoice_id: state.invoice_id().map(str::to_string),
            status,
            invoice_number: invoice.map(|i| i.invoice_number.clone()),
            total_amount: invoice.map(|i| i.summary.total_amount_due),
            confidence_score: state.ocr_result().map(|r| r.overall_confidence()),
            errors: state.errors().to_vec(),
            warnings: validation.map(|v| v.warnings.clone()).unwrap_or_default(),
            suggestions: validation.map(|v| v.suggestions.clone()).unwrap_or_default(),
            query_results: state.query_results().to_vec(),
            processing_logs: state.processing_logs().to_vec(),
            processing_time,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Answer to a natural-language question
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
    pub sql_generated: Option<String>,
    pub row_count: u64,
    pub execution_time: f64,
    pub success: bool,
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn failed(query: impl Into<String>, error: &QueryError, execution_time: f64) -> Self {
        Self {
            query: query.into(),
            answer: String::new(),
            sql_generated: None,
            row_count: 0,
            execution_time,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Optional question sent with an upload as a query-string parameter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessInvoiceParams {
    pub query: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsResponse {
    pub statistics: InvoiceStatistics,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OcrStatus, StateUpdate};

    #[test]
    fn test_failed_run_summary() {
        let mut state = WorkflowState::new("uploads/a.png", None);
        state.apply(
            StateUpdate::new()
                .with_ocr_status(OcrStatus::Failed)
                .with_error("OCR Error: Image not found: uploads/a.png"),
        );

        let response = ProcessInvoiceResponse::from_state(&state, 0.5);

        assert_eq!(response.status, ProcessingStatus::Failed);
        assert!(response.invoice_id.is_none());
        assert!(response.invoice_number.is_none());
        assert!(response.confidence_score.is_none());
        assert_eq!(response.errors.len(), 1);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "FAILED");
    }

    #[test]
    fn test_query_failure_body() {
        let err = QueryError::Execution("relation \"x\" does not exist".to_string());

        let response = QueryResponse::failed("q", &err, 0.2);

        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("SQL execution failed: relation \"x\" does not exist")
        );
        assert!(response.sql_generated.is_none());
    }
}
