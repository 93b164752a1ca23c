//! Workflow state and partial updates
//!
//! A [`WorkflowState`] is owned by a single run. Stages read it by shared
//! reference and return a [`StateUpdate`]; [`WorkflowState::apply`] is the
//! only way state changes after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::invoice::{ProcessedInvoice, ValidationResult};
use crate::domain::ocr::OcrResult;
use crate::domain::query::QueryResult;

/// OCR stage status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

/// Persistence stage status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbStatus {
    #[default]
    Pending,
    Saved,
    Failed,
}

/// Status tag of a processing log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Warning,
    Failed,
}

/// Structured record of one stage execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub step: String,
    pub status: LogStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingLogEntry {
    pub fn new(step: impl Into<String>, status: LogStatus) -> Self {
        Self {
            step: step.into(),
            status,
            timestamp: Utc::now(),
            details: Value::Null,
            error: None,
        }
    }

    pub fn success(step: impl Into<String>) -> Self {
        Self::new(step, LogStatus::Success)
    }

    pub fn failed(step: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(step, LogStatus::Failed).with_error(error)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// How a field of the state absorbs a partial update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Set when the run is created, never part of an update
    Input,
    /// A present value replaces the current one
    Overwrite,
    /// Update entries are appended after the current ones
    Concatenate,
}

/// Every field of [`WorkflowState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    ImagePath,
    UserQuery,
    OcrResult,
    OcrStatus,
    ProcessedInvoice,
    ValidationResult,
    InvoiceId,
    DbStatus,
    QueryResults,
    Errors,
    ProcessingLogs,
}

impl StateField {
    pub const ALL: [StateField; 11] = [
        Self::ImagePath,
        Self::UserQuery,
        Self::OcrResult,
        Self::OcrStatus,
        Self::ProcessedInvoice,
        Self::ValidationResult,
        Self::InvoiceId,
        Self::DbStatus,
        Self::QueryResults,
        Self::Errors,
        Self::ProcessingLogs,
    ];

    pub fn merge_policy(&self) -> MergePolicy {
        match self {
            Self::ImagePath | Self::UserQuery => MergePolicy::Input,
            Self::QueryResults | Self::Errors | Self::ProcessingLogs => MergePolicy::Concatenate,
            Self::OcrResult
            | Self::OcrStatus
            | Self::ProcessedInvoice
            | Self::ValidationResult
            | Self::InvoiceId
            | Self::DbStatus => MergePolicy::Overwrite,
        }
    }
}

/// Partial update returned by a stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub ocr_result: Option<OcrResult>,
    pub ocr_status: Option<OcrStatus>,
    pub processed_invoice: Option<ProcessedInvoice>,
    pub validation_result: Option<ValidationResult>,
    pub invoice_id: Option<String>,
    pub db_status: Option<DbStatus>,
    pub query_results: Vec<QueryResult>,
    pub errors: Vec<String>,
    pub processing_logs: Vec<ProcessingLogEntry>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ocr_result(mut self, result: OcrResult) -> Self {
        self.ocr_result = Some(result);
        self
    }

    pub fn with_ocr_status(mut self, status: OcrStatus) -> Self {
        self.ocr_status = Some(status);
        self
    }

    pub fn with_processed_invoice(mut self, invoice: ProcessedInvoice) -> Self {
        self.processed_invoice = Some(invoice);
        self
    }

    pub fn with_validation_result(mut self, result: ValidationResult) -> Self {
        self.validation_result = Some(result);
        self
    }

    pub fn with_invoice_id(mut self, invoice_id: impl Into<String>) -> Self {
        self.invoice_id = Some(invoice_id.into());
        self
    }

    pub fn with_db_status(mut self, status: DbStatus) -> Self {
        self.db_status = Some(status);
        self
    }

    pub fn with_query_result(mut self, result: QueryResult) -> Self {
        self.query_results.push(result);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    pub fn with_log(mut self, entry: ProcessingLogEntry) -> Self {
        self.processing_logs.push(entry);
        self
    }

    /// Fields this update writes
    pub fn fields(&self) -> Vec<StateField> {
        let mut fields = Vec::new();
        if self.ocr_result.is_some() {
            fields.push(StateField::OcrResult);
        }
        if self.ocr_status.is_some() {
            fields.push(StateField::OcrStatus);
        }
        if self.processed_invoice.is_some() {
            fields.push(StateField::ProcessedInvoice);
        }
        if self.validation_result.is_some() {
            fields.push(StateField::ValidationResult);
        }
        if self.invoice_id.is_some() {
            fields.push(StateField::InvoiceId);
        }
        if self.db_status.is_some() {
            fields.push(StateField::DbStatus);
        }
        if !self.query_results.is_empty() {
            fields.push(StateField::QueryResults);
        }
        if !self.errors.is_empty() {
            fields.push(StateField::Errors);
        }
        if !self.processing_logs.is_empty() {
            fields.push(StateField::ProcessingLogs);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// Accumulated state of one workflow run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowState {
    image_path: String,
    user_query: Option<String>,
    ocr_result: Option<OcrResult>,
    ocr_status: OcrStatus,
    processed_invoice: Option<ProcessedInvoice>,
    validation_result: Option<ValidationResult>,
    invoice_id: Option<String>,
    db_status: DbStatus,
    query_results: Vec<QueryResult>,
    errors: Vec<String>,
    processing_logs: Vec<ProcessingLogEntry>,
}

impl WorkflowState {
    pub fn new(image_path: impl Into<String>, user_query: Option<String>) -> Self {
        Self {
            image_path: image_path.into(),
            user_query,
            ocr_result: None,
            ocr_status: OcrStatus::Pending,
            processed_invoice: None,
            validation_result: None,
            invoice_id: None,
            db_status: DbStatus::Pending,
            query_results: Vec::new(),
            errors: Vec::new(),
            processing_logs: Vec::new(),
        }
    }

    /// Merge a stage update using each field's [`MergePolicy`]
    ///
    /// Overwrite fields are written at most once per run.
    pub fn apply(&mut self, update: StateUpdate) {
        debug_assert!(
            self.rewritten_field(&update).is_none(),
            "{:?} is already set",
            self.rewritten_field(&update)
        );

        let StateUpdate {
            ocr_result,
            ocr_status,
            processed_invoice,
            validation_result,
            invoice_id,
            db_status,
            query_results,
            errors,
            processing_logs,
        } = update;

        overwrite(&mut self.ocr_result, ocr_result);
        if let Some(status) = ocr_status {
            self.ocr_status = status;
        }
        overwrite(&mut self.processed_invoice, processed_invoice);
        overwrite(&mut self.validation_result, validation_result);
        overwrite(&mut self.invoice_id, invoice_id);
        if let Some(status) = db_status {
            self.db_status = status;
        }

        self.query_results.extend(query_results);
        self.errors.extend(errors);
        self.processing_logs.extend(processing_logs);
    }

    /// First overwrite field the update writes that this state already holds
    pub fn rewritten_field(&self, update: &StateUpdate) -> Option<StateField> {
        update
            .fields()
            .into_iter()
            .filter(|field| field.merge_policy() == MergePolicy::Overwrite)
            .find(|field| self.is_set(*field))
    }

    fn is_set(&self, field: StateField) -> bool {
        match field {
            StateField::ImagePath | StateField::UserQuery => true,
            StateField::OcrResult => self.ocr_result.is_some(),
            StateField::OcrStatus => self.ocr_status != OcrStatus::Pending,
            StateField::ProcessedInvoice => self.processed_invoice.is_some(),
            StateField::ValidationResult => self.validation_result.is_some(),
            StateField::InvoiceId => self.invoice_id.is_some(),
            StateField::DbStatus => self.db_status != DbStatus::Pending,
            StateField::QueryResults => !self.query_results.is_empty(),
            StateField::Errors => !self.errors.is_empty(),
            StateField::ProcessingLogs => !self.processing_logs.is_empty(),
        }
    }

    pub fn image_path(&self) -> &str {
        &self.image_path
    }

    pub fn user_query(&self) -> Option<&str> {
        self.user_query.as_deref()
    }

    pub fn ocr_result(&self) -> Option<&OcrResult> {
        self.ocr_result.as_ref()
    }

    pub fn ocr_status(&self) -> OcrStatus {
        self.ocr_status
    }

    pub fn processed_invoice(&self) -> Option<&ProcessedInvoice> {
        self.processed_invoice.as_ref()
    }

    pub fn validation_result(&self) -> Option<&ValidationResult> {
        self.validation_result.as_ref()
    }

    pub fn invoice_id(&self) -> Option<&str> {
        self.invoice_id.as_deref()
    }

    pub fn db_status(&self) -> DbStatus {
        self.db_status
    }

    pub fn query_results(&self) -> &[QueryResult] {
        &self.query_results
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn processing_logs(&self) -> &[ProcessingLogEntry] {
        &self.processing_logs
    }

    /// Lengths of the accumulating lists: (errors, logs, query results)
    pub fn accumulated_lengths(&self) -> (usize, usize, usize) {
        (
            self.errors.len(),
            self.processing_logs.len(),
            self.query_results.len(),
        )
    }
}

fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_pending() {
        let state = WorkflowState::new("invoice.png", None);

        assert_eq!(state.image_path(), "invoice.png");
        assert_eq!(state.ocr_status(), OcrStatus::Pending);
        assert_eq!(state.db_status(), DbStatus::Pending);
        assert!(state.errors().is_empty());
        assert!(state.ocr_result().is_none());
    }

    #[test]
    fn test_merge_policies() {
        assert_eq!(StateField::ImagePath.merge_policy(), MergePolicy::Input);
        assert_eq!(StateField::OcrStatus.merge_policy(), MergePolicy::Overwrite);
        assert_eq!(StateField::InvoiceId.merge_policy(), MergePolicy::Overwrite);

        let concatenated: Vec<_> = StateField::ALL
            .iter()
            .filter(|f| f.merge_policy() == MergePolicy::Concatenate)
            .copied()
            .collect();
        assert_eq!(
            concatenated,
            vec![StateField::QueryResults, StateField::Errors, StateField::ProcessingLogs]
        );
    }

    #[test]
    fn test_lists_concatenate() {
        let mut state = WorkflowState::new("a.png", None);

        state.apply(
            StateUpdate::new()
                .with_error("first")
                .with_log(ProcessingLogEntry::success("OCR")),
        );
        state.apply(
            StateUpdate::new()
                .with_error("second")
                .with_log(ProcessingLogEntry::failed("VALIDATE", "boom")),
        );

        assert_eq!(state.errors(), ["first", "second"]);
        assert_eq!(state.processing_logs().len(), 2);
        assert_eq!(state.processing_logs()[1].error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_scalars_overwrite_only_when_present() {
        let mut state = WorkflowState::new("a.png", None);

        state.apply(StateUpdate::new().with_db_status(DbStatus::Saved).with_invoice_id("id-1"));
        state.apply(StateUpdate::new().with_error("later"));

        assert_eq!(state.db_status(), DbStatus::Saved);
        assert_eq!(state.invoice_id(), Some("id-1"));
    }

    #[test]
    fn test_rewritten_field() {
        let mut state = WorkflowState::new("a.png", None);
        state.apply(StateUpdate::new().with_ocr_status(OcrStatus::Completed).with_error("e"));

        let again = StateUpdate::new().with_ocr_status(OcrStatus::Failed);
        assert_eq!(state.rewritten_field(&again), Some(StateField::OcrStatus));

        let fresh = StateUpdate::new().with_db_status(DbStatus::Saved).with_error("more");
        assert_eq!(state.rewritten_field(&fresh), None);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "Some(InvoiceId) is already set")]
    fn test_scalar_written_twice_panics() {
        let mut state = WorkflowState::new("a.png", None);
        state.apply(StateUpdate::new().with_invoice_id("id-1"));
        state.apply(StateUpdate::new().with_invoice_id("id-2"));
    }

    #[test]
    fn test_update_fields() {
        let update = StateUpdate::new()
            .with_ocr_status(OcrStatus::Failed)
            .with_error("OCR Error: x");

        assert_eq!(update.fields(), vec![StateField::OcrStatus, StateField::Errors]);
        assert!(StateUpdate::new().is_empty());
    }

    #[test]
    fn test_log_entry_serialization_skips_empty_fields() {
        let entry = ProcessingLogEntry::success("OCR");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["step"], "OCR");
        assert_eq!(json["status"], "success");
        assert!(json.get("details").is_none());
        assert!(json.get("error").is_none());
    }
}
