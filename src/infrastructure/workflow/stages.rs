//! Stage functions
//!
//! Each stage reads the state it needs and returns a [`StateUpdate`]. Faults
//! never escape: they become an `errors` entry plus a failed log entry.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{info, warn};

use crate::config::{PersistenceSource, WorkflowSettings};
use crate::domain::invoice::{
    map_extraction_value, InvoiceRecord, InvoiceRepository, InvoiceValidator,
};
use crate::domain::workflow::{
    DbStatus, LogStatus, OcrStatus, ProcessingLogEntry, Stage, StateUpdate, WorkflowError,
    WorkflowState,
};
use crate::domain::{InvoiceOcrService, InvoiceQueryAgent, OcrResult, QueryResult};

/// Collaborators of one workflow instance
#[derive(Debug, Clone)]
pub struct WorkflowDependencies {
    pub ocr: Arc<dyn InvoiceOcrService>,
    pub repository: Arc<dyn InvoiceRepository>,
    pub query_agent: Arc<dyn InvoiceQueryAgent>,
    pub validator: InvoiceValidator,
    pub settings: WorkflowSettings,
}

impl WorkflowDependencies {
    pub fn new(
        ocr: Arc<dyn InvoiceOcrService>,
        repository: Arc<dyn InvoiceRepository>,
        query_agent: Arc<dyn InvoiceQueryAgent>,
    ) -> Self {
        Self {
            ocr,
            repository,
            query_agent,
            validator: InvoiceValidator::default(),
            settings: WorkflowSettings::default(),
        }
    }

    pub fn with_validator(mut self, validator: InvoiceValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }
}

fn failure(stage: Stage, error: &WorkflowError) -> StateUpdate {
    warn!(stage = stage.as_str(), kind = error.kind(), error = %error, "Stage failed");

    StateUpdate::new()
        .with_error(error.state_message())
        .with_log(ProcessingLogEntry::failed(stage.log_step(), error.to_string()))
}

pub async fn ocr(deps: &WorkflowDependencies, state: &WorkflowState) -> StateUpdate {
    let extracted = deps
        .ocr
        .extract(state.image_path())
        .await
        .and_then(OcrResult::from_extraction)
        .map_err(WorkflowError::from);

    match extracted {
        Ok(result) => {
            info!(confidence = result.overall_confidence(), "OCR completed");

            let log = ProcessingLogEntry::success(Stage::Ocr.log_step())
                .with_details(json!({ "confidence": result.confidence_scores }));

            StateUpdate::new()
                .with_ocr_result(result)
                .with_ocr_status(OcrStatus::Completed)
                .with_log(log)
        }
        Err(e) => failure(Stage::Ocr, &e).with_ocr_status(OcrStatus::Failed),
    }
}

pub async fn data_mapping(_deps: &WorkflowDependencies, state: &WorkflowState) -> StateUpdate {
    let mapped = state
        .ocr_result()
        .ok_or_else(|| WorkflowError::data_mapping("no OCR result to map"))
        .and_then(|ocr| map_extraction_value(&ocr.extraction).map_err(WorkflowError::from));

    match mapped {
        Ok(invoice) => {
            info!(
                invoice_number = %invoice.invoice_number,
                items = invoice.items.len(),
                "Invoice data mapped"
            );

            StateUpdate::new()
                .with_processed_invoice(invoice)
                .with_log(ProcessingLogEntry::success(Stage::DataMapping.log_step()))
        }
        Err(e) => failure(Stage::DataMapping, &e),
    }
}

pub async fn validation(deps: &WorkflowDependencies, state: &WorkflowState) -> StateUpdate {
    let verdict = state
        .processed_invoice()
        .ok_or_else(|| WorkflowError::validation_fault("no processed invoice to validate"))
        .and_then(|invoice| deps.validator.validate(invoice).map_err(WorkflowError::from));

    let result = match verdict {
        Ok(result) => result,
        Err(e) => return failure(Stage::Validation, &e),
    };

    let status = if result.is_valid {
        LogStatus::Success
    } else {
        LogStatus::Warning
    };
    info!(
        is_valid = result.is_valid,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "Invoice validated"
    );

    let details = serde_json::to_value(&result).unwrap_or_default();
    StateUpdate::new()
        .with_log(ProcessingLogEntry::new(Stage::Validation.log_step(), status).with_details(details))
        .with_validation_result(result)
}

fn persistence_record(
    source: PersistenceSource,
    state: &WorkflowState,
) -> Result<InvoiceRecord, WorkflowError> {
    let ocr = state
        .ocr_result()
        .ok_or_else(|| WorkflowError::persistence("no OCR result to save"))?;

    match source {
        PersistenceSource::RawExtraction => InvoiceRecord::from_extraction(&ocr.extraction)
            .map_err(|e| WorkflowError::persistence(e.to_string())),
        PersistenceSource::ProcessedInvoice => {
            let invoice = state
                .processed_invoice()
                .ok_or_else(|| WorkflowError::persistence("no processed invoice to save"))?;
            Ok(InvoiceRecord::from_processed(invoice, &ocr.extraction))
        }
    }
}

pub async fn persistence(deps: &WorkflowDependencies, state: &WorkflowState) -> StateUpdate {
    let record = match persistence_record(deps.settings.persistence_source, state) {
        Ok(record) => record,
        Err(e) => return failure(Stage::Persistence, &e).with_db_status(DbStatus::Failed),
    };

    match deps.repository.save_invoice(&record).await {
        Ok(invoice_id) => {
            info!(invoice_id = %invoice_id, "Invoice persisted");

            let log = ProcessingLogEntry::success(Stage::Persistence.log_step())
                .with_details(json!({ "invoice_id": invoice_id }));

            StateUpdate::new()
                .with_invoice_id(invoice_id)
                .with_db_status(DbStatus::Saved)
                .with_log(log)
        }
        Err(e) => {
            let error = WorkflowError::persistence(e.to_string());
            failure(Stage::Persistence, &error).with_db_status(DbStatus::Failed)
        }
    }
}

pub async fn query(deps: &WorkflowDependencies, state: &WorkflowState) -> StateUpdate {
    let Some(question) = state.user_query().filter(|q| !q.is_empty()) else {
        return StateUpdate::new();
    };

    let started = Instant::now();
    let answered = deps.query_agent.answer(question).await;
    let elapsed = started.elapsed().as_secs_f64();

    match answered {
        Ok(answer) => {
            info!(row_count = answer.row_count, elapsed_ms = elapsed * 1000.0, "Query answered");

            StateUpdate::new()
                .with_query_result(QueryResult::succeeded(&answer, elapsed))
                .with_log(ProcessingLogEntry::success(Stage::Query.log_step()))
        }
        Err(e) => {
            let error = WorkflowError::from(e);
            failure(Stage::Query, &error)
                .with_query_result(QueryResult::failed(question, error.to_string(), elapsed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invoice::MockInvoiceRepository;
    use crate::domain::query::MockInvoiceQueryAgent;
    use crate::domain::ocr::MockInvoiceOcrService;
    use crate::domain::{QueryAnswer, QueryError};
    use crate::infrastructure::storage::InMemoryInvoiceRepository;
    use serde_json::Value;

    fn deps() -> WorkflowDependencies {
        WorkflowDependencies::new(
            Arc::new(MockInvoiceOcrService::new()),
            Arc::new(MockInvoiceRepository::new()),
            Arc::new(MockInvoiceQueryAgent::new()),
        )
    }

    fn extraction() -> Value {
        json!({
            "invoice_info": {"invoice_number": "INV-1", "invoice_date": "2024-01-15"},
            "items": [{"description": "Widget", "quantity": 1, "unit_price": 5, "line_total": 5}],
            "summary": {"subtotal": 5, "total_amount_due": 5},
            "confidence_scores": {"overall": 88}
        })
    }

    fn state_after_ocr() -> WorkflowState {
        let mut state = WorkflowState::new("uploads/a.png", None);
        state.apply(
            StateUpdate::new()
                .with_ocr_result(OcrResult::from_extraction(extraction()).unwrap())
                .with_ocr_status(OcrStatus::Completed),
        );
        state
    }

    #[tokio::test]
    async fn test_ocr_malformed_payload_fails() {
        let mut ocr = MockInvoiceOcrService::new();
        ocr.expect_extract().returning(|_| Ok(json!(["not", "an", "object"])));
        let deps = WorkflowDependencies {
            ocr: Arc::new(ocr),
            ..deps()
        };

        let update = super::ocr(&deps, &WorkflowState::new("a.png", None)).await;

        assert_eq!(update.ocr_status, Some(OcrStatus::Failed));
        assert!(update.ocr_result.is_none());
        assert!(update.errors[0].starts_with("OCR Error: Malformed OCR response"));
        assert_eq!(update.processing_logs[0].status, LogStatus::Failed);
    }

    #[tokio::test]
    async fn test_data_mapping_without_ocr_result() {
        let update = data_mapping(&deps(), &WorkflowState::new("a.png", None)).await;

        assert!(update.processed_invoice.is_none());
        assert_eq!(update.errors, vec!["Processing Error: no OCR result to map".to_string()]);
        assert_eq!(update.processing_logs[0].step, "PROCESS_DATA");
    }

    #[tokio::test]
    async fn test_validation_without_invoice_is_a_fault() {
        let update = validation(&deps(), &state_after_ocr()).await;

        assert!(update.validation_result.is_none());
        assert_eq!(
            update.errors,
            vec!["Validation Error: no processed invoice to validate".to_string()]
        );
    }

    #[tokio::test]
    async fn test_validation_logs_warning_when_invalid() {
        let mut state = state_after_ocr();
        let mapped = data_mapping(&deps(), &state).await;
        let mut invoice = mapped.processed_invoice.unwrap();
        invoice.items.clear();
        state.apply(StateUpdate::new().with_processed_invoice(invoice));

        let update = validation(&deps(), &state).await;

        let result = update.validation_result.unwrap();
        assert!(!result.is_valid);
        assert_eq!(update.processing_logs[0].status, LogStatus::Warning);
        assert_eq!(update.processing_logs[0].details["is_valid"], json!(false));
        assert!(update.errors.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_writes_raw_extraction_by_default() {
        let repository = Arc::new(InMemoryInvoiceRepository::new());
        let deps = WorkflowDependencies {
            repository: repository.clone(),
            ..deps()
        };

        let update = persistence(&deps, &state_after_ocr()).await;

        assert_eq!(update.db_status, Some(DbStatus::Saved));
        let id = update.invoice_id.unwrap();
        let stored = repository
            .get_invoice(&crate::domain::InvoiceLookup::Id(id))
            .await
            .unwrap()
            .unwrap();
        // the image is a temporary upload, so no location is kept
        assert_eq!(stored["source_file_url"], Value::Null);
        // raw records keep absent parties absent
        assert_eq!(stored["seller"], Value::Null);
    }

    #[tokio::test]
    async fn test_persistence_from_processed_invoice_requires_mapping() {
        let deps = deps().with_settings(WorkflowSettings {
            persistence_source: PersistenceSource::ProcessedInvoice,
            ..Default::default()
        });

        let update = persistence(&deps, &state_after_ocr()).await;

        assert_eq!(update.db_status, Some(DbStatus::Failed));
        assert!(update.invoice_id.is_none());
        assert_eq!(
            update.errors,
            vec!["Database Error: no processed invoice to save".to_string()]
        );
    }

    #[tokio::test]
    async fn test_query_failure_is_recorded() {
        let mut agent = MockInvoiceQueryAgent::new();
        agent
            .expect_answer()
            .returning(|_| Err(QueryError::Execution("relation \"x\" does not exist".to_string())));
        let deps = WorkflowDependencies {
            query_agent: Arc::new(agent),
            ..deps()
        };
        let state = WorkflowState::new("a.png", Some("How many?".to_string()));

        let update = query(&deps, &state).await;

        let result = &update.query_results[0];
        assert!(!result.success);
        assert_eq!(result.query, "How many?");
        assert_eq!(
            result.error_message.as_deref(),
            Some("relation \"x\" does not exist")
        );
        assert_eq!(
            update.errors,
            vec!["Query Error: relation \"x\" does not exist".to_string()]
        );
    }

    #[tokio::test]
    async fn test_query_success_passes_question_through() {
        let mut agent = MockInvoiceQueryAgent::new();
        agent.expect_answer().times(1).returning(|q| {
            Ok(QueryAnswer {
                question: q.to_string(),
                sql: "SELECT COUNT(*) FROM invoices".to_string(),
                answer: "3 invoices".to_string(),
                row_count: 1,
            })
        });
        let deps = WorkflowDependencies {
            query_agent: Arc::new(agent),
            ..deps()
        };
        let state = WorkflowState::new("a.png", Some("  How many?  ".to_string()));

        let update = query(&deps, &state).await;

        let result = &update.query_results[0];
        assert!(result.success);
        assert_eq!(result.query, "  How many?  ");
        assert!(result.execution_time >= 0.0);
        assert_eq!(result.result["answer"], json!("3 invoices"));
    }
}
