//! Invoice Workflow
//!
//! Turns an invoice image into validated, persisted records:
//! - OCR extraction through a vision-capable chat model
//! - Field mapping and exact-decimal validation
//! - Atomic persistence across the invoice tables
//! - Optional natural-language questions answered through generated SQL

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use tracing::info;

use api::state::AppState;
use domain::{InvoiceQueryAgent, InvoiceRepository};
use infrastructure::{
    llm::LlmProviderFactory,
    ocr::LlmInvoiceOcr,
    query::LlmSqlAgent,
    storage::InvoiceRepositoryFactory,
    workflow::{InvoiceWorkflow, WorkflowDependencies},
};

/// Wired collaborators of one process
#[derive(Debug, Clone)]
pub struct Application {
    pub workflow: Arc<InvoiceWorkflow>,
    pub query_agent: Arc<dyn InvoiceQueryAgent>,
    pub repository: Arc<dyn InvoiceRepository>,
}

/// Build the repository, LLM adapters and workflow from configuration
pub async fn build_application(config: &AppConfig) -> anyhow::Result<Application> {
    let repository = InvoiceRepositoryFactory::create(&config.storage, &config.database).await?;
    let provider = LlmProviderFactory::create(&config.llm.provider)?;

    let ocr = Arc::new(LlmInvoiceOcr::new(provider.clone(), config.llm.ocr_model.as_str()));
    let query_agent: Arc<dyn InvoiceQueryAgent> = Arc::new(LlmSqlAgent::new(
        provider,
        repository.clone(),
        config.llm.sql_model.as_str(),
    ));

    let deps = WorkflowDependencies::new(ocr, repository.clone(), query_agent.clone())
        .with_settings(config.workflow.clone());
    let workflow = Arc::new(InvoiceWorkflow::new(deps));

    info!(
        ocr_model = %config.llm.ocr_model,
        sql_model = %config.llm.sql_model,
        persistence_source = ?config.workflow.persistence_source,
        "Invoice workflow ready"
    );

    Ok(Application {
        workflow,
        query_agent,
        repository,
    })
}

/// HTTP state over the wired collaborators
pub fn create_app_state(app: &Application, config: &AppConfig) -> AppState {
    AppState::new(
        app.workflow.clone(),
        app.query_agent.clone(),
        app.repository.clone(),
        config.uploads.dir.as_str(),
    )
}
