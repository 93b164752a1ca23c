//! Workflow engine: drives a run through the stage graph

use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, info_span, warn, Instrument};

use super::stages::{self, WorkflowDependencies};
use crate::domain::workflow::{
    InvoiceProcessor, LogStatus, ProcessingLogEntry, Stage, StateUpdate, Transition,
    WorkflowGraph, WorkflowInput, WorkflowState,
};
use crate::domain::DbStatus;
use crate::infrastructure::observability::{record_stage, record_workflow_run};

/// Log step recorded when a run is cut off by the transition guard
pub const GUARD_LOG_STEP: &str = "WORKFLOW";

/// Invoice workflow over injected collaborators
#[derive(Debug, Clone)]
pub struct InvoiceWorkflow {
    deps: WorkflowDependencies,
    graph: WorkflowGraph,
}

impl InvoiceWorkflow {
    pub fn new(deps: WorkflowDependencies) -> Self {
        let graph = WorkflowGraph::new().with_max_transitions(deps.settings.max_transitions);
        Self { deps, graph }
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn dependencies(&self) -> &WorkflowDependencies {
        &self.deps
    }

    async fn execute_stage(&self, stage: Stage, state: &WorkflowState) -> StateUpdate {
        match stage {
            Stage::Ocr => stages::ocr(&self.deps, state).await,
            Stage::DataMapping => stages::data_mapping(&self.deps, state).await,
            Stage::Validation => stages::validation(&self.deps, state).await,
            Stage::Persistence => stages::persistence(&self.deps, state).await,
            Stage::Query => stages::query(&self.deps, state).await,
        }
    }

    /// Run the graph from the entry stage until a predicate terminates it
    pub async fn execute(&self, mut state: WorkflowState) -> WorkflowState {
        let started = Instant::now();
        let mut stage = self.graph.entry();
        let mut transitions = 0;

        loop {
            let stage_started = Instant::now();
            let update = self.execute_stage(stage, &state).await;

            let status = if update.errors.is_empty() { "success" } else { "failed" };
            record_stage(stage.as_str(), status, stage_started.elapsed());
            debug!(
                stage = stage.as_str(),
                status,
                elapsed_ms = stage_started.elapsed().as_millis() as u64,
                "Stage finished"
            );

            state.apply(update);

            match self.graph.route(stage, &state) {
                Transition::Terminate => break,
                Transition::Next(next) => {
                    transitions += 1;
                    if transitions > self.graph.max_transitions() {
                        let message = format!(
                            "Workflow Error: stopped before {} after {} transitions",
                            next,
                            self.graph.max_transitions()
                        );
                        warn!(stage = next.as_str(), "Transition limit reached");
                        state.apply(
                            StateUpdate::new()
                                .with_error(message.clone())
                                .with_log(ProcessingLogEntry::new(GUARD_LOG_STEP, LogStatus::Failed).with_error(message)),
                        );
                        break;
                    }
                    stage = next;
                }
            }
        }

        let outcome = run_outcome(&state);
        record_workflow_run(outcome, started.elapsed());
        info!(
            outcome,
            invoice_id = state.invoice_id().unwrap_or_default(),
            errors = state.errors().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Workflow finished"
        );

        state
    }
}

fn run_outcome(state: &WorkflowState) -> &'static str {
    match (state.errors().is_empty(), state.db_status()) {
        (true, _) => "success",
        (false, DbStatus::Saved) => "partial",
        (false, _) => "failed",
    }
}

#[async_trait]
impl InvoiceProcessor for InvoiceWorkflow {
    async fn run(&self, image_path: &str, user_query: Option<String>) -> WorkflowState {
        let span = info_span!("invoice_workflow.run", image_path = %image_path);
        let state = WorkflowState::new(image_path, user_query);

        self.execute(state).instrument(span).await
    }

    async fn run_batch(&self, inputs: Vec<WorkflowInput>, concurrency: usize) -> Vec<WorkflowState> {
        stream::iter(inputs)
            .map(|input| async move { self.run(&input.image_path, input.user_query).await })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}
