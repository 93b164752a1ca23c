//! Stage graph of the invoice workflow
//!
//! ```text
//! Ocr ──completed──▶ DataMapping ──▶ Validation ──valid / warning-only──▶ Persistence ──has query──▶ Query ──▶ end
//!  └─failed──▶ end                      └─errors present──▶ end              └─no query──▶ end
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::routing::{
    check_ocr_status, check_query_needed, check_validation_status, OcrDecision, QueryDecision,
};
use super::state::WorkflowState;

/// Stages of the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ocr,
    DataMapping,
    Validation,
    Persistence,
    Query,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Self::Ocr,
        Self::DataMapping,
        Self::Validation,
        Self::Persistence,
        Self::Query,
    ];

    /// Identifier used in metrics and tracing
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ocr => "ocr",
            Self::DataMapping => "data_mapping",
            Self::Validation => "validation",
            Self::Persistence => "persistence",
            Self::Query => "query",
        }
    }

    /// `step` tag written to processing log entries
    pub fn log_step(&self) -> &'static str {
        match self {
            Self::Ocr => "OCR",
            Self::DataMapping => "PROCESS_DATA",
            Self::Validation => "VALIDATE",
            Self::Persistence => "SAVE_DATABASE",
            Self::Query => "QUERY",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the run goes after a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(Stage),
    Terminate,
}

/// Default bound on stage executions per run
pub const DEFAULT_MAX_TRANSITIONS: usize = 16;

/// Fixed topology with conditional edges
#[derive(Debug, Clone, Copy)]
pub struct WorkflowGraph {
    max_transitions: usize,
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self {
            max_transitions: DEFAULT_MAX_TRANSITIONS,
        }
    }
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_transitions(mut self, max_transitions: usize) -> Self {
        self.max_transitions = max_transitions;
        self
    }

    pub fn entry(&self) -> Stage {
        Stage::Ocr
    }

    pub fn max_transitions(&self) -> usize {
        self.max_transitions
    }

    /// Next step after `stage` has run against `state`
    pub fn route(&self, stage: Stage, state: &WorkflowState) -> Transition {
        match stage {
            Stage::Ocr => match check_ocr_status(state) {
                OcrDecision::Completed => Transition::Next(Stage::DataMapping),
                OcrDecision::Failed => Transition::Terminate,
            },
            Stage::DataMapping => Transition::Next(Stage::Validation),
            Stage::Validation => {
                if check_validation_status(state).allows_persistence() {
                    Transition::Next(Stage::Persistence)
                } else {
                    Transition::Terminate
                }
            }
            Stage::Persistence => match check_query_needed(state) {
                QueryDecision::HasQuery => Transition::Next(Stage::Query),
                QueryDecision::NoQuery => Transition::Terminate,
            },
            Stage::Query => Transition::Terminate,
        }
    }

    /// Every transition `stage` can take
    pub fn successors(&self, stage: Stage) -> &'static [Transition] {
        match stage {
            Stage::Ocr => &[Transition::Next(Stage::DataMapping), Transition::Terminate],
            Stage::DataMapping => &[Transition::Next(Stage::Validation)],
            Stage::Validation => &[Transition::Next(Stage::Persistence), Transition::Terminate],
            Stage::Persistence => &[Transition::Next(Stage::Query), Transition::Terminate],
            Stage::Query => &[Transition::Terminate],
        }
    }
}
