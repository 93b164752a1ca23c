//! Decision predicates consulted between stages

use serde::Serialize;

use super::state::{OcrStatus, WorkflowState};

/// Outcome of the OCR check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrDecision {
    Completed,
    Failed,
}

/// Outcome of the validation check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationDecision {
    Valid,
    /// Not valid but without hard errors; still persisted
    WarningOnly,
    ErrorsPresent,
}

impl ValidationDecision {
    pub fn allows_persistence(&self) -> bool {
        matches!(self, Self::Valid | Self::WarningOnly)
    }
}

/// Outcome of the query check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryDecision {
    HasQuery,
    NoQuery,
}

pub fn check_ocr_status(state: &WorkflowState) -> OcrDecision {
    if state.ocr_status() == OcrStatus::Completed {
        OcrDecision::Completed
    } else {
        OcrDecision::Failed
    }
}

pub fn check_validation_status(state: &WorkflowState) -> ValidationDecision {
    match state.validation_result() {
        Some(result) if result.is_valid => ValidationDecision::Valid,
        Some(result) if result.errors.is_empty() => ValidationDecision::WarningOnly,
        _ => ValidationDecision::ErrorsPresent,
    }
}

/// Any non-empty question runs the query stage, whitespace included
pub fn check_query_needed(state: &WorkflowState) -> QueryDecision {
    match state.user_query() {
        Some(query) if !query.is_empty() => QueryDecision::HasQuery,
        _ => QueryDecision::NoQuery,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invoice::ValidationResult;
    use crate::domain::workflow::state::StateUpdate;

    fn with_validation(result: ValidationResult) -> WorkflowState {
        let mut state = WorkflowState::new("a.png", None);
        state.apply(StateUpdate::new().with_validation_result(result));
        state
    }

    #[test]
    fn test_check_ocr_status() {
        let mut state = WorkflowState::new("a.png", None);
        assert_eq!(check_ocr_status(&state), OcrDecision::Failed);

        state.apply(StateUpdate::new().with_ocr_status(OcrStatus::Completed));
        assert_eq!(check_ocr_status(&state), OcrDecision::Completed);
    }

    #[test]
    fn test_validation_absent_terminates() {
        let state = WorkflowState::new("a.png", None);
        assert_eq!(check_validation_status(&state), ValidationDecision::ErrorsPresent);
    }

    #[test]
    fn test_validation_with_errors_terminates() {
        let state = with_validation(ValidationResult::new(
            vec!["Invoice number is required".to_string()],
            vec![],
            vec![],
        ));
        assert_eq!(check_validation_status(&state), ValidationDecision::ErrorsPresent);
        assert!(!check_validation_status(&state).allows_persistence());
    }

    #[test]
    fn test_validation_without_errors_persists() {
        let valid = with_validation(ValidationResult::new(vec![], vec!["w".to_string()], vec![]));
        assert_eq!(check_validation_status(&valid), ValidationDecision::Valid);

        // an invalid verdict with no hard errors takes the soft-fail path
        let soft = with_validation(ValidationResult {
            is_valid: false,
            errors: vec![],
            warnings: vec!["Invoice date is missing".to_string()],
            suggestions: vec![],
        });
        assert_eq!(check_validation_status(&soft), ValidationDecision::WarningOnly);
        assert!(check_validation_status(&soft).allows_persistence());
    }

    #[test]
    fn test_check_query_needed() {
        let none = WorkflowState::new("a.png", None);
        let empty = WorkflowState::new("a.png", Some(String::new()));
        let blank = WorkflowState::new("a.png", Some("  ".to_string()));
        let asked = WorkflowState::new("a.png", Some("Total spend?".to_string()));

        assert_eq!(check_query_needed(&none), QueryDecision::NoQuery);
        assert_eq!(check_query_needed(&empty), QueryDecision::NoQuery);
        assert_eq!(check_query_needed(&blank), QueryDecision::HasQuery);
        assert_eq!(check_query_needed(&asked), QueryDecision::HasQuery);
    }
}
