use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::QueryAnswer;

/// Outcome of one query-stage execution, accumulated in workflow state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub result: Value,
    /// Wall-clock seconds
    pub execution_time: f64,
    pub success: bool,
    pub error_message: Option<String>,
}

impl QueryResult {
    pub fn succeeded(answer: &QueryAnswer, execution_time: f64) -> Self {
        Self {
            query: answer.question.clone(),
            result: json!({
                "answer": answer.answer,
                "sql": answer.sql,
                "row_count": answer.row_count,
            }),
            execution_time,
            success: true,
            error_message: None,
        }
    }

    pub fn failed(query: impl Into<String>, error: impl Into<String>, execution_time: f64) -> Self {
        Self {
            query: query.into(),
            result: Value::Null,
            execution_time,
            success: false,
            error_message: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeded_carries_answer_and_sql() {
        let answer = QueryAnswer {
            question: "How many invoices?".to_string(),
            sql: "SELECT COUNT(*) FROM invoices".to_string(),
            answer: "There are 3 invoices.".to_string(),
            row_count: 1,
        };

        let result = QueryResult::succeeded(&answer, 0.25);

        assert!(result.success);
        assert_eq!(result.query, "How many invoices?");
        assert_eq!(result.result["sql"], json!("SELECT COUNT(*) FROM invoices"));
        assert_eq!(result.result["answer"], json!("There are 3 invoices."));
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_failed() {
        let result = QueryResult::failed("q", "timeout", 1.5);

        assert!(!result.success);
        assert_eq!(result.result, Value::Null);
        assert_eq!(result.error_message.as_deref(), Some("timeout"));
    }
}
