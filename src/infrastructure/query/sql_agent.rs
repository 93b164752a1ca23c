//! NL-to-SQL agent backed by a chat model

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::invoice::InvoiceRepository;
use crate::domain::{InvoiceQueryAgent, LlmProvider, LlmRequest, QueryAnswer, QueryError};
use crate::infrastructure::llm::{chat_with_metrics, strip_code_fences};

/// Answer returned when the statement produced no rows
pub const NO_DATA_ANSWER: &str = "No data found for your query.";

/// Rows passed to the model for the prose summary
pub const SUMMARY_ROW_LIMIT: usize = 10;

const SCHEMA_PROMPT: &str = r#"You are an SQL expert for a PostgreSQL invoice database. The database has these tables:

1. invoices: Main invoice information
   - id (UUID), invoice_number (VARCHAR), invoice_date (DATE), due_date (DATE),
   - invoice_type (VARCHAR), status (VARCHAR), total_amount (DECIMAL), currency (VARCHAR),
   - ocr_confidence_score (DECIMAL), created_at (TIMESTAMP), updated_at (TIMESTAMP)

2. sellers: Seller/vendor information
   - id (INTEGER), invoice_id (UUID), name (VARCHAR), address (TEXT),
   - contact_information (TEXT), tax_id (VARCHAR), email (VARCHAR), phone (VARCHAR)

3. buyers: Customer information
   - id (INTEGER), invoice_id (UUID), name (VARCHAR), address (TEXT),
   - contact_information (TEXT), tax_id (VARCHAR), email (VARCHAR), phone (VARCHAR)

4. invoice_items: Line items
   - id (INTEGER), invoice_id (UUID), item_description (TEXT), item_code (VARCHAR),
   - quantity (DECIMAL), unit_price (DECIMAL), discount_percentage (DECIMAL),
   - discount_amount (DECIMAL), tax_rate (DECIMAL), tax_amount (DECIMAL), line_total (DECIMAL)

5. invoice_summary: Totals and summary
   - id (INTEGER), invoice_id (UUID), subtotal (DECIMAL), total_discount (DECIMAL),
   - total_tax (DECIMAL), shipping_cost (DECIMAL), total_amount_due (DECIMAL)

6. payment_information: Payment details
   - id (INTEGER), invoice_id (UUID), payment_terms (VARCHAR), payment_method (VARCHAR),
   - bank_account_details (TEXT), payment_status (VARCHAR), payment_date (DATE)

Generate PostgreSQL queries for user questions.
- Return ONLY the SQL query without any explanation or markdown
- Generate a single read-only SELECT statement
- Use proper JOINs when data from multiple tables is needed
- Use PostgreSQL syntax (e.g., :: for casting, ILIKE for case-insensitive search)
- Always limit results to 100 unless specified otherwise
- Format dates using TO_CHAR when needed for display

Examples:
- For "total sales this month": Use EXTRACT or DATE_TRUNC
- For "unpaid invoices": JOIN with payment_information table
- For "customer history": GROUP BY buyer information"#;

const SUMMARY_PROMPT: &str = r#"Based on this SQL query result, provide a clear, concise answer to the user's question.

Format the answer in a user-friendly way:
- Use bullet points for lists
- Format monetary values with currency symbols
- Format dates in a readable format (e.g., Jan 15, 2024)
- Provide summaries for large datasets
- Include relevant totals or counts"#;

static WRITE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|MERGE|DROP|ALTER|TRUNCATE|CREATE|GRANT|REVOKE|COPY)\b")
        .expect("valid regex")
});

/// Agent that asks a chat model for SQL and for a prose summary of the rows
#[derive(Debug, Clone)]
pub struct LlmSqlAgent {
    provider: Arc<dyn LlmProvider>,
    repository: Arc<dyn InvoiceRepository>,
    model: String,
}

impl LlmSqlAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        repository: Arc<dyn InvoiceRepository>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            repository,
            model: model.into(),
        }
    }

    async fn summarise(&self, question: &str, rows: &[Value]) -> Result<String, QueryError> {
        let sample = &rows[..rows.len().min(SUMMARY_ROW_LIMIT)];
        let rendered = serde_json::to_string(sample)
            .map_err(|e| QueryError::Execution(format!("Failed to render rows: {}", e)))?;

        let request = LlmRequest::builder()
            .system(SUMMARY_PROMPT)
            .user(format!("Question: {}\nQuery Result: {}", question, rendered))
            .temperature(0.0)
            .build();

        let response = chat_with_metrics(self.provider.as_ref(), "summary", &self.model, request)
            .await
            .map_err(|e| QueryError::Generation(e.to_string()))?;

        Ok(response.content().unwrap_or_default().trim().to_string())
    }
}

/// Pull the SQL statement out of a model reply
///
/// Keeps the first code fence when there is one and drops any prose before the first line that starts with
/// `SELECT` or `WITH`.
pub fn extract_sql(reply: &str) -> String {
    let body = strip_code_fences(reply);
    let lines: Vec<&str> = body.lines().collect();

    let start = lines.iter().position(|line| {
        let upper = line.trim_start().to_ascii_uppercase();
        upper.starts_with("SELECT") || upper.starts_with("WITH")
    });

    match start {
        Some(index) => lines[index..].join("\n").trim().to_string(),
        None => body.trim().to_string(),
    }
}

/// Reject anything that is not a single read-only query
pub fn ensure_read_only(sql: &str) -> Result<(), QueryError> {
    let statement = sql.trim().trim_end_matches(';').trim();

    if statement.is_empty() {
        return Err(QueryError::Generation("model returned no SQL".to_string()));
    }

    let first = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    if first != "SELECT" && first != "WITH" {
        return Err(QueryError::Generation(format!(
            "only SELECT queries are allowed, got {}",
            first
        )));
    }

    if statement.contains(';') {
        return Err(QueryError::Generation(
            "multiple statements are not allowed".to_string(),
        ));
    }

    if let Some(keyword) = WRITE_KEYWORD.find(statement) {
        return Err(QueryError::Generation(format!(
            "statement contains {}",
            keyword.as_str().to_ascii_uppercase()
        )));
    }

    Ok(())
}

#[async_trait]
impl InvoiceQueryAgent for LlmSqlAgent {
    async fn generate_sql(&self, question: &str) -> Result<String, QueryError> {
        let request = LlmRequest::builder()
            .system(SCHEMA_PROMPT)
            .user(question)
            .temperature(0.0)
            .build();

        let response = chat_with_metrics(self.provider.as_ref(), "sql_generation", &self.model, request)
            .await
            .map_err(|e| QueryError::Generation(e.to_string()))?;

        let sql = extract_sql(response.content().unwrap_or_default());
        ensure_read_only(&sql)?;

        debug!(sql = %sql, "Generated SQL");
        Ok(sql)
    }

    async fn answer(&self, question: &str) -> Result<QueryAnswer, QueryError> {
        let sql = self.generate_sql(question).await?;
        let outcome = self.repository.execute_query(&sql).await;

        if !outcome.success {
            return Err(QueryError::Execution(
                outcome.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let rows = outcome.data_rows();
        let answer = if rows.is_empty() {
            NO_DATA_ANSWER.to_string()
        } else {
            self.summarise(question, rows).await?
        };

        info!(row_count = outcome.row_count, "Question answered");

        Ok(QueryAnswer {
            question: question.to_string(),
            sql,
            answer,
            row_count: outcome.row_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invoice::{MockInvoiceRepository, QueryOutcome};
    use crate::domain::llm::MockLlmProvider;
    use serde_json::json;

    fn agent(provider: Arc<MockLlmProvider>, repository: MockInvoiceRepository) -> LlmSqlAgent {
        LlmSqlAgent::new(provider, Arc::new(repository), "gpt-4o-mini")
    }

    #[test]
    fn test_extract_sql_drops_fences_and_prose() {
        let reply = "```sql\nHere is the query:\nSELECT COUNT(*) FROM invoices;\n```";
        assert_eq!(extract_sql(reply), "SELECT COUNT(*) FROM invoices;");

        let cte = "Sure.\nWITH t AS (SELECT 1)\nSELECT * FROM t";
        assert_eq!(extract_sql(cte), "WITH t AS (SELECT 1)\nSELECT * FROM t");
    }

    #[test]
    fn test_extract_sql_after_prose_preamble() {
        let reply = "Here is the query:\n```sql\nSELECT COUNT(*) FROM invoices\n```";
        assert_eq!(extract_sql(reply), "SELECT COUNT(*) FROM invoices");

        let trailing = "```sql\nSELECT 1\n```\nThis returns a single row.";
        assert_eq!(extract_sql(trailing), "SELECT 1");
        assert!(ensure_read_only(&extract_sql(trailing)).is_ok());
    }

    #[test]
    fn test_ensure_read_only() {
        assert!(ensure_read_only("SELECT * FROM invoices WHERE updated_at > NOW();").is_ok());
        assert!(ensure_read_only("DELETE FROM invoices").is_err());
        assert!(ensure_read_only("SELECT 1; DROP TABLE invoices").is_err());
        assert!(ensure_read_only("WITH x AS (DELETE FROM invoices RETURNING *) SELECT * FROM x").is_err());
        assert!(ensure_read_only("").is_err());
    }

    #[tokio::test]
    async fn test_answer_summarises_rows() {
        let provider = Arc::new(
            MockLlmProvider::new()
                .with_reply("SELECT invoice_number FROM invoices LIMIT 100")
                .with_reply("There are 12 invoices."),
        );
        let rows: Vec<Value> = (0..12).map(|i| json!({"invoice_number": format!("INV-{}", i)})).collect();

        let mut repository = MockInvoiceRepository::new();
        repository
            .expect_execute_query()
            .withf(|sql| sql == "SELECT invoice_number FROM invoices LIMIT 100")
            .times(1)
            .returning(move |_| QueryOutcome::rows(rows.clone()));

        let answer = agent(provider.clone(), repository)
            .answer("How many invoices?")
            .await
            .unwrap();

        assert_eq!(answer.answer, "There are 12 invoices.");
        assert_eq!(answer.row_count, 12);

        let (_, summary_request) = &provider.requests()[1];
        let prompt = summary_request.messages[1].content_text().unwrap();
        assert!(prompt.contains("INV-9"));
        assert!(!prompt.contains("INV-10"));
    }

    #[tokio::test]
    async fn test_no_rows_skips_summary() {
        let provider = Arc::new(MockLlmProvider::new().with_reply("SELECT * FROM invoices WHERE false"));
        let mut repository = MockInvoiceRepository::new();
        repository
            .expect_execute_query()
            .returning(|_| QueryOutcome::rows(vec![]));

        let answer = agent(provider.clone(), repository).answer("Anything?").await.unwrap();

        assert_eq!(answer.answer, NO_DATA_ANSWER);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_execution_failure() {
        let provider = Arc::new(MockLlmProvider::new().with_reply("SELECT nope FROM invoices"));
        let mut repository = MockInvoiceRepository::new();
        repository
            .expect_execute_query()
            .returning(|_| QueryOutcome::failed("column \"nope\" does not exist"));

        let err = agent(provider, repository).answer("?").await.unwrap_err();

        assert_eq!(
            err,
            QueryError::Execution("column \"nope\" does not exist".to_string())
        );
    }

    #[tokio::test]
    async fn test_generation_failure_never_touches_the_store() {
        let provider = Arc::new(MockLlmProvider::new().with_reply("DROP TABLE invoices"));
        let mut repository = MockInvoiceRepository::new();
        repository.expect_execute_query().never();

        let err = agent(provider, repository).answer("Delete everything").await.unwrap_err();

        assert!(matches!(err, QueryError::Generation(_)));
    }
}
