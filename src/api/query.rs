//! Natural-language query endpoint

use std::time::Instant;

use axum::extract::State;
use tracing::warn;

use super::state::AppState;
use super::types::{ApiError, Json, QueryRequest, QueryResponse};

/// `POST /query`
///
/// Agent failures are reported in the body with `success: false`.
pub async fn query_invoices(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let question = request.query.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("Query must not be empty").with_param("query"));
    }

    let started = Instant::now();
    let answered = state.query_agent.answer(question).await;
    let execution_time = started.elapsed().as_secs_f64();

    let response = match answered {
        Ok(answer) => QueryResponse {
            query: request.query,
            answer: answer.answer,
            sql_generated: Some(answer.sql),
            row_count: answer.row_count,
            execution_time,
            success: true,
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "Query failed");
            QueryResponse::failed(request.query, &e, execution_time)
        }
    };

    Ok(Json(response))
}
