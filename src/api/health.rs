//! Service information and health endpoints

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use super::state::AppState;
use super::types::Json;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// The process itself; always healthy when it answers
    pub status: HealthStatus,
    pub database: HealthStatus,
    pub version: String,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Health check with a database round trip
///
/// Answers 200 even when the database is down so callers can read the body.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();

    let database = if state.repository.health_check().await {
        HealthStatus::Healthy
    } else {
        tracing::warn!("Database health check failed");
        HealthStatus::Unhealthy
    };

    let response = HealthResponse {
        status: HealthStatus::Healthy,
        database,
        version: env!("CARGO_PKG_VERSION").to_string(),
        latency_ms: start.elapsed().as_millis() as u64,
        timestamp: Utc::now(),
    };

    (StatusCode::OK, Json(response))
}

/// Service description
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Invoice Processing API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /process-invoice": "Upload and process an invoice image",
            "POST /query": "Query invoice data using natural language",
            "GET /invoice/{invoice_id}": "Get invoice details by ID or invoice number",
            "GET /stats": "Get invoice statistics",
            "GET /health": "Health check",
        }
    }))
}
