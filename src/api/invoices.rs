//! Invoice endpoints: upload-and-process, lookup and statistics

use std::path::{Path as FsPath, PathBuf};
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
};
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::state::AppState;
use super::types::{
    ApiError, Json, ProcessInvoiceParams, ProcessInvoiceResponse, StatisticsResponse,
};
use crate::domain::InvoiceLookup;

/// Extension used when the upload has none
const DEFAULT_EXTENSION: &str = "png";

/// File part of a multipart upload
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    /// Declared content type, or one guessed from the file name
    fn media_type(&self) -> Option<String> {
        self.content_type.clone().or_else(|| {
            self.file_name
                .as_deref()
                .and_then(|name| mime_guess::from_path(name).first())
                .map(|mime| mime.essence_str().to_string())
        })
    }

    fn is_image(&self) -> bool {
        self.media_type().is_some_and(|t| t.starts_with("image/"))
    }

    /// Extension for the stored copy; anything but plain alphanumerics falls back to the default
    fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }
}

/// `POST /process-invoice`: multipart `file` plus optional `query` (form field or query string)
pub async fn process_invoice(
    State(state): State<AppState>,
    Query(params): Query<ProcessInvoiceParams>,
    mut multipart: Multipart,
) -> Result<Json<ProcessInvoiceResponse>, ApiError> {
    let mut upload = None;
    let mut query = params.query;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;

                upload = Some(Upload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            Some("query") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read query: {}", e)))?;
                query = Some(text);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("Missing file").with_param("file"))?;

    process_upload(&state, upload, query).await.map(Json)
}

/// Store the upload, run the workflow on it and remove the stored copy
pub async fn process_upload(
    state: &AppState,
    upload: Upload,
    query: Option<String>,
) -> Result<ProcessInvoiceResponse, ApiError> {
    let started = Instant::now();

    if !upload.is_image() {
        return Err(ApiError::bad_request("File must be an image").with_param("file"));
    }

    let path = stored_path(&state.upload_dir, &upload);

    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to prepare upload directory: {}", e)))?;
    tokio::fs::write(&path, &upload.bytes)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to store upload: {}", e)))?;

    let image_path = path.to_string_lossy().into_owned();
    let final_state = state.processor.run(&image_path, query).await;

    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!(path = %image_path, error = %e, "Failed to remove upload");
    }

    let response = ProcessInvoiceResponse::from_state(&final_state, started.elapsed().as_secs_f64());
    info!(
        invoice_id = response.invoice_id.as_deref().unwrap_or_default(),
        status = ?response.status,
        "Upload processed"
    );

    Ok(response)
}

fn stored_path(dir: &FsPath, upload: &Upload) -> PathBuf {
    dir.join(format!("{}.{}", Uuid::new_v4(), upload.extension()))
}

/// `GET /invoice/{invoice_id}`: accepts the stored id or the invoice number
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let by_id = state
        .repository
        .get_invoice(&InvoiceLookup::Id(invoice_id.clone()))
        .await?;

    let invoice = match by_id {
        Some(invoice) => Some(invoice),
        None => {
            state
                .repository
                .get_invoice(&InvoiceLookup::Number(invoice_id.clone()))
                .await?
        }
    };

    invoice
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Invoice {} not found", invoice_id)))
}

/// `GET /stats`
pub async fn statistics(
    State(state): State<AppState>,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let statistics = state.repository.statistics().await?;

    Ok(Json(StatisticsResponse {
        statistics,
        last_updated: Utc::now(),
    }))
}
