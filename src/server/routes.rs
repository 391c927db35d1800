//! Request handlers.

use axum::Json;
use axum::extract::{Multipart, State};
use axum::extract::multipart::Field;
use serde::Serialize;
use tracing::{debug, info};

use super::{ApiError, AppState, ClientKey};
use crate::{CacheStats, Extraction, HealthStatus, ImageUpload};

const IMAGE_FIELD: &str = "image";
const BATCH_FIELD: &str = "images";

pub(super) async fn health(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
) -> Result<Json<HealthStatus>, ApiError> {
    Ok(Json(state.extractor.health(&client)?))
}

pub(super) async fn extract_text(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    mut multipart: Multipart,
) -> Result<Json<Extraction>, ApiError> {
    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            image = Some(read_upload(field).await?);
        }
    }
    let image = image.ok_or_else(|| ApiError::bad_request("missing multipart field 'image'"))?;

    let extraction = state.extractor.extract(&client, image).await?;
    info!(
        client = %client,
        cached = extraction.cached,
        success = extraction.success,
        elapsed_ms = extraction.processing_time_ms,
        "extract-text"
    );
    Ok(Json(extraction))
}

/// Response body for a batch request.
#[derive(Debug, Serialize)]
pub(super) struct BatchResponse {
    results: Vec<BatchResult>,
}

#[derive(Debug, Serialize)]
struct BatchResult {
    filename: Option<String>,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    extraction: Option<Extraction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub(super) async fn extract_batch(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    mut multipart: Multipart,
) -> Result<Json<BatchResponse>, ApiError> {
    let mut images = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(BATCH_FIELD) {
            images.push(read_upload(field).await?);
        }
    }

    let items = state.extractor.batch_extract(&client, images).await?;
    let failed = items.iter().filter(|item| !item.is_ok()).count();
    info!(client = %client, images = items.len(), failed, "extract-text/batch");

    let results = items
        .into_iter()
        .map(|item| match item.outcome {
            Ok(extraction) => BatchResult {
                filename: item.filename,
                success: true,
                extraction: Some(extraction),
                error: None,
            },
            Err(e) => BatchResult {
                filename: item.filename,
                success: false,
                extraction: None,
                error: Some(e.to_string()),
            },
        })
        .collect();
    Ok(Json(BatchResponse { results }))
}

pub(super) async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.extractor.cache_stats())
}

async fn read_upload(field: Field<'_>) -> Result<ImageUpload, ApiError> {
    let filename = field.file_name().map(str::to_owned);
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_owned();
    let data = field.bytes().await?;
    debug!(?filename, %content_type, size = data.len(), "received upload");

    let upload = ImageUpload::new(data.to_vec(), content_type);
    Ok(match filename {
        Some(name) => upload.filename(name),
        None => upload,
    })
}
