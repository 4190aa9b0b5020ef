//! Ingestion endpoints: document upload and bulk business records.

use std::collections::HashMap;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use tracing::info;

use sage_db::BusinessRecord;

use crate::error::ApiError;
use crate::state::{owner_id, AppState};

/// Multipart file upload. The body is treated as UTF-8 text; format-specific
/// extraction (PDF and friends) happens upstream of this service.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let _owner = owner_id(&headers)?;

    let mut file_text: Option<String> = None;
    let mut filename = "upload".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?
    {
        if field.name() == Some("file") {
            if let Some(name) = field.file_name() {
                filename = name.to_string();
            }
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {e}")))?;
            let text = String::from_utf8(bytes.to_vec())
                .map_err(|_| ApiError::BadRequest("File is not valid UTF-8 text".to_string()))?;
            file_text = Some(text);
            break;
        }
    }

    let text = file_text.ok_or_else(|| {
        ApiError::BadRequest("No file uploaded. Use field name 'file'.".to_string())
    })?;

    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), filename.clone());

    let chunks_created = state.index.ingest_document(&text, metadata).await?;

    info!(
        subsystem = "api",
        op = "upload",
        source = %filename,
        chunk_count = chunks_created,
        "Document ingested"
    );

    Ok(Json(serde_json::json!({
        "message": "File submitted successfully",
        "chunks_created": chunks_created,
    })))
}

#[derive(Debug, Deserialize)]
pub struct IngestRecordsRequest {
    pub records: Vec<BusinessRecord>,
}

/// Bulk-ingest tabular business records.
///
/// Each row lands in the relational store for analytics and, rendered as a
/// sentence, in the retrieval indexes.
pub async fn ingest_records(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<IngestRecordsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let _owner = owner_id(&headers)?;

    if request.records.is_empty() {
        return Err(ApiError::BadRequest("records must not be empty".to_string()));
    }

    let rows_ingested = state.db.records().insert_records(&request.records).await?;

    let sentences: Vec<String> = request.records.iter().map(|r| r.sentence()).collect();
    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), "business_records".to_string());
    state.index.ingest_texts(sentences, metadata).await?;

    info!(
        subsystem = "api",
        op = "ingest_records",
        row_count = rows_ingested,
        "Business records ingested"
    );

    Ok(Json(serde_json::json!({
        "status": "success",
        "rows_ingested": rows_ingested,
    })))
}
