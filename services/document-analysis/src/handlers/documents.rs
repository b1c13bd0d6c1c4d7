//! Document Handlers
//!
//! Upload, lookup, analysis and tag suggestion for bid documents.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lexbid_models::{FileKind, ProcessingStatus};
use lexbid_utils::{validate_upload, LexbidError};

use super::reject;
use crate::analysis::{AnalysisReport, StoredDocument};
use crate::AppState;

/// Document upload response
#[derive(Debug, Serialize)]
pub struct DocumentUploadResponse {
    pub document_id: Uuid,
    pub filename: String,
    pub file_kind: FileKind,
    pub content_hash: String,
    pub size_bytes: usize,
    pub status: ProcessingStatus,
}

/// Upload a document for analysis
///
/// POST /api/v1/documents/upload
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DocumentUploadResponse>, (StatusCode, String)> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Upload error: {}", e)))?
        .ok_or((StatusCode::BAD_REQUEST, "No file provided".to_string()))?;

    let filename = field.file_name().map(|s| s.to_string()).unwrap_or_default();
    let content_type = field
        .content_type()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let data = field
        .bytes()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Read error: {}", e)))?;

    let file_kind = validate_upload(&filename, data.len(), state.max_upload_bytes).map_err(reject)?;
    let document = state
        .analyzer
        .store_document(&filename, &content_type, file_kind, data.to_vec())
        .await;

    Ok(Json(DocumentUploadResponse {
        document_id: document.id,
        filename: document.filename,
        file_kind: document.file_kind,
        content_hash: document.content_hash,
        size_bytes: document.size_bytes,
        status: document.status,
    }))
}

/// Document metadata with its latest analysis
///
/// GET /api/v1/documents/:id
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredDocument>, (StatusCode, String)> {
    state
        .analyzer
        .get_document(id)
        .await
        .map(Json)
        .ok_or_else(|| reject(LexbidError::not_found(format!("document {}", id))))
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    /// Skip results cached for identical content.
    #[serde(default)]
    pub refresh: bool,
}

/// Run the analysis pipeline
///
/// POST /api/v1/documents/:id/analyze
pub async fn analyze_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<Json<AnalysisReport>, (StatusCode, String)> {
    let settings = state.settings().await;
    let report = state.analyzer.analyze(id, settings, query.refresh).await.map_err(reject)?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub document_id: Uuid,
    pub tags: Vec<String>,
}

/// GET /api/v1/documents/:id/tags
pub async fn document_tags(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TagsResponse>, (StatusCode, String)> {
    let settings = state.settings().await;
    let tags = state.analyzer.suggest_tags(id, &settings).await.map_err(reject)?;
    Ok(Json(TagsResponse { document_id: id, tags }))
}
