//! AI Handlers
//!
//! Model status, configuration reload, task lookup and user corrections.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use lexbid_models::{AiTask, UserCorrection};
use lexbid_utils::{validate_model, AppConfig, LexbidError};

use super::reject;
use crate::settings::{AiStatus, AnalysisSettings};
use crate::AppState;

/// GET /api/v1/ai/status
pub async fn ai_status(State(state): State<AppState>) -> Json<AiStatus> {
    Json(state.settings().await.status())
}

/// Re-read configuration and swap the settings used by new requests.
///
/// POST /api/v1/ai/reload
pub async fn reload_config(State(state): State<AppState>) -> Result<Json<AiStatus>, (StatusCode, String)> {
    let config = AppConfig::load().map_err(|e| reject(e.into()))?;
    let settings = AnalysisSettings::from_config(&config)
        .map_err(|e| reject(LexbidError::configuration(format!("{:#}", e))))?;

    let status = settings.status();
    state.replace_settings(settings).await;
    info!(provider = %status.provider, model = %status.model, "AI configuration reloaded");

    Ok(Json(status))
}

/// GET /api/v1/tasks/:id
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AiTask>, (StatusCode, String)> {
    state
        .analyzer
        .get_task(id)
        .await
        .map(Json)
        .ok_or_else(|| reject(LexbidError::not_found(format!("task {}", id))))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CorrectionRequest {
    pub document_id: Option<Uuid>,
    #[validate(length(min = 1, max = 64))]
    pub original_classification: String,
    #[validate(length(min = 1, max = 64))]
    pub user_correction: String,
    #[validate(length(max = 128))]
    pub specific_correction: Option<String>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CorrectionResponse {
    pub recorded: bool,
    pub total_corrections: usize,
}

/// POST /api/v1/corrections
pub async fn record_correction(
    State(state): State<AppState>,
    Json(request): Json<CorrectionRequest>,
) -> Result<Json<CorrectionResponse>, (StatusCode, String)> {
    validate_model(&request).map_err(reject)?;

    let correction = UserCorrection {
        document_id: request.document_id,
        original_classification: request.original_classification,
        user_correction: request.user_correction,
        specific_correction: request.specific_correction.filter(|s| !s.is_empty()),
        note: request.note,
        recorded_at: Utc::now(),
    };

    let settings = state.settings().await;
    let total_corrections = settings
        .learning
        .record(correction)
        .await
        .map_err(|e| reject(LexbidError::internal(format!("{:#}", e))))?;

    info!(total_corrections, "User correction recorded");
    Ok(Json(CorrectionResponse {
        recorded: true,
        total_corrections,
    }))
}
