//! Classification Handlers
//!
//! Stateless fusion and keyword classification for callers that already hold
//! per-source results or raw text.

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use lexbid_models::{ClassificationResult, FusedResult};
use lexbid_utils::classification::{classify_business_field, extract_entities, extract_tags};
use lexbid_utils::{validate_confidence, validate_model};

use super::reject;
use crate::metrics;
use crate::AppState;

/// Per-source results to reconcile. `null` entries count as absent.
#[derive(Debug, Deserialize, Validate)]
pub struct FuseRequest {
    #[validate(length(max = 16))]
    pub results: Vec<Option<ClassificationResult>>,
}

#[derive(Debug, Serialize)]
pub struct FuseResponse {
    pub result: FusedResult,
    pub needs_review: bool,
}

/// POST /api/v1/classification/fuse
pub async fn fuse_results(
    State(state): State<AppState>,
    Json(request): Json<FuseRequest>,
) -> Result<Json<FuseResponse>, (StatusCode, String)> {
    validate_model(&request).map_err(reject)?;
    for (index, result) in request.results.iter().enumerate() {
        if let Some(result) = result {
            validate_confidence(&format!("results[{}].confidence", index), result.confidence).map_err(reject)?;
        }
    }

    let settings = state.settings().await;
    let result = settings.fusion.fuse(request.results.iter().flatten());
    metrics::record_fusion(result.source);

    Ok(Json(FuseResponse {
        needs_review: result.needs_review(settings.classification.review_threshold),
        result,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct KeywordRequest {
    #[validate(length(min = 1, max = 200000))]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct KeywordResponse {
    pub result: ClassificationResult,
    pub business_field: Option<String>,
    pub tags: Vec<String>,
    pub key_entities: BTreeMap<String, String>,
}

/// POST /api/v1/classification/keywords
pub async fn classify_keywords(
    State(state): State<AppState>,
    Json(request): Json<KeywordRequest>,
) -> Result<Json<KeywordResponse>, (StatusCode, String)> {
    validate_model(&request).map_err(reject)?;

    let settings = state.settings().await;
    let fields = &settings.classification.business_fields;
    let result = settings.keywords.classify(&request.text);
    let key_entities = result
        .category
        .map(|category| extract_entities(category, &request.text))
        .unwrap_or_default();

    Ok(Json(KeywordResponse {
        business_field: classify_business_field(&request.text, fields),
        tags: extract_tags(&request.text, fields),
        key_entities,
        result,
    }))
}
