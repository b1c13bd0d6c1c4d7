use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers::*, AppState};

pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        .route("/documents/upload", post(upload_document))
        .route("/documents/:id", get(get_document))
        .route("/documents/:id/analyze", post(analyze_document))
        .route("/documents/:id/tags", get(document_tags))
        .route("/classification/fuse", post(fuse_results))
        .route("/classification/keywords", post(classify_keywords))
        .route("/tasks/:id", get(get_task))
        .route("/corrections", post(record_correction))
        .route("/ai/status", get(ai_status))
        .route("/ai/reload", post(reload_config))
}
