use axum::response::Json;
use serde_json::json;

use crate::metrics;

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "lexbid-document-analysis",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn metrics_handler() -> String {
    metrics::render()
}
