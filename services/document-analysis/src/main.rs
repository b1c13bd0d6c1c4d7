//! Lexbid Document Analysis Service
//!
//! Classifies law-firm bid documents (contracts, award and qualification
//! certificates, lawyer licences) by fusing text extraction, OCR, vision and
//! AI text analysis.

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::get,
    serve, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use lexbid_database::{
    create_redis_pool, initialize_database, AiTaskRepository, AnalysisCache, AnalysisRepository,
};
use lexbid_utils::{init_logging, AppConfig};

mod ai_client;
mod analysis;
mod handlers;
mod learning;
mod metrics;
mod middleware;
mod ocr_client;
mod routes;
mod settings;
mod text_extractor;

use analysis::DocumentAnalyzer;
use middleware::request_id_middleware;
use settings::AnalysisSettings;

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    pub analyzer: DocumentAnalyzer,
    settings: Arc<RwLock<Arc<AnalysisSettings>>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(analyzer: DocumentAnalyzer, settings: AnalysisSettings, max_upload_bytes: usize) -> Self {
        Self {
            analyzer,
            settings: Arc::new(RwLock::new(Arc::new(settings))),
            max_upload_bytes,
        }
    }

    /// Settings snapshot for one request.
    pub async fn settings(&self) -> Arc<AnalysisSettings> {
        self.settings.read().await.clone()
    }

    pub async fn replace_settings(&self, settings: AnalysisSettings) {
        *self.settings.write().await = Arc::new(settings);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({}), using defaults", e);
        AppConfig::default()
    });

    // Initialize logging
    init_logging(&config.logging)?;
    info!("Starting Lexbid Document Analysis Service");

    let analyzer = build_analyzer(&config).await;
    let settings = AnalysisSettings::from_config(&config)?;
    let state = AppState::new(analyzer, settings, config.server.max_request_size);

    let app = create_app(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Document Analysis Service listening on {}", addr);

    serve(listener, app).await?;

    Ok(())
}

/// Analyzer with whichever of PostgreSQL and Redis are enabled and reachable.
async fn build_analyzer(config: &AppConfig) -> DocumentAnalyzer {
    let mut analyzer = DocumentAnalyzer::new();

    if config.database.enabled {
        let db_config = lexbid_database::DatabaseConfig {
            postgres_url: config.database.postgres_url.clone(),
            max_connections: config.database.max_connections,
            connection_timeout: Duration::from_secs(config.database.connection_timeout_seconds),
        };
        match initialize_database(&db_config).await {
            Ok(pool) => {
                info!("Analyses and tasks will be persisted to PostgreSQL");
                analyzer = analyzer.with_database(AnalysisRepository::new(pool.clone()), AiTaskRepository::new(pool));
            }
            Err(e) => warn!(error = %e, "PostgreSQL unavailable, keeping analyses in memory"),
        }
    }

    if config.cache.enabled {
        match create_redis_pool(&config.cache.redis_url, REDIS_CONNECT_TIMEOUT).await {
            Ok(connection) => {
                analyzer = analyzer.with_cache(AnalysisCache::new(
                    connection,
                    config.cache.prefix.clone(),
                    config.cache.ttl_seconds,
                ));
            }
            Err(e) => warn!(error = %e, "Redis unavailable, analysis cache disabled"),
        }
    }

    analyzer
}

fn create_app(state: AppState, config: &AppConfig) -> Router {
    let mut app = Router::new().route("/health", get(handlers::health_check));
    if config.monitoring.metrics_enabled {
        app = app.route("/metrics", get(handlers::metrics_handler));
    }

    app.nest("/api/v1", routes::create_api_routes())
        // Middleware stack
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST])
                        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
                )
                .layer(DefaultBodyLimit::max(config.server.max_request_size))
                .layer(axum::middleware::from_fn(request_id_middleware)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let mut config = AppConfig::default();
        config.ai.enabled = false;
        let settings = AnalysisSettings::from_config(&config).unwrap();
        let state = AppState::new(DocumentAnalyzer::new(), settings, config.server.max_request_size);
        create_app(state, &config)
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_has_request_id() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(middleware::REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_fuse_endpoint_applies_consensus() {
        let body = r#"{"results": [
            {"category": "award_certificate", "confidence": 0.5},
            {"category": "award_certificate", "confidence": 0.4},
            {"category": "other", "confidence": 0.3},
            null
        ]}"#;
        let (status, json) = post_json(test_app(), "/api/v1/classification/fuse", body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["result"]["category"], "award_certificate");
        assert!((json["result"]["confidence"].as_f64().unwrap() - 0.7).abs() < 1e-9);
        assert_eq!(json["result"]["source"], "consensus_2_sources");
        assert_eq!(json["needs_review"], false);
    }

    #[tokio::test]
    async fn test_fuse_endpoint_rejects_bad_confidence() {
        let body = r#"{"results": [{"category": "award_certificate", "confidence": 1.5}]}"#;
        let (status, json) = post_json(test_app(), "/api/v1/classification/fuse", body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_keyword_endpoint() {
        let body = r#"{"text": "中华人民共和国律师执业证 执业证号：11101201010123456 北京市司法局"}"#;
        let (status, json) = post_json(test_app(), "/api/v1/classification/keywords", body).await;

        assert_eq!(status, StatusCode::OK);
        assert!(json["result"]["category"].is_string());
        assert!(json["tags"].is_array());
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let uri = format!("/api/v1/documents/{}", uuid::Uuid::new_v4());
        let response = test_app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_refresh_analysis_of_unknown_document() {
        let uri = format!("/api/v1/documents/{}/analyze?refresh=true", uuid::Uuid::new_v4());
        let (status, json) = post_json(test_app(), &uri, "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_ai_status() {
        let response = test_app()
            .oneshot(Request::builder().uri("/api/v1/ai/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["ai_enabled"], false);
        assert_eq!(json["lawyer_override_enabled"], true);
    }
}
