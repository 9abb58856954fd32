pub mod config;
pub mod errors;
pub mod field_extraction;
pub mod mime_detection;
pub mod ocr;
pub mod pipeline;
pub mod routes;
pub mod swagger;

use axum::{extract::DefaultBodyLimit, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use config::Config;
use pipeline::ExtractionPipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<ExtractionPipeline>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let pipeline = Arc::new(ExtractionPipeline::from_config(&config));
        Self { config, pipeline }
    }
}

/// Health check endpoint for monitoring
pub async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(serde_json::json!({"status": "ok"})))
}

/// Every route the server exposes. The body limit sits above the upload
/// limit so oversized images reach the handler and get a descriptive error.
pub fn create_app(state: Arc<AppState>) -> Router {
    let body_limit = (state.config.max_upload_size_bytes() as usize).saturating_mul(2);

    Router::new()
        .route("/api/health", get(health_check))
        .nest("/api/carte-grise", routes::carte_grise::router())
        .nest("/api/ocr", routes::ocr::router())
        .merge(swagger::create_swagger_router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
