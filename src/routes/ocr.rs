use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    ocr::{health::OcrHealthChecker, neural},
    AppState,
};

#[derive(Serialize, ToSchema)]
pub struct OcrHealthResponse {
    pub status: String,
    pub tesseract_installed: bool,
    pub available_languages: Vec<String>,
    pub missing_languages: Vec<String>,
    pub backends: Vec<String>,
    pub neural_backend_loaded: bool,
    pub pdf_rendering: bool,
    pub diagnostics: String,
    pub errors: Vec<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

#[utoipa::path(
    get,
    path = "/api/ocr/health",
    tag = "ocr",
    responses(
        (status = 200, description = "Recognition backends and installed language data", body = OcrHealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<OcrHealthResponse> {
    let engine = state.pipeline.engine();
    let neural_backend_loaded = engine.is_backend_available(neural::ENGINE_NAME);
    let backends: Vec<String> = engine.backend_names().into_iter().map(String::from).collect();

    // Runs `tesseract` as a subprocess.
    let checks = tokio::task::spawn_blocking(move || {
        let checker = OcrHealthChecker::new();
        let diagnostics = checker.get_diagnostics(neural_backend_loaded);
        let missing = checker.missing_required_languages();
        (diagnostics, missing)
    })
    .await;

    let (diagnostics, missing) = match checks {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("OCR health check panicked: {}", e);
            return Json(OcrHealthResponse {
                status: "unhealthy".to_string(),
                tesseract_installed: false,
                available_languages: vec![],
                missing_languages: vec![],
                backends,
                neural_backend_loaded,
                pdf_rendering: false,
                diagnostics: String::new(),
                errors: vec![e.to_string()],
            });
        }
    };

    let mut errors = Vec::new();
    let missing_languages = match missing {
        Ok(languages) => {
            if !languages.is_empty() {
                errors.push(format!("Missing language data: {}", languages.join(", ")));
            }
            languages
        }
        Err(e) => {
            errors.push(e.to_string());
            vec![]
        }
    };

    let tesseract_installed = diagnostics.tesseract_version.is_some();
    let status = if errors.is_empty() && (tesseract_installed || neural_backend_loaded) {
        "healthy"
    } else if tesseract_installed || neural_backend_loaded {
        "degraded"
    } else {
        "unhealthy"
    };

    Json(OcrHealthResponse {
        status: status.to_string(),
        tesseract_installed,
        available_languages: diagnostics.available_languages.clone(),
        missing_languages,
        backends,
        neural_backend_loaded,
        pdf_rendering: diagnostics.pdf_rendering,
        diagnostics: diagnostics.to_string(),
        errors,
    })
}
