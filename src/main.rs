use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cartegrise::{
    config::Config,
    create_app,
    ocr::health::{OcrHealthChecker, REQUIRED_LANGUAGES},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let checker = OcrHealthChecker::new();
    match checker.check_tesseract_installation() {
        Ok(version) => info!("Tesseract {} available", version),
        Err(e) => warn!("Classical OCR backend will fail: {}", e),
    }
    for lang in REQUIRED_LANGUAGES {
        if let Err(e) = checker.check_language_data(lang) {
            warn!("Tesseract language check for '{}': {}", lang, e);
        }
    }

    let state = Arc::new(AppState::new(config.clone()));
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.server_address).await?;
    info!("Server starting on {}", config.server_address);

    axum::serve(listener, app).await?;

    Ok(())
}
