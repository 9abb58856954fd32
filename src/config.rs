use anyhow::Result;
use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_address: String,
    pub max_upload_size_mb: u64,
    pub tessdata_path: Option<String>,
    pub neural_ocr_enabled: bool,
    pub ocrs_detection_model: Option<String>,
    pub ocrs_recognition_model: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: "0.0.0.0:8000".to_string(),
            max_upload_size_mb: 10,
            tessdata_path: None,
            neural_ocr_enabled: true,
            ocrs_detection_model: None,
            ocrs_recognition_model: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server_address: env::var("SERVER_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            max_upload_size_mb: env::var("MAX_UPLOAD_SIZE_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            tessdata_path: env::var("TESSDATA_PREFIX").ok().filter(|s| !s.is_empty()),
            neural_ocr_enabled: env::var("NEURAL_OCR_ENABLED")
                .map(|s| !matches!(s.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
            ocrs_detection_model: env::var("OCRS_DETECTION_MODEL").ok().filter(|s| !s.is_empty()),
            ocrs_recognition_model: env::var("OCRS_RECOGNITION_MODEL").ok().filter(|s| !s.is_empty()),
        })
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_documented_values() {
        let config = Config::default();
        assert_eq!(config.server_address, "0.0.0.0:8000");
        assert_eq!(config.max_upload_size_bytes(), 10 * 1024 * 1024);
        assert!(config.neural_ocr_enabled);
    }
}
