use axum::http::StatusCode;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::ocr::{OcrError, ALLOWED_CONTENT_TYPES};

/// Common trait for the errors the HTTP layer turns into responses
pub trait AppError: std::error::Error + Send + Sync + 'static {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get the error code for client handling
    fn error_code(&self) -> &'static str;

    /// Extra fields merged into the JSON body
    fn details(&self) -> Map<String, Value> {
        Map::new()
    }
}

/// Implements IntoResponse for an AppError type with a
/// `{error, code, status, ..details}` JSON body
macro_rules! impl_into_response {
    ($error_type:ty) => {
        impl axum::response::IntoResponse for $error_type {
            fn into_response(self) -> axum::response::Response {
                use crate::errors::AppError;
                use axum::response::Json;
                use serde_json::{json, Value};

                let status = self.status_code();
                if status.is_server_error() {
                    tracing::error!("{}", self);
                } else {
                    tracing::warn!("Rejected request: {}", self);
                }

                let mut body = json!({
                    "error": self.user_message(),
                    "code": self.error_code(),
                    "status": status.as_u16()
                });
                if let Value::Object(map) = &mut body {
                    map.extend(self.details());
                }

                (status, Json(body)).into_response()
            }
        }
    };
}

pub(crate) use impl_into_response;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No image field in the multipart form")]
    MissingImage,

    #[error("Unsupported content type: {received_type}")]
    UnsupportedType { received_type: String },

    #[error("Upload of {received_bytes} bytes exceeds the {max_mb}MB limit")]
    FileTooLarge { max_mb: u64, received_bytes: u64 },

    #[error("Could not decode upload: {details}")]
    Decode { details: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Extraction failed: {details}")]
    ExtractionFailed { details: String },
}

impl AppError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingImage
            | ApiError::UnsupportedType { .. }
            | ApiError::FileTooLarge { .. }
            | ApiError::Decode { .. }
            | ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::ExtractionFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn user_message(&self) -> String {
        match self {
            ApiError::MissingImage => "Aucune image fournie".to_string(),
            ApiError::UnsupportedType { .. } => "Type de fichier non supporté".to_string(),
            ApiError::FileTooLarge { .. } => "Fichier trop volumineux".to_string(),
            ApiError::Decode { .. } => "Impossible de décoder l'image".to_string(),
            ApiError::BadRequest { message } => message.clone(),
            ApiError::ExtractionFailed { .. } => "Erreur interne lors de l'extraction".to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::MissingImage => "MISSING_IMAGE",
            ApiError::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            ApiError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            ApiError::Decode { .. } => "DECODE_FAILED",
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::ExtractionFailed { .. } => "EXTRACTION_FAILED",
        }
    }

    fn details(&self) -> Map<String, Value> {
        let details = match self {
            ApiError::MissingImage => json!({
                "message": "Veuillez envoyer une image avec la clé \"image\" en multipart/form-data"
            }),
            ApiError::UnsupportedType { received_type } => json!({
                "allowed_types": ALLOWED_CONTENT_TYPES,
                "received_type": received_type
            }),
            ApiError::FileTooLarge { max_mb, received_bytes } => json!({
                "max_size": format!("{}MB", max_mb),
                "received_size": format!("{:.1}MB", *received_bytes as f64 / (1024.0 * 1024.0))
            }),
            ApiError::Decode { .. } => json!({
                "message": "Vérifiez que le fichier est une image valide"
            }),
            ApiError::ExtractionFailed { details } => json!({ "details": details }),
            ApiError::BadRequest { .. } => json!({}),
        };

        match details {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl_into_response!(ApiError);

impl ApiError {
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest { message: message.into() }
    }
}

impl From<OcrError> for ApiError {
    fn from(err: OcrError) -> Self {
        match err {
            OcrError::UnsupportedContentType { content_type } => ApiError::UnsupportedType {
                received_type: content_type,
            },
            OcrError::Decode { .. } => ApiError::Decode { details: err.to_string() },
            other => ApiError::ExtractionFailed { details: other.to_string() },
        }
    }
}
