use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::Json,
    routing::post,
    Router,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    errors::ApiError,
    field_extraction::ExtractionOutcome,
    ocr::UploadKind,
    AppState,
};

/// Multipart field that carries the document.
pub const IMAGE_FIELD: &str = "image";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/extract", post(extract_carte_grise))
        .route("/extract/", post(extract_carte_grise))
}

struct Upload {
    content_type: String,
    data: Bytes,
}

#[utoipa::path(
    post,
    path = "/api/carte-grise/extract",
    tag = "carte-grise",
    request_body(content = String, description = "Multipart form data with the document under the `image` key. Supported formats: JPEG, PNG, PDF (first page).", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Extracted fields, or a soft failure carrying a text sample when nothing was recognized", body = ExtractionOutcome),
        (status = 400, description = "Missing image, unsupported type, oversized or undecodable file"),
        (status = 500, description = "Recognition failed on every backend")
    )
)]
pub async fn extract_carte_grise(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ExtractionOutcome>, ApiError> {
    let upload = read_image_field(&mut multipart).await?.ok_or(ApiError::MissingImage)?;
    validate_upload(&upload, state.config.max_upload_size_mb)?;

    info!("Received {} upload of {} bytes", upload.content_type, upload.data.len());

    let pipeline = state.pipeline.clone();
    let Upload { content_type, data } = upload;
    let report = tokio::task::spawn_blocking(move || pipeline.run(&data, &content_type))
        .await
        .map_err(|e| ApiError::ExtractionFailed {
            details: format!("extraction task failed: {}", e),
        })??;

    if report.outcome.record().is_none() {
        warn!(
            "No fields recognized (request {}, {} chars of text)",
            report.request_id,
            report.normalized_text.chars().count()
        );
    }

    Ok(Json(report.outcome))
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Option<Upload>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Could not read the image field: {}", e)))?;

        return Ok(Some(Upload { content_type, data }));
    }

    Ok(None)
}

fn validate_upload(upload: &Upload, max_upload_size_mb: u64) -> Result<(), ApiError> {
    if !UploadKind::is_allowed(&upload.content_type) {
        return Err(ApiError::UnsupportedType {
            received_type: upload.content_type.clone(),
        });
    }

    let received_bytes = upload.data.len() as u64;
    if received_bytes > max_upload_size_mb * 1024 * 1024 {
        return Err(ApiError::FileTooLarge {
            max_mb: max_upload_size_mb,
            received_bytes,
        });
    }

    Ok(())
}
