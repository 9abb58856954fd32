use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    field_extraction::{ConfidenceGrade, ExtractionOutcome, ExtractionRecord, NoFieldsFound},
    routes::ocr::OcrHealthResponse,
    AppState,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::carte_grise::extract_carte_grise,
        crate::routes::ocr::health_check,
    ),
    components(
        schemas(
            ExtractionOutcome, ExtractionRecord, NoFieldsFound, ConfidenceGrade,
            OcrHealthResponse
        )
    ),
    tags(
        (name = "carte-grise", description = "Vehicle registration certificate extraction"),
        (name = "ocr", description = "OCR backend status"),
    ),
    info(
        title = "Cartegrise API",
        version = "0.3.1",
        description = "Field extraction from French vehicle registration certificates"
    ),
    servers(
        (url = "/api", description = "API base path")
    )
)]
pub struct ApiDoc;

pub fn create_swagger_router() -> Router<Arc<AppState>> {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
