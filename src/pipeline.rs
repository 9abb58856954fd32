use serde::Serialize;
use std::time::Instant;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::field_extraction::{extract_fields, ExtractionOutcome};
use crate::ocr::{
    self, decode_upload, normalize_text, preprocess, ImageStatistics, MetricsSource, OcrEngine, OcrError,
    PreprocessBranch, QualityMetrics, QualityVerdict, Recognition,
};

/// Everything one extraction produced. Only `outcome` goes back to API callers.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub request_id: Uuid,
    pub outcome: ExtractionOutcome,
    pub metrics: QualityMetrics,
    pub verdict: QualityVerdict,
    pub branch: PreprocessBranch,
    pub preprocessing_applied: Vec<String>,
    pub recognition: Recognition,
    pub normalized_text: String,
    pub processing_time_ms: u64,
}

/// Decode, assess, preprocess, recognize, normalize and extract, in that order.
///
/// Holds no per-request state; one instance serves concurrent requests.
pub struct ExtractionPipeline {
    metrics: Box<dyn MetricsSource>,
    engine: OcrEngine,
    forced_verdict: Option<QualityVerdict>,
}

impl ExtractionPipeline {
    pub fn new(engine: OcrEngine) -> Self {
        Self {
            metrics: Box::new(ImageStatistics),
            engine,
            forced_verdict: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ocr::engine_from_config(config))
    }

    pub fn with_metrics_source(mut self, metrics: Box<dyn MetricsSource>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Skip the threshold rule and always take the branch for `verdict`.
    pub fn with_forced_verdict(mut self, verdict: QualityVerdict) -> Self {
        self.forced_verdict = Some(verdict);
        self
    }

    pub fn engine(&self) -> &OcrEngine {
        &self.engine
    }

    /// Run every stage on one upload. Blocking and CPU-bound.
    pub fn run(&self, bytes: &[u8], content_type: &str) -> Result<ExtractionReport, OcrError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("carte_grise_extraction", request_id = %request_id);
        let _guard = span.enter();
        let start_time = Instant::now();

        info!("Starting extraction of {} byte {} upload", bytes.len(), content_type);

        let frame = decode_upload(bytes, content_type)?;

        let (metrics, measured) = ocr::assess(&frame, self.metrics.as_ref());
        let verdict = self.forced_verdict.unwrap_or(measured);
        match metrics.failing_check() {
            Some(check) => info!("Image quality is {} ({} below threshold)", measured, check),
            None => info!("Image quality is {}", measured),
        }
        if verdict != measured {
            warn!("Quality verdict forced to {}", verdict);
        }

        let prepared = preprocess(&frame, verdict);
        let recognition = self.engine.recognize(&prepared.frame)?;

        let normalized_text = normalize_text(&recognition.text);
        let outcome = extract_fields(&normalized_text);

        let processing_time_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Extraction finished in {}ms: {} fields via {}",
            processing_time_ms,
            outcome.found_count(),
            recognition.engine
        );

        Ok(ExtractionReport {
            request_id,
            outcome,
            metrics,
            verdict,
            branch: prepared.branch,
            preprocessing_applied: prepared.preprocessing_applied,
            recognition,
            normalized_text,
            processing_time_ms,
        })
    }
}
