mod helpers;

use cartegrise::field_extraction::{ConfidenceGrade, ExtractionOutcome, TEXT_SAMPLE_CHARS};
use cartegrise::ocr::{OcrError, PreprocessBranch, QualityVerdict};
use helpers::*;

#[test]
fn test_clean_image_yields_high_confidence_record() {
    let pipeline = pipeline_reading(FULL_DOCUMENT);

    let report = pipeline.run(&png_bytes(120, 80), "image/png").unwrap();

    assert_eq!(report.verdict, QualityVerdict::Good);
    assert_eq!(report.branch, PreprocessBranch::Light);
    let record = report.outcome.record().expect("fields should be found");
    assert_eq!(record.found_count(), 8);
    assert_eq!(record.extraction_confidence, ConfidenceGrade::High);
    assert_eq!(record.numero_immatriculation.as_deref(), Some("AB-123-CD"));
    assert_eq!(report.recognition.engine, "tesseract");
}

#[test]
fn test_noise_only_text_is_soft_failure() {
    let garbage = "zzz qqq ".repeat(60);
    let pipeline = pipeline_with(
        vec![Box::new(ScriptedBackend::text("tesseract", &garbage))],
        noisy_metrics(),
    );

    let report = pipeline.run(&png_bytes(120, 80), "image/png").unwrap();

    assert_eq!(report.verdict, QualityVerdict::Poor);
    match report.outcome {
        ExtractionOutcome::NoFields(failure) => {
            assert!(failure.extracted_text_sample.chars().count() <= TEXT_SAMPLE_CHARS);
            assert!(failure.extracted_text_sample.starts_with("zzz qqq"));
        }
        other => panic!("expected soft failure, got {:?}", other),
    }
}

#[test]
fn test_forced_poor_verdict_takes_aggressive_branch() {
    let pipeline = pipeline_reading("A: AB-123-CD D.1 PEUGEOT P.1 1598 S.1 5")
        .with_forced_verdict(QualityVerdict::Poor);

    let report = pipeline.run(&png_bytes(60, 40), "image/png").unwrap();

    assert_eq!(report.verdict, QualityVerdict::Poor);
    assert_eq!(report.branch, PreprocessBranch::Aggressive);
    assert!(report.preprocessing_applied.iter().any(|step| step == "adaptive_threshold"));
    assert!(report.outcome.found_count() >= 3);
}

#[test]
fn test_skewed_low_contrast_scan_is_straightened_and_extracted() {
    let pipeline = pipeline_with(
        vec![Box::new(ScriptedBackend::text("tesseract", "A: AB-123-CD D.1 PEUGEOT P.1 1598 S.1 5"))],
        low_contrast_metrics(),
    );

    let report = pipeline.run(&skewed_scan_png(5.0), "image/png").unwrap();

    assert_eq!(report.verdict, QualityVerdict::Poor);
    assert_eq!(report.branch, PreprocessBranch::Aggressive);
    assert!(
        report.preprocessing_applied.iter().any(|step| step.starts_with("deskew_")),
        "no deskew step in {:?}",
        report.preprocessing_applied
    );
    assert!(report.outcome.found_count() >= 3);
    let record = report.outcome.record().expect("fields should be found");
    assert_eq!(record.numero_immatriculation.as_deref(), Some("AB-123-CD"));
}

#[test]
fn test_noisy_metrics_take_aggressive_branch() {
    let pipeline = pipeline_with(
        vec![Box::new(ScriptedBackend::text("tesseract", "A: AB-123-CD D.1 PEUGEOT P.1 1598 S.1 5"))],
        noisy_metrics(),
    );

    let report = pipeline.run(&png_bytes(120, 80), "image/png").unwrap();

    assert_eq!(report.verdict, QualityVerdict::Poor);
    assert_eq!(report.branch, PreprocessBranch::Aggressive);
    assert!(report.outcome.found_count() >= 3);
}

#[test]
fn test_falls_back_to_classical_backend() {
    let pipeline = pipeline_with(
        vec![
            Box::new(ScriptedBackend::failing("neural", "model missing")),
            Box::new(ScriptedBackend::text("tesseract", "D.1 RENAULT")),
        ],
        good_metrics(),
    );

    let report = pipeline.run(&png_bytes(60, 40), "image/jpg").unwrap();

    assert_eq!(report.recognition.engine, "tesseract");
    assert_eq!(report.recognition.attempts.len(), 2);
    assert!(report.recognition.attempts[0].error.is_some());
    assert_eq!(report.outcome.found_count(), 1);
}

#[test]
fn test_every_backend_failing_is_an_error() {
    let pipeline = pipeline_with(
        vec![
            Box::new(ScriptedBackend::failing("neural", "model missing")),
            Box::new(ScriptedBackend::text("tesseract", "   ")),
        ],
        good_metrics(),
    );

    let err = pipeline.run(&png_bytes(60, 40), "image/png").unwrap_err();

    assert!(matches!(err, OcrError::Exhausted { .. }));
}

#[test]
fn test_undecodable_bytes_are_rejected_before_recognition() {
    let pipeline = pipeline_reading(FULL_DOCUMENT);

    let err = pipeline.run(b"definitely not a png", "image/png").unwrap_err();

    assert!(matches!(err, OcrError::Decode { .. }));
    assert!(err.is_client_error());
}

#[test]
fn test_unsupported_content_type() {
    let pipeline = pipeline_reading(FULL_DOCUMENT);

    let err = pipeline.run(&png_bytes(10, 10), "image/gif").unwrap_err();

    assert!(matches!(err, OcrError::UnsupportedContentType { .. }));
}
