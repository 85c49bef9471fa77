//! Request-level orchestration: normalize, detect, triage, visualize.
//!
//! Each `analyze` call is independent. Image work runs on the blocking
//! pool; the rule table, normalizer, detector and visualizer are shared
//! read-only across concurrent requests.

use std::path::PathBuf;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::TriageConfig;
use crate::detector::Detector;
use crate::error::TriageError;
use crate::imaging::{ImageNormalizer, NormalizedImage};
use crate::rules::RuleTable;
use crate::triage::{DiagnosisReport, TriageEngine};
use crate::visualize::{RiskVisualizer, Visualizer};

pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result of one analysis request.
#[derive(Debug, Clone)]
pub struct TriageOutcome {
    pub file_id: String,
    pub report: DiagnosisReport,
    pub normalized_jpeg: Vec<u8>,
    /// Risk-colored annotation; `None` when nothing was found or rendering
    /// failed
    pub annotated_jpeg: Option<Vec<u8>>,
    pub analyzed_at: String,
}

impl TriageOutcome {
    /// Response envelope with images as base64 JPEG.
    pub fn to_envelope(&self) -> Value {
        json!({
            "success": true,
            "file_id": self.file_id,
            "data": self.report,
            "original_image": STANDARD.encode(&self.normalized_jpeg),
            "evaluated_image": self.annotated_jpeg.as_ref().map(|bytes| STANDARD.encode(bytes)),
            "analyzed_at": self.analyzed_at,
        })
    }
}

/// Failure envelope matching [`TriageOutcome::to_envelope`].
pub fn error_envelope(err: &TriageError) -> Value {
    json!({ "success": false, "error": err.to_string() })
}

#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub version: String,
    pub dicom_support: bool,
    pub supported_diseases: usize,
}

pub struct TriageService {
    normalizer: Arc<ImageNormalizer>,
    detector: Arc<dyn Detector>,
    rules: Arc<RuleTable>,
    visualizer: Arc<dyn Visualizer>,
}

impl TriageService {
    pub fn new(config: &TriageConfig, rules: RuleTable, detector: Arc<dyn Detector>) -> Self {
        Self {
            normalizer: Arc::new(ImageNormalizer::new(config.normalizer.clone())),
            detector,
            rules: Arc::new(rules),
            visualizer: Arc::new(RiskVisualizer::new(config.normalizer.jpeg_quality)),
        }
    }

    /// Replace the default risk visualizer.
    pub fn with_visualizer(mut self, visualizer: Arc<dyn Visualizer>) -> Self {
        self.visualizer = visualizer;
        self
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            version: SERVICE_VERSION.to_string(),
            dicom_support: ImageNormalizer::native_supported(),
            supported_diseases: self.rules.len(),
        }
    }

    /// Rule listing in priority order, wrapped like an analysis response.
    pub fn rules_envelope(&self) -> Value {
        let data: Vec<Value> = self
            .rules
            .by_priority()
            .into_iter()
            .map(|rule| {
                json!({
                    "label": rule.label,
                    "name_en": rule.name_en,
                    "name_vn": rule.name_vn,
                    "risk_level": rule.risk.level().as_str(),
                    "threshold": rule.threshold,
                    "priority_rank": rule.priority_rank,
                    "recommendation": rule.recommendation,
                })
            })
            .collect();
        json!({ "success": true, "total": data.len(), "data": data })
    }

    /// Analyze one upload end to end.
    ///
    /// # Errors
    /// Decode and format errors from normalization, detector errors, and
    /// `Worker` if a blocking task panicked. Visualization problems never
    /// fail the request.
    pub async fn analyze(&self, file_name: &str, bytes: Vec<u8>) -> Result<TriageOutcome, TriageError> {
        let file_id = generate_file_id();
        info!("Analyzing '{}' as {} ({} bytes)", file_name, file_id, bytes.len());

        let normalizer = Arc::clone(&self.normalizer);
        let detector = Arc::clone(&self.detector);
        let path = PathBuf::from(file_name);
        let (image, detections) = tokio::task::spawn_blocking(move || {
            let image = normalizer.normalize(&path, &bytes)?;
            let detections = detector.detect(&image)?;
            Ok::<_, TriageError>((image, detections))
        })
        .await
        .map_err(|e| TriageError::Worker(format!("Normalization task panicked: {}", e)))??;

        let evaluation = TriageEngine::new(&self.rules).evaluate(&detections);
        let NormalizedImage { pixels, jpeg, .. } = image;

        let visualizer = Arc::clone(&self.visualizer);
        let classification = evaluation.classification;
        let has_findings = !classification.is_empty();
        let annotated_jpeg = match tokio::task::spawn_blocking(move || {
            visualizer.render(&pixels, &classification.validated, &classification.gray_zone)
        })
        .await
        {
            Ok(result) => result,
            Err(e) => {
                error!("Visualization task panicked: {}", e);
                None
            }
        };
        if has_findings && annotated_jpeg.is_none() {
            warn!("Returning {} without annotated image", file_id);
        }

        Ok(TriageOutcome {
            file_id,
            report: evaluation.report,
            normalized_jpeg: jpeg,
            annotated_jpeg,
            analyzed_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Random version-4 style identifier for one request.
pub fn generate_file_id() -> String {
    let mut bytes: [u8; 16] = rand::random();
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}-{}-{}-{}", &hex[0..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..32])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::PrecomputedDetections;
    use crate::triage::{BoundingBox, DiagnosisStatus, GrayZoneFinding, RawDetection, ValidatedFinding};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn detect(&self, _image: &NormalizedImage) -> Result<Vec<RawDetection>, TriageError> {
            Err(TriageError::Detector("model unavailable".to_string()))
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn small_config() -> TriageConfig {
        let mut config = TriageConfig::default();
        config.normalizer.target_size = Some(128);
        config
    }

    fn service(detections: Vec<RawDetection>) -> TriageService {
        TriageService::new(
            &small_config(),
            RuleTable::standard().clone(),
            Arc::new(PrecomputedDetections::new(detections)),
        )
    }

    #[tokio::test]
    async fn test_analyze_detected() {
        let svc = service(vec![RawDetection::new(
            "Pneumothorax",
            0.81,
            BoundingBox::new(10.0, 40.0, 90.0, 110.0),
        )]);
        let outcome = svc.analyze("chest.png", png(200, 150)).await.unwrap();

        assert_eq!(outcome.report.diagnosis_status, DiagnosisStatus::Detected);
        assert_eq!(outcome.report.primary_diagnosis.label, "Pneumothorax");
        assert_eq!(&outcome.normalized_jpeg[..2], &[0xFF, 0xD8]);
        assert!(outcome.annotated_jpeg.is_some());
        assert_eq!(outcome.file_id.len(), 36);
    }

    #[tokio::test]
    async fn test_analyze_decode_error() {
        let svc = service(Vec::new());
        let result = svc.analyze("chest.jpg", b"garbage".to_vec()).await;
        assert!(matches!(result, Err(TriageError::Decode(_))));
    }

    #[tokio::test]
    async fn test_detector_error_propagates() {
        let svc = TriageService::new(&small_config(), RuleTable::standard().clone(), Arc::new(FailingDetector));
        let result = svc.analyze("chest.png", png(64, 64)).await;
        assert!(matches!(result, Err(TriageError::Detector(_))));
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let svc = service(Vec::new());
        let outcome = svc.analyze("chest.png", png(64, 64)).await.unwrap();
        let envelope = outcome.to_envelope();

        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["data"]["diagnosis_status"], "UNCERTAIN");
        let original = STANDARD.decode(envelope["original_image"].as_str().unwrap()).unwrap();
        assert_eq!(&original[..2], &[0xFF, 0xD8]);
        assert!(envelope["evaluated_image"].is_null());
    }

    #[tokio::test]
    async fn test_no_detections_has_no_annotation() {
        let svc = service(Vec::new());
        let outcome = svc.analyze("chest.png", png(64, 64)).await.unwrap();
        assert!(outcome.annotated_jpeg.is_none());
        assert_eq!(&outcome.normalized_jpeg[..2], &[0xFF, 0xD8]);
    }

    struct PanickingVisualizer;

    impl Visualizer for PanickingVisualizer {
        fn render(&self, _: &RgbImage, _: &[ValidatedFinding], _: &[GrayZoneFinding]) -> Option<Vec<u8>> {
            panic!("renderer crashed");
        }
    }

    struct NullVisualizer;

    impl Visualizer for NullVisualizer {
        fn render(&self, _: &RgbImage, _: &[ValidatedFinding], _: &[GrayZoneFinding]) -> Option<Vec<u8>> {
            None
        }
    }

    fn pneumothorax() -> Vec<RawDetection> {
        vec![
            RawDetection::new("Pneumothorax", 0.81, BoundingBox::new(10.0, 40.0, 90.0, 110.0)),
            RawDetection::new("Nodule/Mass", 0.62, BoundingBox::new(20.0, 20.0, 60.0, 60.0)),
        ]
    }

    #[tokio::test]
    async fn test_visualizer_panic_keeps_report() {
        let svc = service(pneumothorax()).with_visualizer(Arc::new(PanickingVisualizer));
        let outcome = svc.analyze("chest.png", png(200, 150)).await.unwrap();

        assert!(outcome.annotated_jpeg.is_none());
        assert_eq!(outcome.report.diagnosis_status, DiagnosisStatus::Detected);
        assert_eq!(outcome.report.primary_diagnosis.label, "Pneumothorax");
        assert_eq!(outcome.report.total_findings, 1);
        assert_eq!(outcome.report.gray_zone_notes.len(), 1);
        assert_eq!(&outcome.normalized_jpeg[..2], &[0xFF, 0xD8]);
        assert!(outcome.to_envelope()["evaluated_image"].is_null());
    }

    #[tokio::test]
    async fn test_visualizer_failure_keeps_report() {
        let svc = service(pneumothorax()).with_visualizer(Arc::new(NullVisualizer));
        let outcome = svc.analyze("chest.png", png(200, 150)).await.unwrap();

        assert!(outcome.annotated_jpeg.is_none());
        assert_eq!(outcome.report.primary_diagnosis.label, "Pneumothorax");
        assert_eq!(outcome.report.total_findings, 1);
    }

    #[test]
    fn test_envelope_without_annotation() {
        let outcome = TriageOutcome {
            file_id: "abc".to_string(),
            report: crate::triage::build_report(&[], &[]),
            normalized_jpeg: vec![0xFF, 0xD8],
            annotated_jpeg: None,
            analyzed_at: "2026-01-01T00:00:00+00:00".to_string(),
        };
        assert!(outcome.to_envelope()["evaluated_image"].is_null());
    }

    #[test]
    fn test_error_envelope() {
        let value = error_envelope(&TriageError::Decode("bad bytes".to_string()));
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Decode error: bad bytes");
    }

    #[test]
    fn test_capabilities() {
        let caps = service(Vec::new()).capabilities();
        assert_eq!(caps.supported_diseases, 14);
        assert_eq!(caps.dicom_support, cfg!(feature = "dicom"));
    }

    #[test]
    fn test_rules_envelope_priority_order() {
        let value = service(Vec::new()).rules_envelope();
        assert_eq!(value["total"], 14);
        assert_eq!(value["data"][0]["label"], "Pneumothorax");
        assert_eq!(value["data"][1]["label"], "Nodule/Mass");
        assert_eq!(value["data"][13]["risk_level"], "Benign");
    }

    #[test]
    fn test_file_id_format() {
        let id = generate_file_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.iter().map(|p| p.len()).collect::<Vec<_>>(), vec![8, 4, 4, 4, 12]);
        assert!(parts[2].starts_with('4'));
        assert_ne!(id, generate_file_id());
    }
}
