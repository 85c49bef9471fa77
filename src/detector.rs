//! Detection collaborator.
//!
//! The triage core never runs a model itself. A [`Detector`] is injected
//! into the service and asked for raw detections on the normalized image.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::TriageError;
use crate::imaging::NormalizedImage;
use crate::rules::RuleTable;
use crate::triage::{BoundingBox, RawDetection};

/// Default confidence passed to detectors; lower scores are not returned.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.40;

/// Produces raw detections for one normalized image.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &NormalizedImage) -> Result<Vec<RawDetection>, TriageError>;
}

/// One detection record as emitted by the detection model.
///
/// Either `label` or `class_id` must be present; a label always wins.
#[derive(Debug, Clone, Deserialize)]
struct DetectionRecord {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    class_id: Option<u32>,
    #[serde(alias = "confidence")]
    conf: f64,
    bbox: BoundingBox,
}

/// Detector that replays a fixed list of detections, e.g. model output
/// captured to JSON.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedDetections {
    detections: Vec<RawDetection>,
    min_confidence: f64,
}

impl PrecomputedDetections {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            detections,
            min_confidence: 0.0,
        }
    }

    /// Drop detections scoring below `min_confidence` when replayed.
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Parse a JSON array of detection records, resolving missing labels
    /// from `class_id` through `rules`.
    pub fn from_json(json: &str, rules: &RuleTable) -> Result<Self, TriageError> {
        let records: Vec<DetectionRecord> = serde_json::from_str(json)?;

        let detections = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                let label = match (record.label, record.class_id) {
                    (Some(label), _) => label,
                    (None, Some(class_id)) => rules.label_for_class(class_id),
                    (None, None) => {
                        return Err(TriageError::Detector(format!(
                            "Detection {} has neither label nor class_id",
                            i
                        )))
                    }
                };
                Ok(RawDetection::new(label, record.conf, record.bbox))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(detections))
    }

    /// Load detections from a JSON file.
    pub fn load(path: &Path, rules: &RuleTable) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read detections file: {}", path.display()))?;
        let detector = Self::from_json(&content, rules)
            .with_context(|| format!("Failed to parse detections file: {}", path.display()))?;

        info!("Loaded {} detections from {}", detector.detections.len(), path.display());
        Ok(detector)
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

impl Detector for PrecomputedDetections {
    fn detect(&self, image: &NormalizedImage) -> Result<Vec<RawDetection>, TriageError> {
        let detections: Vec<RawDetection> = self
            .detections
            .iter()
            .filter(|d| d.confidence >= self.min_confidence)
            .cloned()
            .collect();

        debug!(
            "Replaying {} detections for {}x{} image",
            detections.len(),
            image.width(),
            image.height()
        );
        Ok(detections)
    }
}
