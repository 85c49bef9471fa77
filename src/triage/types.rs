//! Type definitions for detection triage.
//!
//! Input types come from the detection collaborator, intermediate types
//! carry the matched rule, and output types are the serialized report.

use serde::{Deserialize, Serialize};

use crate::rules::{DiseaseRule, RiskLevel};

// =============================================================================
// INPUT TYPES (from the detector)
// =============================================================================

/// Axis-aligned box in the normalized image's pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// A single detector output, before any rule is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Class label; must match a rule label exactly to be considered
    pub label: String,
    /// Detector confidence in [0, 1]
    #[serde(rename = "conf", alias = "confidence")]
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

// =============================================================================
// CLASSIFIED FINDINGS
// =============================================================================

/// Coarse confidence bucket shown next to a confirmed finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceGrade {
    High,
    Medium,
}

/// A detection at or above its disease's confirmation threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFinding {
    pub detection: RawDetection,
    pub rule: DiseaseRule,
    pub grade: ConfidenceGrade,
}

impl ValidatedFinding {
    pub fn confidence(&self) -> f64 {
        self.detection.confidence
    }
}

/// A detection above the noise floor but below its confirmation threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayZoneFinding {
    pub detection: RawDetection,
    pub rule: DiseaseRule,
}

impl GrayZoneFinding {
    pub fn confidence(&self) -> f64 {
        self.detection.confidence
    }
}

/// Output of the threshold classifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub validated: Vec<ValidatedFinding>,
    pub gray_zone: Vec<GrayZoneFinding>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.validated.is_empty() && self.gray_zone.is_empty()
    }
}

// =============================================================================
// OUTPUT TYPES (serialized report)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosisStatus {
    Detected,
    Uncertain,
}

/// Top-priority finding, or the synthetic `Uncertain` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryDiagnosis {
    pub label: String,
    pub name_vn: String,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<ConfidenceGrade>,
    pub recommendation: String,
    /// Tier color as `#RRGGBB`
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

/// A confirmed finding as listed in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingSummary {
    pub label: String,
    pub name_vn: String,
    pub probability: f64,
    pub risk_level: RiskLevel,
    pub confidence_level: ConfidenceGrade,
    pub recommendation: String,
    pub color: String,
    pub bbox: BoundingBox,
}

/// A gray-zone finding as listed in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrayZoneNote {
    pub label: String,
    pub name_vn: String,
    pub probability: f64,
    pub required_threshold: f64,
    pub bbox: BoundingBox,
}

/// Final triage report for one radiograph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub diagnosis_status: DiagnosisStatus,
    pub primary_diagnosis: PrimaryDiagnosis,
    pub findings: Vec<FindingSummary>,
    pub gray_zone_notes: Vec<GrayZoneNote>,
    pub total_findings: usize,
}
