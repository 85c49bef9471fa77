//! Threshold classification and confidence grading.
//!
//! Every detection is matched to its rule by exact label and then lands in
//! exactly one bucket: validated (`conf >= threshold`), gray zone
//! (`0.50 <= conf < threshold`) or dropped.

use tracing::debug;

use super::types::{Classification, ConfidenceGrade, GrayZoneFinding, RawDetection, ValidatedFinding};
use crate::rules::{DiseaseRule, RiskTier, RuleTable, MIN_THRESHOLD};

/// Detections below this confidence are noise and never reported.
pub const GRAY_ZONE_FLOOR: f64 = MIN_THRESHOLD;

/// High-grade cut for the Critical tier.
pub const CRITICAL_HIGH_CUT: f64 = 0.80;
/// High-grade cut for the Benign tier.
pub const BENIGN_HIGH_CUT: f64 = 0.90;
/// High-grade cut for the HighRisk and Warning tiers.
pub const ELEVATED_HIGH_CUT: f64 = 0.85;

/// Partition raw detections into validated and gray-zone findings.
///
/// Unmatched labels and sub-floor confidences are dropped silently.
/// Input order is preserved inside each bucket; duplicates are kept.
pub fn classify(detections: &[RawDetection], rules: &RuleTable) -> Classification {
    let mut classification = Classification::default();

    for detection in detections {
        let Some(rule) = rules.get(&detection.label) else {
            debug!("Dropping detection with unknown label '{}'", detection.label);
            continue;
        };

        let conf = detection.confidence;
        if conf >= rule.threshold {
            classification.validated.push(ValidatedFinding {
                detection: detection.clone(),
                rule: rule.clone(),
                grade: grade_confidence(conf, rule),
            });
        } else if (GRAY_ZONE_FLOOR..rule.threshold).contains(&conf) {
            classification.gray_zone.push(GrayZoneFinding {
                detection: detection.clone(),
                rule: rule.clone(),
            });
        } else {
            debug!(
                "Dropping '{}' at {:.4}: below gray-zone floor",
                detection.label, conf
            );
        }
    }

    classification
}

/// Grade a confirmed finding's confidence with fixed per-tier cut points.
///
/// The cut points are clinical constants, independent of the rule's
/// confirmation threshold:
/// - Critical: High at >= 0.80
/// - Benign: High at >= 0.90
/// - HighRisk and Warning: High at >= 0.85
pub fn grade_confidence(confidence: f64, rule: &DiseaseRule) -> ConfidenceGrade {
    let cut = match rule.risk {
        RiskTier::Critical => CRITICAL_HIGH_CUT,
        RiskTier::Benign => BENIGN_HIGH_CUT,
        RiskTier::HighRisk | RiskTier::Warning => ELEVATED_HIGH_CUT,
    };

    if confidence >= cut {
        ConfidenceGrade::High
    } else {
        ConfidenceGrade::Medium
    }
}
