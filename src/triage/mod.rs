//! Diagnostic triage of chest radiograph detections.
//!
//! Turns raw detector output into a clinically prioritized report:
//!
//! - **Classification**: each detection is validated, gray-zone or dropped
//!   against its disease's confirmation threshold
//! - **Grading**: confirmed findings get a High/Medium confidence grade
//! - **Ranking**: tier, then in-tier rank, then confidence
//! - **Report**: primary diagnosis plus the ordered finding list
//!
//! All stages are pure and safe to call concurrently; the only shared state
//! is the immutable rule table.
//!
//! # Example
//!
//! ```ignore
//! use pulmo_triage::rules::RuleTable;
//! use pulmo_triage::triage::{BoundingBox, RawDetection, TriageEngine};
//!
//! let engine = TriageEngine::new(RuleTable::standard());
//! let detections = vec![RawDetection::new(
//!     "Pneumothorax",
//!     0.81,
//!     BoundingBox::new(100.0, 120.0, 400.0, 500.0),
//! )];
//!
//! let evaluation = engine.evaluate(&detections);
//! println!("{}", evaluation.report.primary_diagnosis.label);
//! ```

mod classifier;
mod ranking;
mod report;
mod types;

pub use classifier::{classify, grade_confidence, GRAY_ZONE_FLOOR};
pub use ranking::{compare_priority, rank_findings};
pub use report::{build_report, format_percent, gray_zone_note};
pub use types::*;

use tracing::info;

use crate::rules::RuleTable;

/// Classified findings together with the report built from them.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub classification: Classification,
    pub report: DiagnosisReport,
}

/// Runs classify -> rank -> report against one rule table.
pub struct TriageEngine<'a> {
    rules: &'a RuleTable,
}

impl<'a> TriageEngine<'a> {
    pub fn new(rules: &'a RuleTable) -> Self {
        Self { rules }
    }

    /// Evaluate one request's detections. Never fails.
    pub fn evaluate(&self, detections: &[RawDetection]) -> Evaluation {
        let classification = classify(detections, self.rules);
        let report = build_report(&classification.validated, &classification.gray_zone);

        info!(
            "Triage complete: {} detections, {} confirmed, {} gray-zone, status {:?}",
            detections.len(),
            classification.validated.len(),
            classification.gray_zone.len(),
            report.diagnosis_status
        );

        Evaluation {
            classification,
            report,
        }
    }
}
