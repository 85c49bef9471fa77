//! Diagnosis report assembly.
//!
//! Pure projection of classified findings into the report shape: no I/O,
//! no mutation of the inputs.

use super::ranking::rank_findings;
use super::types::{
    DiagnosisReport, DiagnosisStatus, FindingSummary, GrayZoneFinding, GrayZoneNote,
    PrimaryDiagnosis, ValidatedFinding,
};
use crate::rules::RiskLevel;

pub const UNCERTAIN_LABEL: &str = "Uncertain";
pub const UNCERTAIN_NAME_VN: &str = "Không rõ ràng / Chưa phát hiện bất thường rõ rệt";
pub const NO_CONFIRMED_FINDING_NOTE: &str = "Không có tổn thương nào đạt ngưỡng xác nhận.";

/// Number of gray-zone diseases named in a multi-finding note.
const GRAY_ZONE_NOTE_LIMIT: usize = 3;

/// Build the report for one request.
///
/// With no confirmed finding the status is `UNCERTAIN` and the primary
/// entry is synthetic, carrying a generated gray-zone note as its
/// recommendation. Otherwise findings are ranked and the first becomes
/// the primary diagnosis.
pub fn build_report(validated: &[ValidatedFinding], gray_zone: &[GrayZoneFinding]) -> DiagnosisReport {
    let gray_zone_notes: Vec<GrayZoneNote> = gray_zone.iter().map(gray_zone_entry).collect();

    let ordered = rank_findings(validated);
    let Some(primary) = ordered.first() else {
        return DiagnosisReport {
            diagnosis_status: DiagnosisStatus::Uncertain,
            primary_diagnosis: PrimaryDiagnosis {
                label: UNCERTAIN_LABEL.to_string(),
                name_vn: UNCERTAIN_NAME_VN.to_string(),
                risk_level: RiskLevel::Uncertain,
                confidence_level: None,
                recommendation: gray_zone_note(gray_zone),
                color: RiskLevel::Uncertain.color_hex().to_string(),
                probability: None,
            },
            findings: Vec::new(),
            gray_zone_notes,
            total_findings: 0,
        };
    };

    let primary_diagnosis = PrimaryDiagnosis {
        label: primary.rule.label.clone(),
        name_vn: primary.rule.name_vn.clone(),
        risk_level: primary.rule.risk.level(),
        confidence_level: Some(primary.grade),
        recommendation: primary.rule.recommendation.clone(),
        color: primary.rule.risk.color_hex().to_string(),
        probability: Some(primary.confidence()),
    };

    let findings: Vec<FindingSummary> = ordered.iter().map(|f| summarize(f)).collect();

    DiagnosisReport {
        diagnosis_status: DiagnosisStatus::Detected,
        primary_diagnosis,
        total_findings: findings.len(),
        findings,
        gray_zone_notes,
    }
}

/// Human-readable note for the no-confirmed-finding case.
pub fn gray_zone_note(gray_zone: &[GrayZoneFinding]) -> String {
    match gray_zone {
        [] => NO_CONFIRMED_FINDING_NOTE.to_string(),
        [single] => format!(
            "Nghi ngờ {} ({}) nhưng chưa đạt ngưỡng xác nhận ({}). Khuyến nghị theo dõi.",
            single.rule.name_vn,
            format_percent(single.confidence()),
            format_percent(single.rule.threshold)
        ),
        many => {
            let named: Vec<String> = many
                .iter()
                .take(GRAY_ZONE_NOTE_LIMIT)
                .map(|g| format!("{} ({})", g.rule.name_vn, format_percent(g.confidence())))
                .collect();
            format!(
                "Phát hiện {} tổn thương ở vùng xám cần theo dõi: {}. \
                 Khuyến nghị tái khám hoặc chụp lại để đánh giá rõ hơn.",
                many.len(),
                named.join(", ")
            )
        }
    }
}

/// Probability as a percentage with one decimal, e.g. `0.6` -> `60.0%`.
pub fn format_percent(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

fn summarize(finding: &ValidatedFinding) -> FindingSummary {
    FindingSummary {
        label: finding.rule.label.clone(),
        name_vn: finding.rule.name_vn.clone(),
        probability: finding.confidence(),
        risk_level: finding.rule.risk.level(),
        confidence_level: finding.grade,
        recommendation: finding.rule.recommendation.clone(),
        color: finding.rule.risk.color_hex().to_string(),
        bbox: finding.detection.bbox,
    }
}

fn gray_zone_entry(finding: &GrayZoneFinding) -> GrayZoneNote {
    GrayZoneNote {
        label: finding.rule.label.clone(),
        name_vn: finding.rule.name_vn.clone(),
        probability: finding.confidence(),
        required_threshold: finding.rule.threshold,
        bbox: finding.detection.bbox,
    }
}
