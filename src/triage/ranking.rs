//! Priority ordering of confirmed findings.
//!
//! Key: tier priority ascending, in-tier rank ascending, confidence
//! descending. Sorting is stable, so exact key ties keep detection order.

use std::cmp::Ordering;

use super::types::ValidatedFinding;

/// Compare two findings by triage priority (`Less` = more urgent).
pub fn compare_priority(a: &ValidatedFinding, b: &ValidatedFinding) -> Ordering {
    a.rule
        .risk
        .priority()
        .cmp(&b.rule.risk.priority())
        .then_with(|| a.rule.priority_rank.cmp(&b.rule.priority_rank))
        .then_with(|| b.confidence().total_cmp(&a.confidence()))
}

/// Return references to `findings` in priority order without reordering the input.
pub fn rank_findings(findings: &[ValidatedFinding]) -> Vec<&ValidatedFinding> {
    let mut ordered: Vec<&ValidatedFinding> = findings.iter().collect();
    ordered.sort_by(|a, b| compare_priority(a, b));
    ordered
}
