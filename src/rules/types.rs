//! Type definitions for the disease rule table.
//!
//! These types support both TOML deserialization (for loading rules)
//! and JSON serialization (for listing the table to callers).

use serde::{Deserialize, Serialize};

// =============================================================================
// RISK TIERS
// =============================================================================

/// Severity class of a disease. Ordered: Critical > HighRisk > Warning > Benign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Critical,
    #[serde(rename = "High Risk")]
    HighRisk,
    Warning,
    Benign,
}

impl RiskTier {
    pub const ALL: [RiskTier; 4] = [
        RiskTier::Critical,
        RiskTier::HighRisk,
        RiskTier::Warning,
        RiskTier::Benign,
    ];

    /// Triage priority of the tier (1 = most urgent).
    pub fn priority(self) -> u8 {
        match self {
            RiskTier::Critical => 1,
            RiskTier::HighRisk => 2,
            RiskTier::Warning => 3,
            RiskTier::Benign => 4,
        }
    }

    /// The reporting level this tier is displayed as.
    pub fn level(self) -> RiskLevel {
        match self {
            RiskTier::Critical => RiskLevel::Critical,
            RiskTier::HighRisk => RiskLevel::HighRisk,
            RiskTier::Warning => RiskLevel::Warning,
            RiskTier::Benign => RiskLevel::Benign,
        }
    }

    pub fn color_hex(self) -> &'static str {
        self.level().color_hex()
    }

    pub fn color_rgb(self) -> [u8; 3] {
        self.level().color_rgb()
    }
}

/// Risk level as it appears in a report: the four tiers plus `Uncertain`
/// for the no-finding case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Critical,
    #[serde(rename = "High Risk")]
    HighRisk,
    Warning,
    Benign,
    Uncertain,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Critical => "Critical",
            RiskLevel::HighRisk => "High Risk",
            RiskLevel::Warning => "Warning",
            RiskLevel::Benign => "Benign",
            RiskLevel::Uncertain => "Uncertain",
        }
    }

    pub fn color_hex(self) -> &'static str {
        match self {
            RiskLevel::Critical => "#DC0000",
            RiskLevel::HighRisk => "#FF4500",
            RiskLevel::Warning => "#FFA500",
            RiskLevel::Benign => "#00CC66",
            RiskLevel::Uncertain => "#808080",
        }
    }

    pub fn color_rgb(self) -> [u8; 3] {
        match self {
            RiskLevel::Critical => [0xDC, 0x00, 0x00],
            RiskLevel::HighRisk => [0xFF, 0x45, 0x00],
            RiskLevel::Warning => [0xFF, 0xA5, 0x00],
            RiskLevel::Benign => [0x00, 0xCC, 0x66],
            RiskLevel::Uncertain => [0x80, 0x80, 0x80],
        }
    }
}

// =============================================================================
// CONFIGURATION TYPES (loaded from TOML)
// =============================================================================

/// Root configuration loaded from disease_rules.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    pub diseases: Vec<DiseaseRule>,
}

/// Diagnosis rule for a single disease class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseRule {
    /// Detector label; detections must match it exactly
    pub label: String,
    /// Detector class index
    pub class_id: u32,
    /// Clinical (English) name
    pub name_en: String,
    /// Localized (Vietnamese) name
    pub name_vn: String,
    #[serde(rename = "risk")]
    pub risk: RiskTier,
    /// Minimum confidence for a confirmed finding, in [0.5, 1.0]
    pub threshold: f64,
    /// Priority inside the tier (1 = most urgent)
    pub priority_rank: u8,
    /// Follow-up recommendation shown with a confirmed finding
    pub recommendation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_tier_deserialize() {
        let tier: RiskTier = serde_json::from_str(r#""High Risk""#).unwrap();
        assert_eq!(tier, RiskTier::HighRisk);

        let tier: RiskTier = serde_json::from_str(r#""Critical""#).unwrap();
        assert_eq!(tier, RiskTier::Critical);

        assert!(serde_json::from_str::<RiskTier>(r#""Uncertain""#).is_err());
    }

    #[test]
    fn test_tier_priorities_are_ordered() {
        let priorities: Vec<u8> = RiskTier::ALL.iter().map(|t| t.priority()).collect();
        assert_eq!(priorities, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_tier_colors() {
        assert_eq!(RiskTier::Critical.color_hex(), "#DC0000");
        assert_eq!(RiskTier::HighRisk.color_hex(), "#FF4500");
        assert_eq!(RiskTier::Warning.color_hex(), "#FFA500");
        assert_eq!(RiskTier::Benign.color_hex(), "#00CC66");
        assert_eq!(RiskLevel::Uncertain.color_hex(), "#808080");
    }

    #[test]
    fn test_rgb_matches_hex() {
        for level in [
            RiskLevel::Critical,
            RiskLevel::HighRisk,
            RiskLevel::Warning,
            RiskLevel::Benign,
            RiskLevel::Uncertain,
        ] {
            let [r, g, b] = level.color_rgb();
            assert_eq!(format!("#{:02X}{:02X}{:02X}", r, g, b), level.color_hex());
        }
    }

    #[test]
    fn test_risk_level_serialize() {
        let json = serde_json::to_string(&RiskLevel::HighRisk).unwrap();
        assert_eq!(json, r#""High Risk""#);
        assert_eq!(RiskLevel::Uncertain.as_str(), "Uncertain");
    }
}
