//! TOML rule loading and lookup for the diagnosis rule table.
//!
//! Provides two loading methods:
//! - `default_rules()` - Loads the embedded 14-disease table compiled into the binary
//! - `load_rules(path)` - Loads a custom table from a file path

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use tracing::info;

use super::types::{DiseaseRule, RiskTier, RulesConfig};
use crate::error::TriageError;

/// Default rules embedded in the binary at compile time.
/// These are loaded from `config/disease_rules.toml`.
const DEFAULT_RULES: &str = include_str!("../../config/disease_rules.toml");

/// Lowest accepted confirmation threshold. Also the gray-zone floor.
pub const MIN_THRESHOLD: f64 = 0.50;

static STANDARD_TABLE: LazyLock<RuleTable> = LazyLock::new(default_rules);

/// Immutable lookup table of disease rules, keyed by exact detector label.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<DiseaseRule>,
    by_label: HashMap<String, usize>,
}

impl RuleTable {
    /// Build a table from parsed configuration, validating every entry.
    pub fn new(config: RulesConfig) -> Result<Self, TriageError> {
        validate(&config.diseases)?;

        let by_label = config
            .diseases
            .iter()
            .enumerate()
            .map(|(i, rule)| (rule.label.clone(), i))
            .collect();

        Ok(Self {
            rules: config.diseases,
            by_label,
        })
    }

    /// The process-wide standard table, parsed on first use.
    pub fn standard() -> &'static RuleTable {
        &STANDARD_TABLE
    }

    /// Look up a rule by exact (case-sensitive) label.
    pub fn get(&self, label: &str) -> Option<&DiseaseRule> {
        self.by_label.get(label).map(|&i| &self.rules[i])
    }

    /// Map a detector class index to its label. Unknown indices get a
    /// `Class_<id>` placeholder that matches no rule.
    pub fn label_for_class(&self, class_id: u32) -> String {
        self.rules
            .iter()
            .find(|r| r.class_id == class_id)
            .map(|r| r.label.clone())
            .unwrap_or_else(|| format!("Class_{}", class_id))
    }

    /// All rules ordered by tier priority, then in-tier rank.
    pub fn by_priority(&self) -> Vec<&DiseaseRule> {
        let mut ordered: Vec<&DiseaseRule> = self.rules.iter().collect();
        ordered.sort_by_key(|r| (r.risk.priority(), r.priority_rank));
        ordered
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiseaseRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Check label/class uniqueness, threshold range and in-tier rank uniqueness.
fn validate(rules: &[DiseaseRule]) -> Result<(), TriageError> {
    let mut labels = HashSet::new();
    let mut class_ids = HashSet::new();
    let mut ranks: HashSet<(RiskTier, u8)> = HashSet::new();

    for rule in rules {
        if rule.label.is_empty() {
            return Err(TriageError::Rules("Rule with empty label".to_string()));
        }
        if !labels.insert(rule.label.as_str()) {
            return Err(TriageError::Rules(format!("Duplicate label '{}'", rule.label)));
        }
        if !class_ids.insert(rule.class_id) {
            return Err(TriageError::Rules(format!(
                "Duplicate class id {} ('{}')",
                rule.class_id, rule.label
            )));
        }
        if !(MIN_THRESHOLD..=1.0).contains(&rule.threshold) {
            return Err(TriageError::Rules(format!(
                "Threshold {} for '{}' outside [0.5, 1.0]",
                rule.threshold, rule.label
            )));
        }
        if rule.priority_rank == 0 {
            return Err(TriageError::Rules(format!(
                "Priority rank for '{}' must be positive",
                rule.label
            )));
        }
        if !ranks.insert((rule.risk, rule.priority_rank)) {
            return Err(TriageError::Rules(format!(
                "Priority rank {} used twice in tier {:?} ('{}')",
                rule.priority_rank, rule.risk, rule.label
            )));
        }
    }

    Ok(())
}

/// Load a rule table from a TOML file at the given path.
///
/// # Returns
/// * `Ok(RuleTable)` - Parsed and validated table
/// * `Err` - If file cannot be read, TOML is invalid or a rule fails validation
pub fn load_rules(path: &Path) -> Result<RuleTable> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules file {:?}", path))?;
    let config: RulesConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid rules TOML in {:?}", path))?;
    let table = RuleTable::new(config)?;
    info!("Loaded {} disease rules from {:?}", table.len(), path);
    Ok(table)
}

/// Parse the rule table embedded in the binary.
///
/// # Panics
/// Panics if the embedded TOML is invalid (this would be a compile-time bug).
pub fn default_rules() -> RuleTable {
    let config: RulesConfig =
        toml::from_str(DEFAULT_RULES).expect("embedded disease_rules.toml must be valid TOML");
    RuleTable::new(config).expect("embedded disease_rules.toml must pass validation")
}
