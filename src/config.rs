//! Service configuration.
//!
//! Loaded from an optional TOML file, then overridden by `PULMO_*`
//! environment variables:
//!
//! | Variable                    | Field                               |
//! |-----------------------------|-------------------------------------|
//! | `PULMO_IMAGE_TARGET_SIZE`   | `normalizer.target_size`            |
//! | `PULMO_APPLY_HISTOGRAM_EQ`  | `normalizer.equalization` on/off    |
//! | `PULMO_EQUALIZATION`        | `normalizer.equalization`           |
//! | `PULMO_JPEG_QUALITY`        | `normalizer.jpeg_quality`           |
//! | `PULMO_RULES_PATH`          | `rules_path`                        |
//! | `PULMO_CONF_THRESHOLD`      | `detector_min_confidence`           |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::detector::DEFAULT_MIN_CONFIDENCE;
use crate::error::TriageError;
use crate::imaging::{Equalization, NormalizerConfig};
use crate::rules::{load_rules, RuleTable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub normalizer: NormalizerConfig,
    /// Custom rule table; the embedded standard table when unset
    pub rules_path: Option<PathBuf>,
    pub detector_min_confidence: f64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            normalizer: NormalizerConfig::default(),
            rules_path: None,
            detector_min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl TriageConfig {
    /// Read a TOML file, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: TriageConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, TriageError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PULMO_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), TriageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PULMO_IMAGE_TARGET_SIZE") {
            self.normalizer.target_size = Some(parse_var("PULMO_IMAGE_TARGET_SIZE", &v)?);
        }

        if let Some(v) = lookup("PULMO_APPLY_HISTOGRAM_EQ") {
            self.normalizer.equalization = if v.trim().eq_ignore_ascii_case("true") {
                match self.normalizer.equalization {
                    Equalization::None => Equalization::Global,
                    other => other,
                }
            } else {
                Equalization::None
            };
        }

        if let Some(v) = lookup("PULMO_EQUALIZATION") {
            self.normalizer.equalization = match v.trim().to_ascii_lowercase().as_str() {
                "none" => Equalization::None,
                "global" => Equalization::Global,
                "adaptive" | "clahe" => Equalization::Adaptive,
                other => {
                    return Err(TriageError::Config(format!(
                        "PULMO_EQUALIZATION must be none, global or adaptive, got '{}'",
                        other
                    )))
                }
            };
        }

        if let Some(v) = lookup("PULMO_JPEG_QUALITY") {
            self.normalizer.jpeg_quality = parse_var("PULMO_JPEG_QUALITY", &v)?;
        }

        if let Some(v) = lookup("PULMO_RULES_PATH") {
            self.rules_path = Some(PathBuf::from(v));
        }

        if let Some(v) = lookup("PULMO_CONF_THRESHOLD") {
            self.detector_min_confidence = parse_var("PULMO_CONF_THRESHOLD", &v)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), TriageError> {
        self.normalizer.validate()?;
        if !(0.0..=1.0).contains(&self.detector_min_confidence) {
            return Err(TriageError::Config(format!(
                "detector_min_confidence must be within [0, 1], got {}",
                self.detector_min_confidence
            )));
        }
        Ok(())
    }

    /// Load the configured rule table, or a copy of the standard one.
    pub fn rule_table(&self) -> Result<RuleTable> {
        match &self.rules_path {
            Some(path) => load_rules(path),
            None => Ok(RuleTable::standard().clone()),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, TriageError> {
    value
        .trim()
        .parse()
        .map_err(|_| TriageError::Config(format!("Invalid value for {}: '{}'", name, value)))
}
