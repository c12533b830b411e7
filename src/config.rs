// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Analysis configuration
//!
//! Presets come from [`AnalysisMode`]; files are TOML and may be partial,
//! missing keys falling back to the balanced defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

use crate::error::ConfigError;

/// Default config file looked up by [`AnalysisConfig::load`]
pub const DEFAULT_CONFIG_FILE: &str = "polyframe-features.toml";

/// Base minimum feature size in mm
pub const MIN_FEATURE_SIZE: f64 = 1.0;

/// Base minimum feature size in mm when small features are enabled
pub const MIN_SMALL_FEATURE_SIZE: f64 = 0.5;

/// Analysis presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Fast,
    #[default]
    Balanced,
    Thorough,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Fast => "fast",
            AnalysisMode::Balanced => "balanced",
            AnalysisMode::Thorough => "thorough",
        }
    }

    pub fn confidence_threshold(&self) -> f64 {
        match self {
            AnalysisMode::Fast => 0.7,
            AnalysisMode::Balanced => 0.6,
            AnalysisMode::Thorough => 0.4,
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(AnalysisMode::Fast),
            "balanced" => Ok(AnalysisMode::Balanced),
            "thorough" => Ok(AnalysisMode::Thorough),
            other => Err(format!("unknown analysis mode: {other}")),
        }
    }
}

/// Recognition configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Scales the minimum feature size; must be positive
    pub feature_size_multiplier: f64,
    /// Features below this confidence are dropped
    pub confidence_threshold: f64,
    /// Normal dot product above which faces join a surface
    pub surface_grouping_tolerance: f64,
    /// Halve the minimum feature size
    pub detect_small_features: bool,
    /// Merge nested features into compounds
    pub detect_compound_features: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::for_mode(AnalysisMode::Balanced)
    }
}

impl AnalysisConfig {
    pub fn for_mode(mode: AnalysisMode) -> Self {
        Self {
            feature_size_multiplier: 1.0,
            confidence_threshold: mode.confidence_threshold(),
            surface_grouping_tolerance: 0.9,
            detect_small_features: mode == AnalysisMode::Thorough,
            detect_compound_features: true,
        }
    }

    /// Apply a mode's threshold and small-feature preset, keeping other fields
    pub fn with_mode(mut self, mode: AnalysisMode) -> Self {
        self.confidence_threshold = mode.confidence_threshold();
        self.detect_small_features = mode == AnalysisMode::Thorough;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.feature_size_multiplier = multiplier;
        self
    }

    pub fn with_grouping_tolerance(mut self, tolerance: f64) -> Self {
        self.surface_grouping_tolerance = tolerance;
        self
    }

    pub fn with_small_features(mut self, enabled: bool) -> Self {
        self.detect_small_features = enabled;
        self
    }

    pub fn with_compound_features(mut self, enabled: bool) -> Self {
        self.detect_compound_features = enabled;
        self
    }

    /// Minimum feature size in mm
    pub fn min_feature_size(&self) -> f64 {
        let base = if self.detect_small_features {
            MIN_SMALL_FEATURE_SIZE
        } else {
            MIN_FEATURE_SIZE
        };
        base * self.feature_size_multiplier
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.feature_size_multiplier.is_finite() || self.feature_size_multiplier <= 0.0 {
            return Err(ConfigError::InvalidMultiplier(self.feature_size_multiplier));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.confidence_threshold));
        }
        if !(0.5..=0.95).contains(&self.surface_grouping_tolerance) {
            return Err(ConfigError::ToleranceOutOfRange(self.surface_grouping_tolerance));
        }
        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: AnalysisConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    ///
    /// Reads `path` when given, else `polyframe-features.toml` if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if PathBuf::from(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };

        if let Ok(mode) = std::env::var("POLYFRAME_FEATURES_MODE") {
            match mode.parse::<AnalysisMode>() {
                Ok(mode) => config = config.with_mode(mode),
                Err(err) => warn!(value = %mode, "ignoring POLYFRAME_FEATURES_MODE: {err}"),
            }
        }

        if let Ok(threshold) = std::env::var("POLYFRAME_FEATURES_THRESHOLD") {
            match threshold.parse::<f64>() {
                Ok(value) if (0.0..=1.0).contains(&value) => config.confidence_threshold = value,
                _ => warn!(value = %threshold, "ignoring POLYFRAME_FEATURES_THRESHOLD"),
            }
        }

        if let Ok(small) = std::env::var("POLYFRAME_FEATURES_SMALL") {
            match small.parse::<bool>() {
                Ok(value) => config.detect_small_features = value,
                Err(_) => warn!(value = %small, "ignoring POLYFRAME_FEATURES_SMALL"),
            }
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_presets() {
        assert_eq!(AnalysisConfig::default().confidence_threshold, 0.6);
        assert_eq!(AnalysisConfig::for_mode(AnalysisMode::Fast).confidence_threshold, 0.7);

        let thorough = AnalysisConfig::for_mode(AnalysisMode::Thorough);
        assert_eq!(thorough.confidence_threshold, 0.4);
        assert!(thorough.detect_small_features);
        assert_eq!(thorough.min_feature_size(), 0.5);
    }

    #[test]
    fn test_min_feature_size_scales() {
        let config = AnalysisConfig::default().with_multiplier(2.5);
        assert_eq!(config.min_feature_size(), 2.5);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(AnalysisConfig::default().validate().is_ok());
        assert_eq!(
            AnalysisConfig::default().with_multiplier(0.0).validate(),
            Err(ConfigError::InvalidMultiplier(0.0))
        );
        assert_eq!(
            AnalysisConfig::default().with_threshold(1.5).validate(),
            Err(ConfigError::ThresholdOutOfRange(1.5))
        );
        assert_eq!(
            AnalysisConfig::default().with_grouping_tolerance(0.3).validate(),
            Err(ConfigError::ToleranceOutOfRange(0.3))
        );
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("Thorough".parse::<AnalysisMode>(), Ok(AnalysisMode::Thorough));
        assert!("exhaustive".parse::<AnalysisMode>().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AnalysisConfig = toml::from_str("confidence_threshold = 0.5").unwrap();
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.surface_grouping_tolerance, 0.9);
        assert!(config.detect_compound_features);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.toml");
        let config = AnalysisConfig::for_mode(AnalysisMode::Fast).with_compound_features(false);
        config.save(&path).unwrap();
        assert_eq!(AnalysisConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "feature_size_multiplier = -1.0\n").unwrap();
        assert!(AnalysisConfig::from_file(&path).is_err());
    }
}
