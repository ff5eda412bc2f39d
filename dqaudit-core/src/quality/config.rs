//! Analysis configuration.
//!
//! This module provides configuration for a table audit: sampling, type
//! profiling, top-duplicate extraction and the status thresholds used when
//! rendering summaries.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DqAuditError, Result};
use crate::profile::ProfileConfig;
use crate::sampling::SamplingConfig;

use super::uniqueness::DEFAULT_TOP_DUPLICATES;

/// Status of a rate against the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// At or above `good_min`
    Ok,
    /// At or above `warning_min`
    Warn,
    /// Below `warning_min`
    Fail,
}

impl Status {
    /// Short label used in summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warn => "WARN",
            Status::Fail => "FAIL",
        }
    }
}

/// Rate thresholds, in percent, separating OK, WARN and FAIL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusThresholds {
    /// Minimum rate reported as OK
    pub good_min: f64,
    /// Minimum rate reported as WARN
    pub warning_min: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            good_min: 95.0,
            warning_min: 80.0,
        }
    }
}

impl StatusThresholds {
    /// Classifies a rate.
    pub fn status(&self, rate: f64) -> Status {
        if rate >= self.good_min {
            Status::Ok
        } else if rate >= self.warning_min {
            Status::Warn
        } else {
            Status::Fail
        }
    }

    /// Builder method to set the OK threshold.
    pub fn with_good_min(mut self, threshold: f64) -> Self {
        self.good_min = clamp_percent("good_min", threshold);
        self
    }

    /// Builder method to set the WARN threshold.
    pub fn with_warning_min(mut self, threshold: f64) -> Self {
        self.warning_min = clamp_percent("warning_min", threshold);
        self
    }

    /// Validates the thresholds.
    ///
    /// # Errors
    /// Returns `Configuration` when a threshold is outside `[0, 100]` or
    /// `warning_min` exceeds `good_min`.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("good_min", self.good_min), ("warning_min", self.warning_min)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(DqAuditError::configuration(format!(
                    "{} must be between 0 and 100, got {}",
                    name, value
                )));
            }
        }
        if self.warning_min > self.good_min {
            return Err(DqAuditError::configuration(format!(
                "warning_min ({}) must not exceed good_min ({})",
                self.warning_min, self.good_min
            )));
        }
        Ok(())
    }
}

fn clamp_percent(name: &str, threshold: f64) -> f64 {
    if !(0.0..=100.0).contains(&threshold) {
        tracing::warn!("{} {} clamped to valid range [0, 100]", name, threshold);
    }
    threshold.clamp(0.0, 100.0)
}

/// Settings of one table audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Row sampling policy
    pub sampling: SamplingConfig,
    /// Type resolution settings
    pub profiling: ProfileConfig,
    /// Maximum number of top duplicates reported per column
    pub top_duplicates: usize,
    /// Compute completeness and uniqueness in the source when sampling
    pub source_side_aggregation: bool,
    /// Summary status thresholds
    pub thresholds: StatusThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            profiling: ProfileConfig::default(),
            top_duplicates: DEFAULT_TOP_DUPLICATES,
            source_side_aggregation: true,
            thresholds: StatusThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Creates a new analysis config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON file. Absent fields keep defaults.
    ///
    /// # Errors
    /// `Io` when the file cannot be read, `Serialization` when it is not
    /// valid JSON, `Configuration` when the values are out of range.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DqAuditError::io(format!("Failed to read config file {}", path.display()), e)
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            DqAuditError::serialization(
                format!("Failed to parse config file {}", path.display()),
                e,
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Builder method to set the sampling policy.
    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    /// Builder method to set type resolution settings.
    pub fn with_profiling(mut self, profiling: ProfileConfig) -> Self {
        self.profiling = profiling;
        self
    }

    /// Builder method to set how many top duplicates are kept.
    pub fn with_top_duplicates(mut self, top_duplicates: usize) -> Self {
        if top_duplicates == 0 {
            tracing::warn!("top_duplicates 0 raised to 1");
        }
        self.top_duplicates = top_duplicates.max(1);
        self
    }

    /// Builder method to enable/disable source-side aggregation.
    pub fn with_source_side_aggregation(mut self, enabled: bool) -> Self {
        self.source_side_aggregation = enabled;
        self
    }

    /// Builder method to set the summary thresholds.
    pub fn with_thresholds(mut self, thresholds: StatusThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `Configuration` describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.sampling.validate()?;
        if self.top_duplicates == 0 {
            return Err(DqAuditError::configuration(
                "top_duplicates must be greater than 0",
            ));
        }
        self.thresholds.validate()
    }
}
