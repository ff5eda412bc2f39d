//! Row sampling policy.
//!
//! [`SamplePlan::decide`] chooses between a full scan and a sample from the
//! source's locality and row count. Sources that sample in process use
//! [`sample_indices`] so that every column of one analysis shares the same
//! row set.

use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::adapters::Locality;
use crate::error::{DqAuditError, Result};

/// How rows are selected when a table is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum SamplingMethod {
    /// First rows in physical order; cheapest, biased toward old rows
    Limit,
    /// Uniform random rows
    #[default]
    Random,
    /// Server-side bounded percentage of rows, capped at the sample size
    Percentage { percent: f64 },
}

impl SamplingMethod {
    /// Short name used in logs and summaries.
    pub fn name(&self) -> &'static str {
        match self {
            SamplingMethod::Limit => "limit",
            SamplingMethod::Random => "random",
            SamplingMethod::Percentage { .. } => "percentage",
        }
    }
}

impl fmt::Display for SamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingMethod::Percentage { percent } => write!(f, "percentage ({}%)", percent),
            other => f.write_str(other.name()),
        }
    }
}

/// Sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Local tables up to this many rows are always scanned in full
    pub full_scan_threshold: u64,
    /// Rows examined when a table is sampled
    pub sample_size: u64,
    /// Row selection method
    pub method: SamplingMethod,
    /// Seed for reproducible random samples
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            full_scan_threshold: 1_000_000,
            sample_size: 50_000,
            method: SamplingMethod::Random,
            seed: None,
        }
    }
}

impl SamplingConfig {
    /// Creates a new sampling config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the local full-scan threshold.
    pub fn with_full_scan_threshold(mut self, rows: u64) -> Self {
        self.full_scan_threshold = rows;
        self
    }

    /// Builder method to set the sample size.
    pub fn with_sample_size(mut self, rows: u64) -> Self {
        self.sample_size = rows;
        self
    }

    /// Builder method to set the row selection method.
    pub fn with_method(mut self, method: SamplingMethod) -> Self {
        self.method = method;
        self
    }

    /// Builder method to fix the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `Configuration` for a zero sample size or a percentage
    /// outside `(0, 100]`.
    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            return Err(DqAuditError::configuration("sample_size must be greater than 0"));
        }
        if let SamplingMethod::Percentage { percent } = self.method
            && !(percent > 0.0 && percent <= 100.0)
        {
            return Err(DqAuditError::configuration(format!(
                "percent must be in (0, 100], got {}",
                percent
            )));
        }
        Ok(())
    }
}

/// A request for a sample of rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRequest {
    /// Maximum number of rows returned
    pub size: u64,
    /// Row selection method
    pub method: SamplingMethod,
    /// Seed for reproducible random samples
    pub seed: Option<u64>,
}

impl SampleRequest {
    /// Builder method to replace the selection method.
    pub fn with_method(mut self, method: SamplingMethod) -> Self {
        self.method = method;
        self
    }
}

/// Outcome of the sampling decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplePlan {
    /// Examine every row
    Full,
    /// Examine a sample
    Sample(SampleRequest),
}

impl SamplePlan {
    /// Decides how many rows to examine.
    ///
    /// Local tables up to `full_scan_threshold` rows and any table up to
    /// `sample_size` rows are scanned in full.
    pub fn decide(locality: Locality, row_count: u64, config: &SamplingConfig) -> Self {
        let local_full = locality == Locality::Local && row_count <= config.full_scan_threshold;
        if local_full || row_count <= config.sample_size {
            tracing::debug!(
                "Full scan of {} rows ({:?} source, sample size {})",
                row_count,
                locality,
                config.sample_size
            );
            return SamplePlan::Full;
        }

        tracing::debug!(
            "Sampling {} of {} rows using {} ({:?} source)",
            config.sample_size,
            row_count,
            config.method,
            locality
        );
        SamplePlan::Sample(SampleRequest {
            size: config.sample_size,
            method: config.method,
            seed: config.seed,
        })
    }

    /// True when only part of the table is examined.
    pub fn is_sampled(&self) -> bool {
        matches!(self, SamplePlan::Sample(_))
    }
}

/// Picks row positions for an in-process sample, in ascending order.
///
/// `Limit` takes the first rows. `Random` (and `Percentage`, which has no
/// in-process form) takes a uniform index sample, seeded when requested.
pub fn sample_indices(row_count: usize, request: &SampleRequest) -> Vec<usize> {
    let size = usize::try_from(request.size).unwrap_or(usize::MAX).min(row_count);
    match request.method {
        SamplingMethod::Limit => (0..size).collect(),
        SamplingMethod::Random | SamplingMethod::Percentage { .. } => {
            let mut rng = match request.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let mut indices = rand::seq::index::sample(&mut rng, row_count, size).into_vec();
            indices.sort_unstable();
            indices
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_config_default() {
        let config = SamplingConfig::default();
        assert_eq!(config.full_scan_threshold, 1_000_000);
        assert_eq!(config.sample_size, 50_000);
        assert_eq!(config.method, SamplingMethod::Random);
        assert_eq!(config.seed, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sampling_config_builder() {
        let config = SamplingConfig::new()
            .with_full_scan_threshold(10)
            .with_sample_size(5)
            .with_method(SamplingMethod::Limit)
            .with_seed(42);

        assert_eq!(config.full_scan_threshold, 10);
        assert_eq!(config.sample_size, 5);
        assert_eq!(config.method, SamplingMethod::Limit);
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn test_sampling_config_validation() {
        assert!(SamplingConfig::new().with_sample_size(0).validate().is_err());
        for percent in [0.0, -5.0, 100.5, f64::NAN] {
            let config = SamplingConfig::new().with_method(SamplingMethod::Percentage { percent });
            assert!(config.validate().is_err(), "percent {} accepted", percent);
        }
        let config = SamplingConfig::new().with_method(SamplingMethod::Percentage { percent: 100.0 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_plan_local_under_threshold_is_full() {
        let config = SamplingConfig::default();
        assert_eq!(
            SamplePlan::decide(Locality::Local, 1_000_000, &config),
            SamplePlan::Full
        );
        assert!(SamplePlan::decide(Locality::Local, 1_000_001, &config).is_sampled());
    }

    #[test]
    fn test_plan_remote_samples_above_sample_size() {
        let config = SamplingConfig::default().with_seed(7);
        assert_eq!(
            SamplePlan::decide(Locality::Remote, 50_000, &config),
            SamplePlan::Full
        );
        assert_eq!(
            SamplePlan::decide(Locality::Remote, 50_001, &config),
            SamplePlan::Sample(SampleRequest {
                size: 50_000,
                method: SamplingMethod::Random,
                seed: Some(7),
            })
        );
    }

    #[test]
    fn test_limit_indices() {
        let request = SampleRequest {
            size: 3,
            method: SamplingMethod::Limit,
            seed: None,
        };
        assert_eq!(sample_indices(10, &request), vec![0, 1, 2]);
        assert_eq!(sample_indices(2, &request), vec![0, 1]);
    }

    #[test]
    fn test_random_indices_seeded() {
        let request = SampleRequest {
            size: 5,
            method: SamplingMethod::Random,
            seed: Some(42),
        };
        let first = sample_indices(100, &request);
        let second = sample_indices(100, &request);

        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert!(first.windows(2).all(|w| w[0] < w[1]));
        assert!(first.iter().all(|&i| i < 100));
    }

    #[test]
    fn test_method_serde() {
        let json = serde_json::to_string(&SamplingMethod::Percentage { percent: 10.0 }).unwrap();
        assert_eq!(json, r#"{"method":"percentage","percent":10.0}"#);
        let method: SamplingMethod = serde_json::from_str(r#"{"method":"limit"}"#).unwrap();
        assert_eq!(method, SamplingMethod::Limit);
    }
}
