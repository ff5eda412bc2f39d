//! Command-line arguments and their translation into an analysis setup.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, ValueEnum};
use dqaudit_core::logging::LogFormat;
use dqaudit_core::{AnalysisConfig, RuleSet, SamplingMethod};

/// Percentage used when `--strategy percentage` is given without `--percent`.
pub const DEFAULT_PERCENT: f64 = 10.0;

#[derive(Parser, Debug)]
#[command(name = "dqaudit")]
#[command(about = "Data quality audit for SQL tables")]
#[command(version)]
#[command(long_about = "
dqaudit - Completeness, validity and uniqueness audit for one table

The table is profiled column by column and every column gets three checks:
- Completeness: how many values are missing
- Validity: how many present values satisfy a type-specific rule
- Uniqueness: how many distinct values exist and which repeat most

Large tables are sampled. Per-column failures are recorded in the report
instead of aborting the run.

RULES FILE (JSON):
  {
    \"email\":  {\"type\": \"string\", \"max_length\": 120, \"pattern\": \"[^@]+@[^@]+\"},
    \"amount\": {\"type\": \"numeric\", \"min_value\": 0},
    \"born\":   {\"type\": \"datetime\"},
    \"active\": {\"type\": \"boolean\"}
  }

EXAMPLES:
  dqaudit --table customers sqlite:///data/shop.db
  dqaudit --table orders --rules rules.json --format summary shop.sqlite
  dqaudit --table events --sample-size 10000 --strategy percentage --percent 5 shop.db
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Database connection URL
    #[arg(
        env = "DATABASE_URL",
        help = "Database connection string (credentials will be sanitized in logs)"
    )]
    pub database_url: String,

    /// Table to audit
    #[arg(short, long, help = "Name of the table to audit")]
    pub table: String,

    /// Rules file
    #[arg(long, value_name = "FILE", help = "JSON file mapping columns to validation rules")]
    pub rules: Option<PathBuf>,

    /// Analysis configuration file
    #[arg(long, value_name = "FILE", help = "JSON analysis configuration")]
    pub config: Option<PathBuf>,

    /// Sample size override
    #[arg(long, value_name = "ROWS", help = "Rows examined when the table is sampled")]
    pub sample_size: Option<u64>,

    /// Full-scan threshold override
    #[arg(
        long,
        value_name = "ROWS",
        help = "Local tables up to this many rows are scanned in full"
    )]
    pub full_scan_threshold: Option<u64>,

    /// Sampling strategy override
    #[arg(long, value_enum, help = "Row selection method for sampled tables")]
    pub strategy: Option<Strategy>,

    /// Percentage for percentage sampling
    #[arg(long, help = "Percentage of rows for --strategy percentage (0, 100]")]
    pub percent: Option<f64>,

    /// Random seed
    #[arg(long, help = "Seed for reproducible random samples")]
    pub seed: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json, help = "Report format")]
    pub format: OutputFormat,

    /// Output file path
    #[arg(short, long, help = "Write the report to this file instead of stdout")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all log output except errors")]
    pub quiet: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormatArg::Text, help = "Log line format")]
    pub log_format: LogFormatArg,
}

/// Sampling strategy names accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Limit,
    Random,
    Percentage,
}

/// Report formats.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON report
    Json,
    /// Human-readable summary with status markers
    Summary,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl Cli {
    /// Builds the analysis configuration from `--config` plus flag overrides.
    ///
    /// # Errors
    /// Fails when the config file cannot be read, when `--percent` conflicts
    /// with the chosen strategy, or when the result does not validate.
    pub fn analysis_config(&self) -> anyhow::Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => AnalysisConfig::default(),
        };

        let mut sampling = config.sampling.clone();
        if let Some(rows) = self.sample_size {
            sampling = sampling.with_sample_size(rows);
        }
        if let Some(rows) = self.full_scan_threshold {
            sampling = sampling.with_full_scan_threshold(rows);
        }
        if let Some(seed) = self.seed {
            sampling = sampling.with_seed(seed);
        }
        if let Some(method) = self.sampling_method(sampling.method)? {
            sampling = sampling.with_method(method);
        }
        config = config.with_sampling(sampling);

        config.validate().context("Invalid analysis configuration")?;
        Ok(config)
    }

    /// Resolves `--strategy` and `--percent` against the configured method.
    ///
    /// Returns `None` when neither flag is given.
    pub fn sampling_method(&self, current: SamplingMethod) -> anyhow::Result<Option<SamplingMethod>> {
        let method = match (self.strategy, self.percent) {
            (None, None) => None,
            (None | Some(Strategy::Percentage), Some(percent)) => {
                Some(SamplingMethod::Percentage { percent })
            }
            (Some(Strategy::Percentage), None) => match current {
                SamplingMethod::Percentage { .. } => Some(current),
                _ => Some(SamplingMethod::Percentage {
                    percent: DEFAULT_PERCENT,
                }),
            },
            (Some(Strategy::Limit), None) => Some(SamplingMethod::Limit),
            (Some(Strategy::Random), None) => Some(SamplingMethod::Random),
            (Some(strategy), Some(_)) => {
                bail!("--percent only applies to --strategy percentage, not {:?}", strategy)
            }
        };
        Ok(method)
    }

    /// Loads the rules file, or an empty rule set when none is given.
    pub fn rule_set(&self) -> anyhow::Result<RuleSet> {
        match &self.rules {
            Some(path) => RuleSet::from_json_file(path)
                .with_context(|| format!("Failed to load rules from {}", path.display())),
            None => Ok(RuleSet::new()),
        }
    }
}
