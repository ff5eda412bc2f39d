//! Core validation engine for dqaudit.
//!
//! This crate audits tabular data along three quality dimensions
//! (completeness, validity and uniqueness) and produces a structured
//! [`TableReport`]. Tables are read through the [`TabularSource`] trait, so
//! the engine works the same over in-memory data and SQL tables.
//!
//! # Security Guarantees
//! - All source operations are read-only
//! - Connection strings are redacted before they reach logs or errors
//! - No process-wide mutable state; configuration is passed in
//!
//! # Architecture
//! - `profile`: semantic type resolution of columns
//! - `rules`: type-specific validation rules and verdicts
//! - `quality`: the three checks, the analyzer and report assembly
//! - `sampling`: full-scan versus sample decisions
//! - `adapters`: the source trait plus memory and SQLite sources
//!
//! # Example
//! ```rust,ignore
//! use dqaudit_core::{MemorySource, RuleSet, SamplingConfig, analyze};
//!
//! let report = analyze(&source, &RuleSet::new(), &SamplingConfig::default()).await?;
//! println!("{}", report.to_json_pretty()?);
//! ```

pub mod adapters;
pub mod error;
pub mod logging;
pub mod models;
pub mod profile;
pub mod quality;
pub mod rules;
pub mod sampling;

// Re-export commonly used types
pub use adapters::{
    CountPredicate, DistinctSummary, Locality, MemorySource, SourceCapability, TabularSource,
    open_source,
};
#[cfg(feature = "sqlite")]
pub use adapters::SqliteSource;
pub use error::{DqAuditError, ErrorKind, Result};
pub use models::{Column, MissingMask, Number, Value};
pub use profile::{ProfileConfig, SemanticType, TypeProfiler};
pub use quality::{
    AnalysisConfig, Analyzer, ColumnReport, ColumnResult, Metrics, StatusThresholds, TableReport,
    analyze, check_completeness, check_uniqueness, check_validity,
};
pub use rules::{
    BooleanRule, DateTimeRule, NumericRule, RuleSet, StringRule, ValidationRule, Verdict,
};
pub use sampling::{SamplingConfig, SamplingMethod};
