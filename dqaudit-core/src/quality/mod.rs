//! Data quality assessment module.
//!
//! This module provides the three quality dimensions and the analyzer that
//! combines them:
//! - **Completeness**: missing-value accounting
//! - **Validity**: type-specific rule evaluation over present values
//! - **Uniqueness**: distinct counting and top-duplicate extraction
//!
//! Every check returns a [`ColumnResult`]; the [`Analyzer`] runs the checks
//! for every column of a [`TabularSource`](crate::adapters::TabularSource)
//! and assembles a [`TableReport`].
//!
//! # Example
//! ```rust,ignore
//! use dqaudit_core::quality::{check_completeness, check_uniqueness};
//! use dqaudit_core::models::Column;
//!
//! let column = Column::new("code", vec!["A", "A", "B", "C"]);
//! let completeness = check_completeness(&column);
//! let uniqueness = check_uniqueness(&column)?;
//! assert_eq!(uniqueness.rate(), Some(75.0));
//! ```

mod analyzer;
mod completeness;
mod config;
mod models;
mod report;
mod uniqueness;
mod validity;

// Re-export public API
pub use analyzer::{Analyzer, analyze};
pub use completeness::{check_completeness, completeness_from_counts, completeness_from_mask};
pub use config::{AnalysisConfig, Status, StatusThresholds};
pub use models::{
    ColumnResult, ISSUE_ALL_MISSING, ISSUE_DUPLICATES, ISSUE_MISSING_VALUES, Metrics,
    TopDuplicates, rate, round2,
};
pub use report::{ColumnReport, ReportAggregator, ReportSummary, TableInfo, TableReport};
pub use uniqueness::{
    DEFAULT_TOP_DUPLICATES, check_uniqueness, check_uniqueness_with, uniqueness_from_groups,
    uniqueness_from_summary,
};
pub use validity::{check_validity, check_validity_default, check_validity_with};
