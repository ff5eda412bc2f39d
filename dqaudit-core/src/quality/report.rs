//! Table-level report assembly and rendering.
//!
//! [`ReportAggregator`] collects the per-column results of one analysis and
//! derives the table summary from them without recomputing any child result.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DqAuditError, Result};
use crate::profile::SemanticType;
use crate::sampling::SamplingMethod;

use super::config::StatusThresholds;
use super::models::{ColumnResult, Metrics, round2};

/// Identity and scope of an audited table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name
    pub name: String,
    /// Rows in the table
    pub row_count: u64,
    /// Rows the checks actually looked at
    pub rows_examined: u64,
    /// Columns in the report
    pub column_count: usize,
    /// True when only a sample of rows was examined
    pub sampled: bool,
    /// Sampling method actually used, if sampled
    pub sampling_strategy: Option<SamplingMethod>,
    /// When the analysis ran
    pub analyzed_at: DateTime<Utc>,
}

/// Mean rates over the columns whose checks succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub completeness_rate: f64,
    pub validity_rate: f64,
    pub uniqueness_rate: f64,
    /// Number of checks that could not run
    pub failed_checks: u64,
}

/// Results of the three checks for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnReport {
    /// Resolved type; absent when resolution failed
    pub semantic_type: Option<SemanticType>,
    pub completeness: ColumnResult,
    pub validity: ColumnResult,
    pub uniqueness: ColumnResult,
}

impl ColumnReport {
    fn results(&self) -> [&ColumnResult; 3] {
        [&self.completeness, &self.validity, &self.uniqueness]
    }
}

/// Audit report of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: TableInfo,
    pub summary: ReportSummary,
    /// Per-column results keyed by column name
    pub columns: BTreeMap<String, ColumnReport>,
}

impl TableReport {
    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns `Serialization` if encoding fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DqAuditError::serialization("Failed to serialize report", e))
    }

    /// Writes the JSON snapshot to `path`.
    ///
    /// # Errors
    /// `Serialization` if encoding fails, `Io` if the file cannot be written.
    pub async fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json_pretty()?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| DqAuditError::io(format!("Failed to write to {}", path.display()), e))?;
        tracing::info!("Report written to {}", path.display());
        Ok(())
    }

    /// Renders a human-readable summary.
    pub fn render_summary(&self, thresholds: &StatusThresholds) -> String {
        SummaryView {
            report: self,
            thresholds,
        }
        .to_string()
    }
}

/// Collects column results into a [`TableReport`].
#[derive(Debug)]
pub struct ReportAggregator {
    table: TableInfo,
    columns: BTreeMap<String, ColumnReport>,
}

impl ReportAggregator {
    /// Starts a report for the given table.
    pub fn new(table: TableInfo) -> Self {
        Self {
            table,
            columns: BTreeMap::new(),
        }
    }

    /// Adds the results of one column. A repeated name replaces the earlier
    /// entry.
    pub fn add_column(&mut self, name: impl Into<String>, report: ColumnReport) {
        let name = name.into();
        if self.columns.insert(name.clone(), report).is_some() {
            tracing::warn!("Column '{}' reported twice; keeping the last result", name);
        }
    }

    /// Assembles the report.
    pub fn finish(self) -> TableReport {
        let summary = summarize(&self.columns);
        let mut table = self.table;
        table.column_count = self.columns.len();
        TableReport {
            table,
            summary,
            columns: self.columns,
        }
    }
}

fn summarize(columns: &BTreeMap<String, ColumnReport>) -> ReportSummary {
    let failed_checks = columns
        .values()
        .flat_map(|c| c.results())
        .filter(|r| r.is_failed())
        .count() as u64;

    ReportSummary {
        completeness_rate: mean_rate(columns.values().map(|c| &c.completeness)),
        validity_rate: mean_rate(columns.values().map(|c| &c.validity)),
        uniqueness_rate: mean_rate(columns.values().map(|c| &c.uniqueness)),
        failed_checks,
    }
}

fn mean_rate<'a>(results: impl Iterator<Item = &'a ColumnResult>) -> f64 {
    let rates: Vec<f64> = results.filter_map(ColumnResult::rate).collect();
    if rates.is_empty() {
        return 0.0;
    }
    round2(rates.iter().sum::<f64>() / rates.len() as f64)
}

/// Text rendering of a report.
struct SummaryView<'a> {
    report: &'a TableReport,
    thresholds: &'a StatusThresholds,
}

impl SummaryView<'_> {
    fn status_line(
        &self,
        f: &mut fmt::Formatter<'_>,
        column: &str,
        result: &ColumnResult,
        noun: &str,
    ) -> fmt::Result {
        match result.rate() {
            Some(rate) => writeln!(
                f,
                "[{:<4}] {}: {:.1}% {}",
                self.thresholds.status(rate).label(),
                column,
                rate,
                noun
            ),
            None => {
                let kind = result.error_kind().map_or("unknown error", |k| k.as_str());
                writeln!(f, "[{:<4}] {}: check failed ({})", "FAIL", column, kind)
            }
        }
    }
}

impl fmt::Display for SummaryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = &self.report.table;
        let summary = &self.report.summary;

        writeln!(f, "DATA QUALITY REPORT")?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "Table: {}", info.name)?;
        writeln!(f, "Rows: {} ({} examined)", info.row_count, info.rows_examined)?;
        writeln!(f, "Columns: {}", info.column_count)?;
        writeln!(f, "Analysis Time: {}", info.analyzed_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        match info.sampling_strategy {
            Some(method) if info.sampled => writeln!(f, "Sampling: {}", method)?,
            _ => writeln!(f, "Sampling: none")?,
        }
        writeln!(
            f,
            "Overall: {:.2}% complete, {:.2}% valid, {:.2}% unique, {} failed checks",
            summary.completeness_rate,
            summary.validity_rate,
            summary.uniqueness_rate,
            summary.failed_checks
        )?;

        writeln!(f)?;
        writeln!(f, "COMPLETENESS SUMMARY")?;
        writeln!(f, "{}", "-".repeat(30))?;
        for (name, column) in &self.report.columns {
            self.status_line(f, name, &column.completeness, "complete")?;
        }

        writeln!(f)?;
        writeln!(f, "VALIDITY SUMMARY")?;
        writeln!(f, "{}", "-".repeat(30))?;
        for (name, column) in &self.report.columns {
            self.status_line(f, name, &column.validity, "valid")?;
            for issue in &column.validity.issues {
                writeln!(f, "    - {}", issue)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "UNIQUENESS SUMMARY")?;
        writeln!(f, "{}", "-".repeat(30))?;
        for (name, column) in &self.report.columns {
            self.status_line(f, name, &column.uniqueness, "unique")?;
            if let Metrics::Uniqueness {
                duplicate_count, ..
            } = &column.uniqueness.metrics
                && *duplicate_count > 0
            {
                writeln!(f, "    {} duplicates found", duplicate_count)?;
            }
        }

        if info.sampled {
            writeln!(f)?;
            writeln!(
                f,
                "Note: figures marked as estimates were computed on a sample of {} rows.",
                info.rows_examined
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::quality::models::TopDuplicates;
    use chrono::TimeZone;

    fn info(sampled: bool) -> TableInfo {
        TableInfo {
            name: "users".to_string(),
            row_count: 4,
            rows_examined: 4,
            column_count: 0,
            sampled,
            sampling_strategy: sampled.then_some(SamplingMethod::Random),
            analyzed_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    fn column(missing: u64, invalid: u64, unique: u64) -> ColumnReport {
        let present = 4 - missing;
        ColumnReport {
            semantic_type: Some(SemanticType::String),
            completeness: ColumnResult::completeness(4, missing),
            validity: ColumnResult::validity(
                4,
                missing,
                present - invalid,
                invalid,
                if invalid > 0 { vec!["Length > 255".to_string()] } else { Vec::new() },
            ),
            uniqueness: ColumnResult::uniqueness(
                present,
                missing,
                unique,
                TopDuplicates::default(),
            ),
        }
    }

    #[test]
    fn test_aggregator_summary() {
        let mut aggregator = ReportAggregator::new(info(false));
        aggregator.add_column("b", column(0, 0, 4));
        aggregator.add_column("a", column(2, 1, 1));
        let report = aggregator.finish();

        assert_eq!(report.table.column_count, 2);
        assert_eq!(
            report.columns.keys().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        // a: 50% complete, 50% valid, 50% unique; b: 100% each
        assert_eq!(report.summary.completeness_rate, 75.0);
        assert_eq!(report.summary.validity_rate, 75.0);
        assert_eq!(report.summary.uniqueness_rate, 75.0);
        assert_eq!(report.summary.failed_checks, 0);
    }

    #[test]
    fn test_failed_checks_excluded_from_means() {
        let mut failed = column(0, 0, 4);
        failed.validity = ColumnResult::failed(&DqAuditError::invalid_rule("min > max"));
        let mut aggregator = ReportAggregator::new(info(false));
        aggregator.add_column("a", failed);
        aggregator.add_column("b", column(0, 2, 4));
        let report = aggregator.finish();

        assert_eq!(report.summary.validity_rate, 50.0);
        assert_eq!(report.summary.failed_checks, 1);
        assert_eq!(
            report.columns["a"].validity.error_kind(),
            Some(ErrorKind::InvalidRule)
        );
    }

    #[test]
    fn test_empty_report() {
        let report = ReportAggregator::new(info(false)).finish();
        assert_eq!(report.summary.completeness_rate, 0.0);
        assert!(report.columns.is_empty());
    }

    #[test]
    fn test_report_json_shape() {
        let mut aggregator = ReportAggregator::new(info(true));
        aggregator.add_column("email", column(1, 0, 3));
        let report = aggregator.finish();
        let json: serde_json::Value =
            serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();

        assert_eq!(json["table"]["name"], "users");
        assert_eq!(json["table"]["sampled"], true);
        assert_eq!(json["table"]["sampling_strategy"]["method"], "random");
        assert_eq!(json["table"]["analyzed_at"], "2026-01-02T03:04:05Z");
        assert_eq!(json["columns"]["email"]["semantic_type"], "string");
        assert_eq!(json["columns"]["email"]["completeness"]["completeness_rate"], 75.0);
        assert_eq!(json["summary"]["failed_checks"], 0);
    }

    #[test]
    fn test_render_summary() {
        let mut aggregator = ReportAggregator::new(info(true));
        aggregator.add_column("email", column(1, 1, 1));
        let mut failed = column(0, 0, 4);
        failed.uniqueness = ColumnResult::failed(&DqAuditError::column_not_found("ghost"));
        aggregator.add_column("ghost", failed);
        let text = aggregator.finish().render_summary(&StatusThresholds::default());

        assert!(text.starts_with("DATA QUALITY REPORT\n"));
        assert!(text.contains("Table: users"));
        assert!(text.contains("Sampling: random"));
        assert!(text.contains("[FAIL] email: 75.0% complete"));
        assert!(text.contains("[FAIL] email: 66.7% valid"));
        assert!(text.contains("    - Length > 255"));
        assert!(text.contains("[OK  ] ghost: 100.0% valid"));
        assert!(text.contains("ghost: check failed (ColumnNotFoundError)"));
        assert!(text.contains("2 duplicates found"));
        assert!(text.contains("computed on a sample of 4 rows"));
    }

    #[tokio::test]
    async fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = ReportAggregator::new(info(false)).finish();
        report.write_json(&path).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, report.to_json_pretty().unwrap());
    }
}
