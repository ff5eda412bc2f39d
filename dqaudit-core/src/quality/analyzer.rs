//! Table analyzer facade.
//!
//! This module provides the [`Analyzer`] that plans row sampling, runs the
//! completeness, validity and uniqueness checks for every column of a source
//! concurrently, and assembles the [`TableReport`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::adapters::{CountPredicate, Locality, SourceCapability, TabularSource};
use crate::error::{DqAuditError, Result};
use crate::models::Column;
use crate::profile::{SemanticType, TypeProfiler};
use crate::rules::{RuleSet, ValidationRule};
use crate::sampling::{SamplePlan, SampleRequest, SamplingConfig, SamplingMethod};

use super::completeness::{completeness_from_counts, completeness_from_mask};
use super::config::AnalysisConfig;
use super::models::ColumnResult;
use super::report::{ColumnReport, ReportAggregator, TableInfo, TableReport};
use super::uniqueness::{
    check_uniqueness_with, uniqueness_from_groups, uniqueness_from_summary,
};
use super::validity::check_validity_with;

/// Audits tables along the completeness, validity and uniqueness dimensions.
///
/// # Example
///
/// ```rust,ignore
/// use dqaudit_core::quality::{AnalysisConfig, Analyzer};
/// use dqaudit_core::rules::RuleSet;
///
/// let analyzer = Analyzer::new(AnalysisConfig::default());
/// let report = analyzer.analyze(&source, &RuleSet::new()).await?;
/// println!("{}", report.to_json_pretty()?);
/// ```
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
    profiler: TypeProfiler,
}

/// How the rows of one analysis are obtained.
struct RunContext<'a> {
    source: &'a dyn TabularSource,
    rules: &'a RuleSet,
    row_count: u64,
    sampled: bool,
    aggregate_in_source: bool,
}

impl Analyzer {
    /// Creates a new analyzer with the given configuration.
    pub fn new(config: AnalysisConfig) -> Self {
        let profiler = TypeProfiler::new(config.profiling.clone());
        Self { config, profiler }
    }

    /// Creates a new analyzer with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(AnalysisConfig::default())
    }

    /// Returns a reference to the analyzer configuration.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyzes every column of `source`, stamping the report with the
    /// current time.
    ///
    /// # Errors
    /// See [`Analyzer::analyze_at`].
    pub async fn analyze(&self, source: &dyn TabularSource, rules: &RuleSet) -> Result<TableReport> {
        self.analyze_at(source, rules, Utc::now()).await
    }

    /// Analyzes every column of `source`, stamping the report with
    /// `analyzed_at`.
    ///
    /// Columns without a rule are checked against the default rule of their
    /// resolved type. Per-column failures are recorded in the report.
    ///
    /// # Errors
    /// `Configuration` for an invalid configuration; any error of the
    /// table-level source calls (row count, column listing, the shared
    /// sample fetch).
    pub async fn analyze_at(
        &self,
        source: &dyn TabularSource,
        rules: &RuleSet,
        analyzed_at: DateTime<Utc>,
    ) -> Result<TableReport> {
        self.config.validate()?;

        let table = source.table_name();
        let row_count = source.row_count().await?;
        let names = source.column_names().await?;
        tracing::info!(
            "Analyzing table '{}' ({} rows, {} columns, {} rules)",
            table,
            row_count,
            names.len(),
            rules.len()
        );

        let plan = SamplePlan::decide(source.locality(), row_count, &self.config.sampling);
        let (sampled_columns, strategy, rows_examined) = match plan {
            SamplePlan::Full => (None, None, row_count),
            SamplePlan::Sample(request) => {
                let request = effective_request(source, request);
                let columns = source.sample_rows(&names, &request).await?;
                let examined = columns.first().map_or(0, |c| c.len() as u64);
                (Some(columns), Some(request.method), examined)
            }
        };

        let aggregate_in_source = plan.is_sampled()
            && self.config.source_side_aggregation
            && source.locality() == Locality::Remote
            && source.supports(SourceCapability::Aggregation);
        if aggregate_in_source {
            tracing::debug!(
                "Completeness and uniqueness of '{}' aggregated in the source",
                table
            );
        }

        let context = RunContext {
            source,
            rules,
            row_count,
            sampled: plan.is_sampled(),
            aggregate_in_source,
        };

        let mut prefetched: HashMap<String, Column> = sampled_columns
            .into_iter()
            .flatten()
            .map(|column| (column.name.clone(), column))
            .collect();
        let tasks = names
            .iter()
            .map(|name| self.analyze_column(&context, name, prefetched.remove(name)));
        let column_reports = join_all(tasks).await;

        let mut aggregator = ReportAggregator::new(TableInfo {
            name: table.to_string(),
            row_count,
            rows_examined,
            column_count: names.len(),
            sampled: plan.is_sampled(),
            sampling_strategy: strategy,
            analyzed_at,
        });
        for (name, report) in names.iter().zip(column_reports) {
            aggregator.add_column(name.clone(), report);
        }

        for column in rules.columns().filter(|c| !names.iter().any(|n| n == c)) {
            let error = DqAuditError::column_not_found(column);
            tracing::warn!("Rule for '{}' skipped: {}", column, error);
            aggregator.add_column(column, failed_column(&error, None));
        }

        let report = aggregator.finish();
        tracing::info!(
            "Analysis of '{}' complete: {:.2}% complete, {:.2}% valid, {:.2}% unique, {} failed checks",
            table,
            report.summary.completeness_rate,
            report.summary.validity_rate,
            report.summary.uniqueness_rate,
            report.summary.failed_checks
        );
        Ok(report)
    }

    async fn analyze_column(
        &self,
        context: &RunContext<'_>,
        name: &str,
        prefetched: Option<Column>,
    ) -> ColumnReport {
        let column = match prefetched {
            Some(column) => column,
            None => match fetch_column(context.source, name).await {
                Ok(column) => column,
                Err(e) => {
                    tracing::warn!("Column '{}' could not be read: {}", name, e);
                    return failed_column(&e, None);
                }
            },
        };

        let mask = column.missing_mask();
        let semantic = self.profiler.resolve(&column);

        let completeness = if context.aggregate_in_source {
            match context
                .source
                .aggregate_count(name, CountPredicate::IsMissing)
                .await
            {
                Ok(missing) => completeness_from_counts(context.row_count, missing),
                Err(e) => record_failure(name, "completeness", &e),
            }
        } else {
            completeness_from_mask(&mask).with_estimated(context.sampled)
        };

        let validity = match rule_for(context.rules, name, &semantic) {
            Ok(rule) => match check_validity_with(&column, &mask, &rule) {
                Ok(result) => result.with_estimated(context.sampled),
                Err(e) => record_failure(name, "validity", &e),
            },
            Err(e) => record_failure(name, "validity", &e),
        };

        let uniqueness = match uniqueness_type(&semantic) {
            Ok(semantic) => self.uniqueness(context, &column, semantic).await,
            Err(e) => record_failure(name, "uniqueness", &e),
        };

        ColumnReport {
            semantic_type: semantic.ok(),
            completeness,
            validity,
            uniqueness,
        }
    }

    async fn uniqueness(
        &self,
        context: &RunContext<'_>,
        column: &Column,
        semantic: SemanticType,
    ) -> ColumnResult {
        let top_k = self.config.top_duplicates;
        if !context.aggregate_in_source {
            return check_uniqueness_with(column, semantic, top_k).with_estimated(context.sampled);
        }
        let aggregated = if context.source.supports(SourceCapability::BoundedDistinct) {
            context
                .source
                .aggregate_distinct(&column.name, top_k)
                .await
                .map(|summary| uniqueness_from_summary(&summary, semantic, top_k))
        } else {
            context
                .source
                .aggregate_group_counts(&column.name)
                .await
                .map(|groups| uniqueness_from_groups(&groups, semantic, top_k))
        };
        aggregated.unwrap_or_else(|e| record_failure(&column.name, "uniqueness", &e))
    }
}

/// Replaces percentage sampling with random sampling for sources that
/// cannot sample by percentage.
fn effective_request(source: &dyn TabularSource, request: SampleRequest) -> SampleRequest {
    if matches!(request.method, SamplingMethod::Percentage { .. })
        && !source.supports(SourceCapability::PercentageSampling)
    {
        tracing::warn!(
            "Source '{}' does not support percentage sampling; falling back to random",
            source.table_name()
        );
        return request.with_method(SamplingMethod::Random);
    }
    request
}

/// The configured rule of a column, or the default rule of its type.
fn rule_for(
    rules: &RuleSet,
    name: &str,
    semantic: &Result<SemanticType>,
) -> Result<ValidationRule> {
    if let Some(rule) = rules.get(name) {
        return Ok(rule.clone());
    }
    match semantic {
        Ok(semantic) => Ok(ValidationRule::default_for(*semantic)),
        Err(e) => Err(clone_type_error(e)),
    }
}

/// Reads one whole column with its declared type.
async fn fetch_column(source: &dyn TabularSource, name: &str) -> Result<Column> {
    let declared_type = source.declared_type(name).await?;
    let values = source.column_values(name).await?;
    Ok(Column {
        name: name.to_string(),
        declared_type,
        values,
    })
}

/// Type used for distinct counting. Columns without any type evidence have
/// no present values and are counted as strings.
fn uniqueness_type(semantic: &Result<SemanticType>) -> Result<SemanticType> {
    match semantic {
        Ok(semantic) => Ok(*semantic),
        Err(DqAuditError::UnresolvedType { .. }) => Ok(SemanticType::String),
        Err(e) => Err(clone_type_error(e)),
    }
}

/// Type resolution only fails with the two type errors, which carry no
/// source and can be rebuilt for each check they fail.
fn clone_type_error(error: &DqAuditError) -> DqAuditError {
    match error {
        DqAuditError::UnresolvedType { column } => DqAuditError::unresolved_type(column.clone()),
        DqAuditError::UnsupportedType { type_name } => {
            DqAuditError::unsupported_type(type_name.clone())
        }
        other => DqAuditError::configuration(other.to_string()),
    }
}

fn record_failure(column: &str, check: &str, error: &DqAuditError) -> ColumnResult {
    tracing::warn!("{} check of '{}' failed: {}", check, column, error);
    ColumnResult::failed(error)
}

fn failed_column(error: &DqAuditError, semantic_type: Option<SemanticType>) -> ColumnReport {
    ColumnReport {
        semantic_type,
        completeness: ColumnResult::failed(error),
        validity: ColumnResult::failed(error),
        uniqueness: ColumnResult::failed(error),
    }
}

/// Analyzes `source` with default settings and the given sampling policy.
///
/// # Errors
/// See [`Analyzer::analyze_at`].
pub async fn analyze(
    source: &dyn TabularSource,
    rules: &RuleSet,
    sampling: &SamplingConfig,
) -> Result<TableReport> {
    Analyzer::new(AnalysisConfig::default().with_sampling(sampling.clone()))
        .analyze(source, rules)
        .await
}
