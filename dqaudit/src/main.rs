//! Data quality audit tool.
//!
//! This binary opens one table of a database and reports completeness,
//! validity and uniqueness for each of its columns.
//!
//! # Security Guarantees
//! - Read-only database operations only
//! - Credentials are redacted before they reach logs

mod cli;

use anyhow::Context;
use clap::Parser;
use dqaudit_core::error::redact_database_url;
use dqaudit_core::logging::init_logging;
use dqaudit_core::{Analyzer, TableReport, open_source};
use tracing::{error, info, warn};

use crate::cli::{Cli, OutputFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet, cli.global.log_format.into())?;

    let config = cli.analysis_config()?;
    let rules = cli.rule_set()?;

    info!(
        "Auditing table '{}' at {}",
        cli.table,
        redact_database_url(&cli.database_url)
    );
    if !rules.is_empty() {
        info!("Loaded {} column rules", rules.len());
    }

    let source = open_source(&cli.database_url, &cli.table)
        .await
        .map_err(|e| {
            error!("Failed to open source: {}", e);
            e
        })?;

    let analyzer = Analyzer::new(config);
    let report = analyzer.analyze(source.as_ref(), &rules).await.map_err(|e| {
        error!("Analysis failed: {}", e);
        e
    })?;

    if report.summary.failed_checks > 0 {
        warn!(
            "{} checks failed; see the report for details",
            report.summary.failed_checks
        );
    }

    let rendered = render(&report, &cli, &analyzer)?;
    match &cli.output {
        Some(path) => {
            tokio::fs::write(path, rendered)
                .await
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("✓ Report saved to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

fn render(report: &TableReport, cli: &Cli, analyzer: &Analyzer) -> anyhow::Result<String> {
    let rendered = match cli.format {
        OutputFormat::Json => report.to_json_pretty()?,
        OutputFormat::Summary => report.render_summary(&analyzer.config().thresholds),
    };
    Ok(rendered)
}
