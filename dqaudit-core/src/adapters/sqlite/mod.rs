//! SQLite tabular source.
//!
//! # Module Structure
//! - `connection`: connection string validation and pool creation
//! - `queries`: SQL text for counting, grouping and sampling
//! - `values`: conversion of SQLite cells into [`Value`]s
//!
//! # SQLite-Specific Features
//! - Declared column types come from `PRAGMA table_info`
//! - Completeness and uniqueness can be aggregated in the database
//! - `RANDOM()`-based random and percentage sampling
//!
//! # Security Guarantees
//! - All operations are read-only (SELECT/PRAGMA only)
//! - File databases are opened read-only
//! - Identifiers are quoted; connection strings are redacted in logs

pub mod connection;
pub mod queries;
pub mod values;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::{CountPredicate, DistinctSummary, Locality, SourceCapability, TabularSource};
use crate::error::{DqAuditError, Result};
use crate::models::{Column, Value};
use crate::sampling::{SampleRequest, SamplingMethod};

/// Schema entry of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteColumnInfo {
    /// Column name
    pub name: String,
    /// Declared type; empty when the column was declared without one
    pub declared_type: String,
}

/// One table of a SQLite database.
///
/// Reports [`Locality::Remote`] by default so that large tables are sampled
/// and aggregated in the database rather than transferred.
pub struct SqliteSource {
    pool: SqlitePool,
    table: String,
    columns: Vec<SqliteColumnInfo>,
    locality: Locality,
}

impl std::fmt::Debug for SqliteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSource")
            .field("table", &self.table)
            .field("columns", &self.columns.len())
            .field("locality", &self.locality)
            .finish_non_exhaustive()
    }
}

impl SqliteSource {
    /// Wraps an open pool, loading the table's schema.
    ///
    /// # Errors
    /// `Configuration` when the table does not exist, `SourceUnavailable`
    /// when the schema query fails.
    pub async fn from_pool(pool: SqlitePool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        let sql = queries::table_info(&table);
        let rows = sqlx::query(&sql)
            .fetch_all(&pool)
            .await
            .map_err(|e| {
                DqAuditError::source_unavailable(
                    format!("Failed to read schema of table '{}'", table),
                    e,
                )
            })?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("name").map_err(|e| {
                DqAuditError::source_unavailable(
                    format!("Failed to read column name of table '{}'", table),
                    e,
                )
            })?;
            let declared_type: String = row.try_get("type").unwrap_or_default();
            columns.push(SqliteColumnInfo {
                name,
                declared_type,
            });
        }

        if columns.is_empty() {
            return Err(DqAuditError::configuration(format!(
                "Table '{}' not found",
                table
            )));
        }

        tracing::debug!("Loaded {} columns for table '{}'", columns.len(), table);
        Ok(Self {
            pool,
            table,
            columns,
            locality: Locality::Remote,
        })
    }

    /// Builder method to override the reported locality.
    pub fn with_locality(mut self, locality: Locality) -> Self {
        self.locality = locality;
        self
    }

    /// Schema of the table.
    pub fn columns(&self) -> &[SqliteColumnInfo] {
        &self.columns
    }

    /// Closes the connection gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn column_info(&self, name: &str) -> Result<&SqliteColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| DqAuditError::column_not_found(name))
    }

    fn query_failed(&self, action: &str, error: sqlx::Error) -> DqAuditError {
        DqAuditError::source_unavailable(
            format!("Failed to {} for table '{}'", action, self.table),
            error,
        )
    }
}

#[async_trait]
impl TabularSource for SqliteSource {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn locality(&self) -> Locality {
        self.locality
    }

    fn supports(&self, capability: SourceCapability) -> bool {
        matches!(
            capability,
            SourceCapability::Aggregation
                | SourceCapability::BoundedDistinct
                | SourceCapability::PercentageSampling
        )
    }

    async fn row_count(&self) -> Result<u64> {
        let sql = queries::count_rows(&self.table, None);
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.query_failed("count rows", e))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn column_names(&self) -> Result<Vec<String>> {
        Ok(self.columns.iter().map(|c| c.name.clone()).collect())
    }

    async fn declared_type(&self, column: &str) -> Result<Option<String>> {
        let info = self.column_info(column)?;
        Ok(Some(info.declared_type.clone()).filter(|t| !t.trim().is_empty()))
    }

    async fn column_values(&self, column: &str) -> Result<Vec<Value>> {
        self.column_info(column)?;
        let sql = queries::select_columns(&self.table, &[column]);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.query_failed(&format!("read column '{}'", column), e))?;

        rows.iter().map(|row| values::extract_value(row, 0)).collect()
    }

    async fn sample_rows(
        &self,
        columns: &[String],
        request: &SampleRequest,
    ) -> Result<Vec<Column>> {
        let infos = columns
            .iter()
            .map(|name| self.column_info(name))
            .collect::<Result<Vec<_>>>()?;
        let names: Vec<&str> = infos.iter().map(|c| c.name.as_str()).collect();

        if request.seed.is_some() && request.method != SamplingMethod::Limit {
            tracing::debug!("SQLite RANDOM() cannot be seeded; ignoring sampling seed");
        }

        let sql = queries::sample(&self.table, &names, &request.method);
        let limit = i64::try_from(request.size).unwrap_or(i64::MAX);
        let mut query = sqlx::query(&sql);
        if let SamplingMethod::Percentage { percent } = request.method {
            query = query.bind(percent);
        }
        let rows = query
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.query_failed("sample rows", e))?;

        tracing::debug!(
            "Sampled {} rows from '{}' using {}",
            rows.len(),
            self.table,
            request.method
        );

        let mut sampled: Vec<Column> = infos
            .iter()
            .map(|info| Column {
                name: info.name.clone(),
                declared_type: Some(info.declared_type.clone()).filter(|t| !t.trim().is_empty()),
                values: Vec::with_capacity(rows.len()),
            })
            .collect();
        for row in &rows {
            for (index, column) in sampled.iter_mut().enumerate() {
                column.values.push(values::extract_value(row, index)?);
            }
        }
        Ok(sampled)
    }

    async fn aggregate_count(&self, column: &str, predicate: CountPredicate) -> Result<u64> {
        self.column_info(column)?;
        let filter = match predicate {
            CountPredicate::All => None,
            CountPredicate::IsMissing => Some(column),
        };
        let sql = queries::count_rows(&self.table, filter);
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.query_failed(&format!("count values of '{}'", column), e))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn aggregate_group_counts(&self, column: &str) -> Result<Vec<(Value, u64)>> {
        self.column_info(column)?;
        let sql = queries::group_counts(&self.table, column);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.query_failed(&format!("group values of '{}'", column), e))?;

        rows.iter()
            .map(|row| {
                let value = values::extract_value(row, 0)?;
                let count: i64 = row
                    .try_get(1)
                    .map_err(|e| self.query_failed("read group count", e))?;
                Ok((value, u64::try_from(count).unwrap_or(0)))
            })
            .collect()
    }

    async fn aggregate_distinct(&self, column: &str, top_k: usize) -> Result<DistinctSummary> {
        self.column_info(column)?;
        let sql = queries::distinct_stats(&self.table, column);
        let (missing, present, distinct): (i64, i64, i64) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.query_failed(&format!("count distinct values of '{}'", column), e))?;

        let sql = queries::top_repeated(&self.table, column);
        let rows = sqlx::query(&sql)
            .bind(i64::try_from(top_k).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.query_failed(&format!("rank repeated values of '{}'", column), e))?;
        let top_repeated = rows
            .iter()
            .map(|row| {
                let value = values::extract_value(row, 0)?;
                let count: i64 = row
                    .try_get(1)
                    .map_err(|e| self.query_failed("read group count", e))?;
                Ok((value, u64::try_from(count).unwrap_or(0)))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            "Column '{}' of '{}': {} distinct values, {} repeated values transferred",
            column,
            self.table,
            distinct,
            top_repeated.len()
        );
        Ok(DistinctSummary {
            missing: u64::try_from(missing).unwrap_or(0),
            present: u64::try_from(present).unwrap_or(0),
            distinct: u64::try_from(distinct).unwrap_or(0),
            top_repeated,
        })
    }
}
