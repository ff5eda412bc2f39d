//! In-process tabular source over owned columns.

use async_trait::async_trait;

use super::{Locality, SourceCapability, TabularSource};
use crate::error::{DqAuditError, Result};
use crate::models::{Column, Value};
use crate::sampling::{SampleRequest, sample_indices};

/// A table held in memory.
///
/// Local by default. Sampling selects one set of row positions and applies it
/// to every requested column.
#[derive(Debug, Clone)]
pub struct MemorySource {
    table_name: String,
    columns: Vec<Column>,
    row_count: usize,
    locality: Locality,
}

impl MemorySource {
    /// Creates a source from equally long columns.
    ///
    /// # Errors
    /// Returns `Configuration` for duplicate column names or ragged columns.
    pub fn new(table_name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let table_name = table_name.into();
        let row_count = columns.first().map_or(0, Column::len);

        for (index, column) in columns.iter().enumerate() {
            if column.len() != row_count {
                return Err(DqAuditError::configuration(format!(
                    "Column '{}' of table '{}' has {} rows, expected {}",
                    column.name,
                    table_name,
                    column.len(),
                    row_count
                )));
            }
            if columns[..index].iter().any(|c| c.name == column.name) {
                return Err(DqAuditError::configuration(format!(
                    "Duplicate column '{}' in table '{}'",
                    column.name, table_name
                )));
            }
        }

        Ok(Self {
            table_name,
            columns,
            row_count,
            locality: Locality::Local,
        })
    }

    /// Creates a source from JSON objects, one per row.
    ///
    /// Columns are the union of keys in first-seen order; a key absent from
    /// a row reads as missing.
    ///
    /// # Errors
    /// Returns `Configuration` when a row is not a JSON object.
    pub fn from_json_rows(
        table_name: impl Into<String>,
        rows: &[serde_json::Value],
    ) -> Result<Self> {
        let table_name = table_name.into();
        let mut names: Vec<String> = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            let object = row.as_object().ok_or_else(|| {
                DqAuditError::configuration(format!(
                    "Row {} of table '{}' is not a JSON object",
                    index, table_name
                ))
            })?;
            for key in object.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let values: Vec<Value> = rows
                    .iter()
                    .map(|row| row.get(&name).cloned().map_or(Value::Missing, Value::from))
                    .collect();
                Column::new(name, values)
            })
            .collect();

        Self::new(table_name, columns)
    }

    /// Builder method to override the reported locality.
    pub fn with_locality(mut self, locality: Locality) -> Self {
        self.locality = locality;
        self
    }

    fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| DqAuditError::column_not_found(name))
    }
}

#[async_trait]
impl TabularSource for MemorySource {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn locality(&self) -> Locality {
        self.locality
    }

    fn supports(&self, _capability: SourceCapability) -> bool {
        false
    }

    async fn row_count(&self) -> Result<u64> {
        Ok(self.row_count as u64)
    }

    async fn column_names(&self) -> Result<Vec<String>> {
        Ok(self.columns.iter().map(|c| c.name.clone()).collect())
    }

    async fn declared_type(&self, column: &str) -> Result<Option<String>> {
        Ok(self.column(column)?.declared_type.clone())
    }

    async fn column_values(&self, column: &str) -> Result<Vec<Value>> {
        Ok(self.column(column)?.values.clone())
    }

    async fn sample_rows(
        &self,
        columns: &[String],
        request: &SampleRequest,
    ) -> Result<Vec<Column>> {
        let indices = sample_indices(self.row_count, request);
        tracing::debug!(
            "Sampled {} of {} rows from '{}' using {}",
            indices.len(),
            self.row_count,
            self.table_name,
            request.method
        );

        columns
            .iter()
            .map(|name| {
                let source = self.column(name)?;
                let values = indices
                    .iter()
                    .filter_map(|&i| source.values.get(i).cloned())
                    .collect::<Vec<_>>();
                Ok(Column {
                    name: source.name.clone(),
                    declared_type: source.declared_type.clone(),
                    values,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CountPredicate;
    use crate::error::ErrorKind;
    use crate::sampling::SamplingMethod;
    use serde_json::json;

    fn people() -> MemorySource {
        MemorySource::new(
            "people",
            vec![
                Column::new("id", (1..=10_i64).map(Value::from).collect::<Vec<_>>()),
                Column::new(
                    "name",
                    (1..=10_i64).map(|i| format!("person-{}", i)).collect::<Vec<_>>(),
                ),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_memory_source_basics() {
        let source = people();
        assert_eq!(source.table_name(), "people");
        assert_eq!(source.locality(), Locality::Local);
        assert_eq!(source.row_count().await.unwrap(), 10);
        assert_eq!(source.column_names().await.unwrap(), vec!["id", "name"]);
        assert_eq!(source.column_values("id").await.unwrap().len(), 10);
        assert!(!source.supports(SourceCapability::Aggregation));
    }

    #[tokio::test]
    async fn test_unknown_column() {
        let err = people().column_values("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ColumnNotFound);
    }

    #[tokio::test]
    async fn test_aggregation_unsupported_by_default() {
        let err = people()
            .aggregate_count("id", CountPredicate::IsMissing)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("aggregation"));
    }

    #[tokio::test]
    async fn test_sample_rows_share_positions() {
        let source = people();
        let request = SampleRequest {
            size: 4,
            method: SamplingMethod::Random,
            seed: Some(3),
        };
        let columns = ["id".to_string(), "name".to_string()];
        let sample = source.sample_rows(&columns, &request).await.unwrap();

        assert_eq!(sample.len(), 2);
        assert_eq!(sample[0].len(), 4);
        for (id, name) in sample[0].values.iter().zip(&sample[1].values) {
            assert_eq!(name.as_text(), format!("person-{}", id));
        }
    }

    #[tokio::test]
    async fn test_limit_sample_takes_first_rows() {
        let request = SampleRequest {
            size: 3,
            method: SamplingMethod::Limit,
            seed: None,
        };
        let sample = people()
            .sample_rows(&["id".to_string()], &request)
            .await
            .unwrap();
        assert_eq!(
            sample[0].values,
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = MemorySource::new(
            "t",
            vec![Column::new("a", vec![1_i64, 2]), Column::new("b", vec![1_i64])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let result = MemorySource::new(
            "t",
            vec![Column::new("a", vec![1_i64]), Column::new("a", vec![2_i64])],
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_from_json_rows() {
        let rows = vec![
            json!({"id": 1, "email": "alice@example.com"}),
            json!({"id": 2}),
            json!({"id": 3, "email": null}),
        ];
        let source = MemorySource::from_json_rows("users", &rows).unwrap();

        assert_eq!(source.row_count().await.unwrap(), 3);
        let emails = source.column_values("email").await.unwrap();
        assert_eq!(
            emails,
            vec![
                Value::Text("alice@example.com".into()),
                Value::Missing,
                Value::Missing
            ]
        );
        assert!(MemorySource::from_json_rows("bad", &[json!([1, 2])]).is_err());
    }
}
