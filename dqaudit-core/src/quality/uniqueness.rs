//! Uniqueness analysis: distinct counting and top-duplicate extraction.
//!
//! Values are compared after normalization by the column's semantic type, so
//! `998` and `998.0` collide in a numeric column and `"yes"`/`"TRUE"` collide
//! in a boolean column. Missing values never participate.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::NaiveDateTime;

use crate::adapters::DistinctSummary;
use crate::error::{DqAuditError, Result};
use crate::models::{Column, Number, Value};
use crate::profile::{SemanticType, TypeProfiler};

use super::models::{ColumnResult, TopDuplicates};

/// Default number of top duplicates reported.
pub const DEFAULT_TOP_DUPLICATES: usize = 5;

/// Comparison key of a value under a semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DistinctKey {
    Int(i128),
    /// Bit pattern of a non-integral float
    Float(u64),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl DistinctKey {
    fn of(value: &Value, semantic: SemanticType) -> Self {
        let normalized = match semantic {
            SemanticType::String => None,
            SemanticType::Integer | SemanticType::Floating => value.as_number().map(Self::number),
            SemanticType::Boolean => value
                .as_bool_literal()
                .map(|literal| DistinctKey::Bool(literal.truth())),
            SemanticType::DateTime => value.as_timestamp().map(DistinctKey::Timestamp),
        };
        normalized.unwrap_or_else(|| DistinctKey::Text(value.as_text().into_owned()))
    }

    fn number(number: Number) -> Self {
        match (number.as_integer(), number) {
            (Some(i), _) => DistinctKey::Int(i),
            (None, Number::Float(f)) => DistinctKey::Float(f.to_bits()),
            (None, Number::Int(i)) => DistinctKey::Int(i),
        }
    }
}

/// Occurrence counter that remembers first-seen order.
#[derive(Debug, Default)]
struct DistinctCounter {
    positions: HashMap<DistinctKey, usize>,
    entries: Vec<(String, u64)>,
    total: u64,
}

impl DistinctCounter {
    fn add(&mut self, value: &Value, semantic: SemanticType, count: u64) {
        if count == 0 {
            return;
        }
        self.total = self.total.saturating_add(count);
        match self.positions.entry(DistinctKey::of(value, semantic)) {
            Entry::Occupied(slot) => {
                if let Some(entry) = self.entries.get_mut(*slot.get()) {
                    entry.1 = entry.1.saturating_add(count);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(self.entries.len());
                self.entries.push((value.as_text().into_owned(), count));
            }
        }
    }

    fn finish(self, missing: u64, top_k: usize) -> ColumnResult {
        let unique_count = self.entries.len() as u64;
        ColumnResult::uniqueness(
            self.total,
            missing,
            unique_count,
            top_repeated(self.entries, top_k),
        )
    }
}

/// Keeps the `top_k` entries seen more than once, count-descending.
fn top_repeated(entries: Vec<(String, u64)>, top_k: usize) -> TopDuplicates {
    let mut repeated: Vec<(String, u64)> = entries
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .collect();
    // Stable sort keeps first-seen order among equal counts
    repeated.sort_by(|a, b| b.1.cmp(&a.1));
    repeated.truncate(top_k);
    TopDuplicates::new(repeated)
}

/// Computes uniqueness of a column, resolving its type first.
///
/// A column with no type evidence has no present values, so it is counted
/// with string keys.
///
/// # Errors
/// Returns `UnsupportedType` when the declared type is unknown.
pub fn check_uniqueness(column: &Column) -> Result<ColumnResult> {
    let semantic = match TypeProfiler::default().resolve(column) {
        Ok(semantic) => semantic,
        Err(DqAuditError::UnresolvedType { .. }) => SemanticType::String,
        Err(e) => return Err(e),
    };
    Ok(check_uniqueness_with(column, semantic, DEFAULT_TOP_DUPLICATES))
}

/// Computes uniqueness under a resolved type, keeping up to `top_k` duplicates.
pub fn check_uniqueness_with(column: &Column, semantic: SemanticType, top_k: usize) -> ColumnResult {
    let mut counter = DistinctCounter::default();
    let mut missing: u64 = 0;
    for value in &column.values {
        if value.is_missing() {
            missing += 1;
        } else {
            counter.add(value, semantic, 1);
        }
    }
    counter.finish(missing, top_k)
}

/// Builds uniqueness from `(value, count)` groups aggregated by the source.
///
/// Groups must arrive in first-seen order. Groups that normalize to the same
/// key are merged and missing groups are excluded.
pub fn uniqueness_from_groups(
    groups: &[(Value, u64)],
    semantic: SemanticType,
    top_k: usize,
) -> ColumnResult {
    let mut counter = DistinctCounter::default();
    let mut missing: u64 = 0;
    for (value, count) in groups {
        if value.is_missing() {
            missing = missing.saturating_add(*count);
        } else {
            counter.add(value, semantic, *count);
        }
    }
    counter.finish(missing, top_k)
}

/// Builds uniqueness from a [`DistinctSummary`] computed by the source.
///
/// The distinct count uses the source's equality. Repeated values that
/// normalize to the same key are merged, and each merge lowers the distinct
/// count by one; collisions involving values outside the transferred top
/// groups are not visible and are not corrected.
pub fn uniqueness_from_summary(
    summary: &DistinctSummary,
    semantic: SemanticType,
    top_k: usize,
) -> ColumnResult {
    let mut counter = DistinctCounter::default();
    let mut transferred: u64 = 0;
    for (value, count) in summary.top_repeated.iter().filter(|(v, _)| !v.is_missing()) {
        transferred += 1;
        counter.add(value, semantic, *count);
    }
    let merged = transferred.saturating_sub(counter.entries.len() as u64);
    let unique_count = summary.distinct.saturating_sub(merged);

    ColumnResult::uniqueness(
        summary.present,
        summary.missing,
        unique_count,
        top_repeated(counter.entries, top_k),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::models::{ISSUE_DUPLICATES, Metrics};

    fn unpack(result: &ColumnResult) -> (u64, u64, f64, &TopDuplicates) {
        match &result.metrics {
            Metrics::Uniqueness {
                unique_count,
                duplicate_count,
                uniqueness_rate,
                top_duplicates,
            } => (*unique_count, *duplicate_count, *uniqueness_rate, top_duplicates),
            other => panic!("unexpected metrics {:?}", other),
        }
    }

    #[test]
    fn test_uniqueness_scenario() {
        let column = Column::new("code", vec!["A", "A", "B", "C"]);
        let result = check_uniqueness(&column).unwrap();
        let (unique, duplicates, rate, top) = unpack(&result);

        assert_eq!(result.total, 4);
        assert_eq!(unique, 3);
        assert_eq!(duplicates, 1);
        assert_eq!(rate, 75.0);
        assert_eq!(top.entries(), &[("A".to_string(), 2)]);
        assert_eq!(result.issues, vec![ISSUE_DUPLICATES.to_string()]);
    }

    #[test]
    fn test_uniqueness_all_unique() {
        let column = Column::new("id", vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let result = check_uniqueness(&column).unwrap();
        let (unique, duplicates, rate, top) = unpack(&result);

        assert_eq!((unique, duplicates), (3, 0));
        assert_eq!(rate, 100.0);
        assert!(top.is_empty());
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_uniqueness_ignores_missing() {
        let column = Column::new(
            "c",
            vec![Value::Missing, Value::from("x"), Value::Missing, Value::Float(f64::NAN)],
        );
        let result = check_uniqueness_with(&column, SemanticType::String, 5);
        let (unique, duplicates, rate, _) = unpack(&result);

        assert_eq!(result.total, 1);
        assert_eq!(result.missing, 3);
        assert_eq!((unique, duplicates), (1, 0));
        assert_eq!(rate, 100.0);
    }

    #[test]
    fn test_uniqueness_empty_column() {
        let column = Column::new("c", Vec::<Value>::new());
        let result = check_uniqueness(&column).unwrap();
        let (unique, duplicates, rate, _) = unpack(&result);
        assert_eq!((result.total, unique, duplicates), (0, 0, 0));
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn test_numeric_normalization() {
        let column = Column::new(
            "n",
            vec![
                Value::Int(998),
                Value::from("998.0"),
                Value::from("998"),
                Value::Float(1.5),
            ],
        );
        let result = check_uniqueness_with(&column, SemanticType::Floating, 5);
        let (unique, duplicates, _, top) = unpack(&result);

        assert_eq!((unique, duplicates), (2, 2));
        // First-seen rendering labels the group
        assert_eq!(top.entries(), &[("998".to_string(), 3)]);

        let as_strings = check_uniqueness_with(&column, SemanticType::String, 5);
        let (unique, _, _, _) = unpack(&as_strings);
        assert_eq!(unique, 3);
    }

    #[test]
    fn test_boolean_normalization() {
        let column = Column::new("flag", vec!["yes", "TRUE", "1", "no", "f"]);
        let result = check_uniqueness_with(&column, SemanticType::Boolean, 5);
        let (unique, _, _, top) = unpack(&result);

        assert_eq!(unique, 2);
        assert_eq!(
            top.entries(),
            &[("yes".to_string(), 3), ("no".to_string(), 2)]
        );
    }

    #[test]
    fn test_datetime_normalization() {
        let column = Column::new("ts", vec!["2024-01-01", "2024-01-01 00:00:00", "2024-01-02"]);
        let result = check_uniqueness_with(&column, SemanticType::DateTime, 5);
        let (unique, duplicates, _, _) = unpack(&result);
        assert_eq!((unique, duplicates), (2, 1));
    }

    #[test]
    fn test_top_duplicates_ordering_and_limit() {
        let values = vec!["b", "a", "a", "b", "c", "c", "c", "d", "d", "e", "e", "f", "f", "g"];
        let column = Column::new("c", values);
        let result = check_uniqueness_with(&column, SemanticType::String, 3);
        let (_, _, _, top) = unpack(&result);

        // c leads on count; b precedes a on first-seen order among ties
        assert_eq!(
            top.entries(),
            &[
                ("c".to_string(), 3),
                ("b".to_string(), 2),
                ("a".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_groups_match_local_counting() {
        let column = Column::new(
            "code",
            vec![
                Value::from("A"),
                Value::from("A"),
                Value::Missing,
                Value::from("B"),
            ],
        );
        let groups = vec![
            (Value::from("A"), 2),
            (Value::Missing, 1),
            (Value::from("B"), 1),
        ];
        assert_eq!(
            uniqueness_from_groups(&groups, SemanticType::String, 5),
            check_uniqueness_with(&column, SemanticType::String, 5)
        );
    }

    #[test]
    fn test_groups_merge_on_normalized_key() {
        let groups = vec![
            (Value::Int(998), 2),
            (Value::Float(998.0), 1),
            (Value::Int(7), 1),
        ];
        let result = uniqueness_from_groups(&groups, SemanticType::Integer, 5);
        let (unique, duplicates, _, top) = unpack(&result);

        assert_eq!(result.total, 4);
        assert_eq!((unique, duplicates), (2, 2));
        assert_eq!(top.get("998"), Some(3));
    }

    #[test]
    fn test_summary_matches_local_counting() {
        let column = Column::new("code", vec!["A", "A", "B", "C", "C", "C"]);
        let summary = DistinctSummary {
            missing: 0,
            present: 6,
            distinct: 3,
            top_repeated: vec![(Value::from("C"), 3), (Value::from("A"), 2)],
        };
        assert_eq!(
            uniqueness_from_summary(&summary, SemanticType::String, 5),
            check_uniqueness_with(&column, SemanticType::String, 5)
        );
    }

    #[test]
    fn test_summary_merges_normalized_top_values() {
        // The source counted "yes" and "true" as different values
        let summary = DistinctSummary {
            missing: 1,
            present: 9,
            distinct: 4,
            top_repeated: vec![(Value::from("yes"), 4), (Value::from("true"), 3)],
        };
        let result = uniqueness_from_summary(&summary, SemanticType::Boolean, 5);
        let (unique, duplicates, _, top) = unpack(&result);

        assert_eq!(result.total, 9);
        assert_eq!(result.missing, 1);
        assert_eq!((unique, duplicates), (3, 6));
        assert_eq!(top.entries(), &[("yes".to_string(), 7)]);
    }

    #[test]
    fn test_summary_without_repeats() {
        let summary = DistinctSummary {
            missing: 0,
            present: 20_000,
            distinct: 20_000,
            top_repeated: Vec::new(),
        };
        let result = uniqueness_from_summary(&summary, SemanticType::Integer, 5);
        let (unique, duplicates, rate, top) = unpack(&result);
        assert_eq!((unique, duplicates), (20_000, 0));
        assert_eq!(rate, 100.0);
        assert!(top.is_empty());
    }

    #[test]
    fn test_unsupported_declared_type() {
        let column = Column::new("geo", vec!["POINT(1 2)"]).with_declared_type("GEOGRAPHY");
        let err = check_uniqueness(&column).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedType);
    }
}
