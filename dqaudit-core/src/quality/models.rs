//! Data quality result models.
//!
//! Every check produces one [`ColumnResult`]. Constructors derive the rates
//! from the counts, so a result is consistent by construction and never
//! mutated after it is built (apart from the builder-style flags).

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DqAuditError, ErrorKind};

/// Issue recorded when a column has missing values.
pub const ISSUE_MISSING_VALUES: &str = "Missing values found";
/// Issue recorded when a non-empty column has no present values.
pub const ISSUE_ALL_MISSING: &str = "All values are missing";
/// Issue recorded when a column has repeated values.
pub const ISSUE_DUPLICATES: &str = "Duplicate values found";

/// Percentage `part / whole * 100` rounded to 2 decimals; 0 when `whole == 0`.
pub fn rate(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

/// Rounds to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Values seen more than once, most frequent first.
///
/// Serialized as a JSON object whose key order is the ranking order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopDuplicates(Vec<(String, u64)>);

impl TopDuplicates {
    /// Wraps an already ranked list.
    pub fn new(entries: Vec<(String, u64)>) -> Self {
        Self(entries)
    }

    /// Ranked entries.
    pub fn entries(&self) -> &[(String, u64)] {
        &self.0
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing repeats.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Count for a rendered value, if it is among the top duplicates.
    pub fn get(&self, value: &str) -> Option<u64> {
        self.0
            .iter()
            .find(|(label, _)| label == value)
            .map(|(_, count)| *count)
    }
}

impl Serialize for TopDuplicates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (value, count) in &self.0 {
            map.serialize_entry(value, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TopDuplicates {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = TopDuplicates;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of value to occurrence count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((value, count)) = access.next_entry::<String, u64>()? {
                    entries.push((value, count));
                }
                Ok(TopDuplicates(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Dimension-specific part of a [`ColumnResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metrics {
    Validity {
        valid: u64,
        invalid: u64,
        validity_rate: f64,
        completeness_rate: f64,
    },
    Uniqueness {
        unique_count: u64,
        duplicate_count: u64,
        uniqueness_rate: f64,
        top_duplicates: TopDuplicates,
    },
    Completeness {
        present: u64,
        completeness_rate: f64,
    },
    /// The check could not run
    Failed { error: ErrorKind },
}

/// Outcome of one check on one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnResult {
    /// Values considered (for uniqueness: present values only)
    pub total: u64,
    /// Missing values seen
    pub missing: u64,
    /// Dimension-specific counts and rates
    #[serde(flatten)]
    pub metrics: Metrics,
    /// True when computed on a sample rather than every row
    #[serde(default)]
    pub estimated: bool,
    /// Distinct issue descriptions in first-seen order
    #[serde(default)]
    pub issues: Vec<String>,
}

impl ColumnResult {
    /// Builds a completeness result from counts.
    pub fn completeness(total: u64, missing: u64) -> Self {
        let missing = clamp_count("missing", missing, total);
        let present = total - missing;
        let mut issues = Vec::new();
        if missing > 0 {
            issues.push(ISSUE_MISSING_VALUES.to_string());
        }

        Self {
            total,
            missing,
            metrics: Metrics::Completeness {
                present,
                completeness_rate: rate(present, total),
            },
            estimated: false,
            issues,
        }
    }

    /// Builds a validity result from counts and violation issues.
    ///
    /// `valid + invalid` must equal the number of present values.
    pub fn validity(total: u64, missing: u64, valid: u64, invalid: u64, issues: Vec<String>) -> Self {
        let missing = clamp_count("missing", missing, total);
        let present = total - missing;
        if valid.saturating_add(invalid) != present {
            tracing::warn!(
                "Quality metrics anomaly: valid ({}) + invalid ({}) differs from present ({})",
                valid,
                invalid,
                present
            );
        }

        let mut issues = issues;
        if total > 0 && present == 0 {
            issues.push(ISSUE_ALL_MISSING.to_string());
        }

        Self {
            total,
            missing,
            metrics: Metrics::Validity {
                valid,
                invalid,
                validity_rate: rate(valid, present),
                completeness_rate: rate(present, total),
            },
            estimated: false,
            issues,
        }
    }

    /// Builds a uniqueness result over `total` present values.
    pub fn uniqueness(total: u64, missing: u64, unique_count: u64, top_duplicates: TopDuplicates) -> Self {
        let unique_count = clamp_count("unique_count", unique_count, total);
        let duplicate_count = total - unique_count;
        let mut issues = Vec::new();
        if duplicate_count > 0 {
            issues.push(ISSUE_DUPLICATES.to_string());
        }

        Self {
            total,
            missing,
            metrics: Metrics::Uniqueness {
                unique_count,
                duplicate_count,
                uniqueness_rate: rate(unique_count, total),
                top_duplicates,
            },
            estimated: false,
            issues,
        }
    }

    /// Builds a failed result carrying the error kind and message.
    pub fn failed(error: &DqAuditError) -> Self {
        Self {
            total: 0,
            missing: 0,
            metrics: Metrics::Failed {
                error: error.kind(),
            },
            estimated: false,
            issues: vec![error.to_issue()],
        }
    }

    /// Builder method to mark the result as computed on a sample.
    pub fn with_estimated(mut self, estimated: bool) -> Self {
        self.estimated = estimated;
        self
    }

    /// Builder method to record the counts known before the check failed.
    pub fn with_counts(mut self, total: u64, missing: u64) -> Self {
        self.total = total;
        self.missing = clamp_count("missing", missing, total);
        self
    }

    /// True when the check could not run.
    pub fn is_failed(&self) -> bool {
        matches!(self.metrics, Metrics::Failed { .. })
    }

    /// Error kind of a failed check.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.metrics {
            Metrics::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// The headline rate of this result, if the check succeeded.
    pub fn rate(&self) -> Option<f64> {
        match &self.metrics {
            Metrics::Completeness {
                completeness_rate, ..
            } => Some(*completeness_rate),
            Metrics::Validity { validity_rate, .. } => Some(*validity_rate),
            Metrics::Uniqueness {
                uniqueness_rate, ..
            } => Some(*uniqueness_rate),
            Metrics::Failed { .. } => None,
        }
    }

    /// Present (non-missing) values.
    pub fn present(&self) -> u64 {
        self.total.saturating_sub(self.missing)
    }
}

/// Caps a count at `total`, logging when the input was inconsistent.
fn clamp_count(name: &str, count: u64, total: u64) -> u64 {
    if count > total {
        tracing::warn!(
            "Quality metrics anomaly: {} ({}) exceeds total ({})",
            name,
            count,
            total
        );
        total
    } else {
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_rounding() {
        assert_eq!(rate(2, 3), 66.67);
        assert_eq!(rate(1, 3), 33.33);
        assert_eq!(rate(3, 4), 75.0);
        assert_eq!(rate(0, 0), 0.0);
        assert_eq!(rate(5, 5), 100.0);
    }

    #[test]
    fn test_completeness_result() {
        let result = ColumnResult::completeness(4, 1);
        assert_eq!(result.present(), 3);
        assert_eq!(result.rate(), Some(75.0));
        assert_eq!(result.issues, vec![ISSUE_MISSING_VALUES.to_string()]);

        let empty = ColumnResult::completeness(0, 0);
        assert_eq!(empty.rate(), Some(0.0));
        assert!(empty.issues.is_empty());
    }

    #[test]
    fn test_completeness_clamps_missing() {
        let result = ColumnResult::completeness(2, 5);
        assert_eq!(result.missing, 2);
        assert_eq!(result.present(), 0);
    }

    #[test]
    fn test_validity_result_all_missing() {
        let result = ColumnResult::validity(3, 3, 0, 0, Vec::new());
        assert_eq!(result.rate(), Some(0.0));
        assert_eq!(result.issues, vec![ISSUE_ALL_MISSING.to_string()]);
    }

    #[test]
    fn test_uniqueness_result() {
        let top = TopDuplicates::new(vec![("A".to_string(), 2)]);
        let result = ColumnResult::uniqueness(4, 0, 3, top);
        match &result.metrics {
            Metrics::Uniqueness {
                duplicate_count,
                uniqueness_rate,
                top_duplicates,
                ..
            } => {
                assert_eq!(*duplicate_count, 1);
                assert_eq!(*uniqueness_rate, 75.0);
                assert_eq!(top_duplicates.get("A"), Some(2));
            }
            other => panic!("unexpected metrics {:?}", other),
        }
        assert_eq!(result.issues, vec![ISSUE_DUPLICATES.to_string()]);
    }

    #[test]
    fn test_failed_result() {
        let error = DqAuditError::invalid_rule("min_value 5 is greater than max_value 1");
        let result = ColumnResult::failed(&error).with_counts(10, 2);
        assert!(result.is_failed());
        assert_eq!(result.error_kind(), Some(ErrorKind::InvalidRule));
        assert_eq!(result.rate(), None);
        assert_eq!(result.total, 10);
        assert!(result.issues[0].starts_with("InvalidRuleError: "));
    }

    #[test]
    fn test_result_serialization_shape() {
        let top = TopDuplicates::new(vec![("B".to_string(), 3), ("A".to_string(), 2)]);
        let result = ColumnResult::uniqueness(7, 1, 4, top);
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"total":7,"missing":1,"unique_count":4,"duplicate_count":3,"uniqueness_rate":57.14,"top_duplicates":{"B":3,"A":2},"estimated":false,"issues":["Duplicate values found"]}"#
        );

        let failed = ColumnResult::failed(&DqAuditError::column_not_found("ghost"));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error"], "ColumnNotFoundError");
    }

    #[test]
    fn test_result_deserialization() {
        let json = r#"{"total":4,"missing":1,"present":3,"completeness_rate":75.0,"issues":["Missing values found"]}"#;
        let result: ColumnResult = serde_json::from_str(json).unwrap();
        assert_eq!(result, ColumnResult::completeness(4, 1));

        let json = r#"{"total":2,"missing":0,"unique_count":1,"duplicate_count":1,"uniqueness_rate":50.0,"top_duplicates":{"z":2,"a":2},"estimated":true,"issues":[]}"#;
        let result: ColumnResult = serde_json::from_str(json).unwrap();
        match result.metrics {
            Metrics::Uniqueness { top_duplicates, .. } => {
                assert_eq!(
                    top_duplicates.entries(),
                    &[("z".to_string(), 2), ("a".to_string(), 2)]
                );
            }
            other => panic!("unexpected metrics {:?}", other),
        }
    }
}
