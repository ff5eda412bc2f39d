//! Completeness analysis: missing-value accounting per column.

use crate::models::{Column, MissingMask};

use super::models::ColumnResult;

/// Computes completeness of a column.
///
/// Empty strings are present values; only [`crate::models::Value::is_missing`]
/// positions count as missing.
pub fn check_completeness(column: &Column) -> ColumnResult {
    completeness_from_mask(&column.missing_mask())
}

/// Computes completeness from a precomputed missing mask.
pub fn completeness_from_mask(mask: &MissingMask) -> ColumnResult {
    ColumnResult::completeness(mask.len() as u64, mask.missing_count() as u64)
}

/// Builds completeness from counts aggregated by the source.
pub fn completeness_from_counts(total: u64, missing: u64) -> ColumnResult {
    ColumnResult::completeness(total, missing)
}
