//! Validity analysis: rule evaluation over present values.

use crate::error::Result;
use crate::models::{Column, MissingMask};
use crate::profile::SemanticType;
use crate::rules::{ValidationRule, Verdict};

use super::models::ColumnResult;

/// Evaluates `rule` against every present value of `column`.
///
/// # Errors
/// Returns `InvalidRule` when the rule's own constraints are contradictory.
pub fn check_validity(column: &Column, rule: &ValidationRule) -> Result<ColumnResult> {
    check_validity_with(column, &column.missing_mask(), rule)
}

/// Evaluates the default rule of `semantic` against `column`.
pub fn check_validity_default(column: &Column, semantic: SemanticType) -> Result<ColumnResult> {
    check_validity(column, &ValidationRule::default_for(semantic))
}

/// Evaluates `rule` using a missing mask already computed for `column`.
///
/// Masked positions are counted as missing and never reach the rule.
pub fn check_validity_with(
    column: &Column,
    mask: &MissingMask,
    rule: &ValidationRule,
) -> Result<ColumnResult> {
    rule.validate()?;

    let mut valid: u64 = 0;
    let mut invalid: u64 = 0;
    let mut issues: Vec<String> = Vec::new();

    for (index, value) in column.values.iter().enumerate() {
        if mask.is_missing(index) {
            continue;
        }
        match rule.evaluate(value) {
            Verdict::Valid => valid += 1,
            Verdict::Invalid(violation) => {
                invalid += 1;
                let issue = violation.to_string();
                if !issues.contains(&issue) {
                    issues.push(issue);
                }
            }
            // The mask is built from the same predicate evaluate() uses
            Verdict::Missing => {}
        }
    }

    tracing::trace!(
        "Validity of '{}' ({} rule): {} valid, {} invalid",
        column.name,
        rule.family(),
        valid,
        invalid
    );

    Ok(ColumnResult::validity(
        mask.len() as u64,
        mask.missing_count() as u64,
        valid,
        invalid,
        issues,
    ))
}
