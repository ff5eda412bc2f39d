//! Property tests for the count invariants of every check.

use dqaudit_core::quality::{
    Metrics, check_completeness, check_uniqueness_with, check_validity_with,
};
use dqaudit_core::{Column, NumericRule, SemanticType, StringRule, ValidationRule, Value};
use proptest::prelude::*;

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Missing),
        Just(Value::Float(f64::NAN)),
        any::<i64>().prop_map(Value::from),
        (-1.0e6..1.0e6f64).prop_map(Value::Float),
        "[a-z0-9]{0,8}".prop_map(Value::from),
    ]
}

fn rule_strategy() -> impl Strategy<Value = ValidationRule> {
    prop_oneof![
        (1usize..6).prop_map(|n| ValidationRule::from(StringRule::new().with_max_length(Some(n)))),
        Just(ValidationRule::from(NumericRule::integer_default())),
        Just(ValidationRule::from(NumericRule::floating_default())),
    ]
}

proptest! {
    #[test]
    fn completeness_counts_add_up(values in prop::collection::vec(value_strategy(), 0..64)) {
        let column = Column::new("c", values);
        let result = check_completeness(&column);
        prop_assert_eq!(result.total, column.len() as u64);
        match &result.metrics {
            Metrics::Completeness { present, completeness_rate } => {
                prop_assert_eq!(present + result.missing, result.total);
                prop_assert!((0.0..=100.0).contains(completeness_rate));
                if result.total == 0 {
                    prop_assert_eq!(*completeness_rate, 0.0);
                }
            }
            other => prop_assert!(false, "unexpected metrics {:?}", other),
        }
    }

    #[test]
    fn validity_partitions_present_values(
        values in prop::collection::vec(value_strategy(), 0..64),
        rule in rule_strategy(),
    ) {
        let column = Column::new("c", values);
        let mask = column.missing_mask();
        let result = check_validity_with(&column, &mask, &rule).unwrap();
        match &result.metrics {
            Metrics::Validity { valid, invalid, validity_rate, .. } => {
                prop_assert_eq!(valid + invalid, result.present());
                prop_assert_eq!(result.missing, mask.missing_count() as u64);
                if result.present() == 0 {
                    prop_assert_eq!(*validity_rate, 0.0);
                }
            }
            other => prop_assert!(false, "unexpected metrics {:?}", other),
        }
    }

    #[test]
    fn uniqueness_counts_add_up(
        values in prop::collection::vec(value_strategy(), 0..64),
        top_k in 1usize..8,
    ) {
        let column = Column::new("c", values);
        let result = check_uniqueness_with(&column, SemanticType::String, top_k);
        match &result.metrics {
            Metrics::Uniqueness { unique_count, duplicate_count, top_duplicates, .. } => {
                prop_assert_eq!(unique_count + duplicate_count, result.total);
                prop_assert_eq!(result.total + result.missing, column.len() as u64);
                prop_assert!(top_duplicates.len() <= top_k);
                let counts: Vec<u64> = top_duplicates.entries().iter().map(|(_, c)| *c).collect();
                prop_assert!(counts.windows(2).all(|w| w[0] >= w[1]));
                prop_assert!(counts.iter().all(|c| *c > 1));
            }
            other => prop_assert!(false, "unexpected metrics {:?}", other),
        }
    }
}
