//! Validation rules and per-value verdicts.
//!
//! A [`ValidationRule`] is immutable configuration for one type family.
//! [`ValidationRule::evaluate`] handles the missing case before dispatching to
//! the family's check, so the family checks only ever see present values and
//! a value can never be both missing and invalid.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DqAuditError, Result};
use crate::models::{BoolLiteral, Number, Value};
use crate::profile::SemanticType;

/// Default maximum string length, in characters.
pub const DEFAULT_MAX_LENGTH: usize = 255;

/// Rule type tags accepted in rule files.
pub const RULE_TYPES: [&str; 5] = ["string", "numeric", "datetime", "date_time", "boolean"];

/// Outcome of evaluating one value against a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Valid,
    Invalid(Violation),
    Missing,
}

/// Why a present value failed its rule.
///
/// The display form is the issue text recorded in reports; equal issue texts
/// denote the same violation category.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    TooLong { max_length: usize },
    PatternMismatch { pattern: String },
    NotANumber,
    NotAnInteger,
    BelowMin { min: Number },
    AboveMax { max: Number },
    NotADateTime,
    DateBefore { min: NaiveDateTime },
    DateAfter { max: NaiveDateTime },
    NotABoolean,
    LiteralNotAccepted { literal: BoolLiteral },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::TooLong { max_length } => write!(f, "Length > {}", max_length),
            Violation::PatternMismatch { pattern } => write!(f, "Pattern mismatch: {}", pattern),
            Violation::NotANumber => f.write_str("Non-numeric values"),
            Violation::NotAnInteger => f.write_str("Non-integer values"),
            Violation::BelowMin { min } => write!(f, "Values < {}", min),
            Violation::AboveMax { max } => write!(f, "Values > {}", max),
            Violation::NotADateTime => f.write_str("Unparseable date-time values"),
            Violation::DateBefore { min } => write!(f, "Dates before {}", format_bound(min)),
            Violation::DateAfter { max } => write!(f, "Dates after {}", format_bound(max)),
            Violation::NotABoolean => f.write_str("Invalid boolean values"),
            Violation::LiteralNotAccepted { literal } => {
                write!(f, "Boolean literal not accepted: {}", literal)
            }
        }
    }
}

/// Renders a date bound, omitting a midnight time component.
fn format_bound(bound: &NaiveDateTime) -> String {
    if bound.time() == NaiveTime::MIN {
        bound.format("%Y-%m-%d").to_string()
    } else {
        bound.format(crate::models::TIMESTAMP_FORMAT).to_string()
    }
}

/// Family-specific check of a present value.
trait Check {
    fn check(&self, value: &Value) -> Option<Violation>;
}

/// A full-match regular expression, kept with its source text.
#[derive(Debug, Clone)]
pub struct RulePattern {
    source: String,
    regex: Regex,
}

impl RulePattern {
    /// Compiles a pattern that must match the whole value.
    ///
    /// # Errors
    /// Returns `InvalidRule` when the pattern does not compile.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|e| {
            DqAuditError::invalid_rule(format!("pattern '{}' does not compile: {}", source, e))
        })?;
        Ok(Self { source, regex })
    }

    /// Pattern text as configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True when the whole text matches.
    pub fn is_full_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for RulePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl TryFrom<String> for RulePattern {
    type Error = DqAuditError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RulePattern> for String {
    fn from(value: RulePattern) -> Self {
        value.source
    }
}

impl Serialize for RulePattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for RulePattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Self::new(source).map_err(serde::de::Error::custom)
    }
}

fn default_max_length() -> Option<usize> {
    Some(DEFAULT_MAX_LENGTH)
}

/// String rule: maximum character length and optional full-match pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringRule {
    /// Maximum length in characters; `None` disables the check
    #[serde(default = "default_max_length")]
    pub max_length: Option<usize>,
    /// Pattern every value must match in full
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<RulePattern>,
}

impl Default for StringRule {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            pattern: None,
        }
    }
}

impl StringRule {
    /// Creates a string rule with the default length limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set or clear the length limit.
    pub fn with_max_length(mut self, max_length: Option<usize>) -> Self {
        self.max_length = max_length;
        self
    }

    /// Builder method to set the full-match pattern.
    ///
    /// # Errors
    /// Returns `InvalidRule` when the pattern does not compile.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.pattern = Some(RulePattern::new(pattern)?);
        Ok(self)
    }
}

impl Check for StringRule {
    fn check(&self, value: &Value) -> Option<Violation> {
        let text = value.as_text();
        if let Some(max_length) = self.max_length
            && text.chars().count() > max_length
        {
            return Some(Violation::TooLong { max_length });
        }
        match &self.pattern {
            Some(pattern) if !pattern.is_full_match(&text) => Some(Violation::PatternMismatch {
                pattern: pattern.as_str().to_string(),
            }),
            _ => None,
        }
    }
}

/// Numeric rule: inclusive bounds and an optional integral requirement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NumericRule {
    /// Inclusive lower bound; `None` is unbounded, or `i64::MIN` when
    /// `integer_only` is set
    #[serde(default)]
    pub min_value: Option<Number>,
    /// Inclusive upper bound; `None` is unbounded, or `i64::MAX` when
    /// `integer_only` is set
    #[serde(default)]
    pub max_value: Option<Number>,
    /// Reject values with a fractional component
    #[serde(default)]
    pub integer_only: bool,
}

impl NumericRule {
    /// Creates an unbounded numeric rule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default rule for integer columns: signed 64-bit range, integral only.
    pub fn integer_default() -> Self {
        Self {
            min_value: Some(Number::Int(i128::from(i64::MIN))),
            max_value: Some(Number::Int(i128::from(i64::MAX))),
            integer_only: true,
        }
    }

    /// Default rule for floating columns: finite double range.
    pub fn floating_default() -> Self {
        Self {
            min_value: Some(Number::Float(f64::MIN)),
            max_value: Some(Number::Float(f64::MAX)),
            integer_only: false,
        }
    }

    /// Builder method to set the inclusive range.
    pub fn with_range(mut self, min_value: Option<Number>, max_value: Option<Number>) -> Self {
        self.min_value = min_value;
        self.max_value = max_value;
        self
    }

    /// Builder method to require integral values.
    pub fn with_integer_only(mut self, integer_only: bool) -> Self {
        self.integer_only = integer_only;
        self
    }

    /// Lower bound in force, filling in the 64-bit limit for integer rules.
    pub fn effective_min(&self) -> Option<Number> {
        self.min_value
            .or_else(|| self.integer_only.then_some(Number::Int(i128::from(i64::MIN))))
    }

    /// Upper bound in force, filling in the 64-bit limit for integer rules.
    pub fn effective_max(&self) -> Option<Number> {
        self.max_value
            .or_else(|| self.integer_only.then_some(Number::Int(i128::from(i64::MAX))))
    }

    fn validate(&self) -> Result<()> {
        for bound in [self.min_value, self.max_value].into_iter().flatten() {
            if let Number::Float(f) = bound
                && f.is_nan()
            {
                return Err(DqAuditError::invalid_rule("numeric bound is NaN"));
            }
        }
        if let (Some(min), Some(max)) = (self.effective_min(), self.effective_max())
            && min.cmp_exact(&max).is_gt()
        {
            return Err(DqAuditError::invalid_rule(format!(
                "min_value {} is greater than max_value {}",
                min, max
            )));
        }
        Ok(())
    }
}

impl Check for NumericRule {
    fn check(&self, value: &Value) -> Option<Violation> {
        let Some(number) = value.as_number() else {
            return Some(Violation::NotANumber);
        };
        if let Some(min) = self.effective_min()
            && number.cmp_exact(&min).is_lt()
        {
            return Some(Violation::BelowMin { min });
        }
        if let Some(max) = self.effective_max()
            && number.cmp_exact(&max).is_gt()
        {
            return Some(Violation::AboveMax { max });
        }
        if self.integer_only && !number.is_integral() {
            return Some(Violation::NotAnInteger);
        }
        None
    }
}

fn default_min_date() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1900, 1, 1).map(|d| d.and_time(NaiveTime::MIN))
}

fn default_max_date() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2100, 1, 1).map(|d| d.and_time(NaiveTime::MIN))
}

/// Serde adapter for date bounds written as dates or date-times.
mod date_bound {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::models::{TIMESTAMP_FORMAT, parse_datetime};

    pub(super) fn serialize<S: Serializer>(
        bound: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bound {
            Some(ts) => serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| {
                parse_datetime(&text)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid date bound '{}'", text)))
            })
            .transpose()
    }
}

/// Date-time rule: inclusive bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateTimeRule {
    /// Earliest accepted instant; `None` is unbounded
    #[serde(default = "default_min_date", with = "date_bound")]
    pub min_date: Option<NaiveDateTime>,
    /// Latest accepted instant; `None` is unbounded
    #[serde(default = "default_max_date", with = "date_bound")]
    pub max_date: Option<NaiveDateTime>,
}

impl Default for DateTimeRule {
    fn default() -> Self {
        Self {
            min_date: default_min_date(),
            max_date: default_max_date(),
        }
    }
}

impl DateTimeRule {
    /// Creates a rule with the default 1900-01-01 to 2100-01-01 window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the inclusive window.
    pub fn with_range(
        mut self,
        min_date: Option<NaiveDateTime>,
        max_date: Option<NaiveDateTime>,
    ) -> Self {
        self.min_date = min_date;
        self.max_date = max_date;
        self
    }

    fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_date, self.max_date)
            && min > max
        {
            return Err(DqAuditError::invalid_rule(format!(
                "min_date {} is after max_date {}",
                format_bound(&min),
                format_bound(&max)
            )));
        }
        Ok(())
    }
}

impl Check for DateTimeRule {
    fn check(&self, value: &Value) -> Option<Violation> {
        let Some(ts) = value.as_timestamp() else {
            return Some(Violation::NotADateTime);
        };
        match (self.min_date, self.max_date) {
            (Some(min), _) if ts < min => Some(Violation::DateBefore { min }),
            (_, Some(max)) if ts > max => Some(Violation::DateAfter { max }),
            _ => None,
        }
    }
}

fn default_literals() -> BTreeSet<BoolLiteral> {
    BoolLiteral::ALL.into_iter().collect()
}

/// Boolean rule: the set of accepted normalized literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanRule {
    /// Accepted literals (default: all recognized literals)
    #[serde(default = "default_literals")]
    pub accepted_literals: BTreeSet<BoolLiteral>,
}

impl Default for BooleanRule {
    fn default() -> Self {
        Self {
            accepted_literals: default_literals(),
        }
    }
}

impl BooleanRule {
    /// Creates a rule accepting every recognized literal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to restrict the accepted literals.
    pub fn with_accepted_literals(mut self, literals: impl IntoIterator<Item = BoolLiteral>) -> Self {
        self.accepted_literals = literals.into_iter().collect();
        self
    }
}

impl Check for BooleanRule {
    fn check(&self, value: &Value) -> Option<Violation> {
        match value.as_bool_literal() {
            None => Some(Violation::NotABoolean),
            Some(literal) if !self.accepted_literals.contains(&literal) => {
                Some(Violation::LiteralNotAccepted { literal })
            }
            Some(_) => None,
        }
    }
}

/// Validation rule for one type family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ValidationRule {
    String(StringRule),
    Numeric(NumericRule),
    #[serde(alias = "date_time")]
    DateTime(DateTimeRule),
    Boolean(BooleanRule),
}

impl ValidationRule {
    /// Default rule for a resolved semantic type.
    pub fn default_for(semantic: SemanticType) -> Self {
        match semantic {
            SemanticType::String => ValidationRule::String(StringRule::default()),
            SemanticType::Integer => ValidationRule::Numeric(NumericRule::integer_default()),
            SemanticType::Floating => ValidationRule::Numeric(NumericRule::floating_default()),
            SemanticType::DateTime => ValidationRule::DateTime(DateTimeRule::default()),
            SemanticType::Boolean => ValidationRule::Boolean(BooleanRule::default()),
        }
    }

    /// Family name, as used for the `type` tag.
    pub fn family(&self) -> &'static str {
        match self {
            ValidationRule::String(_) => "string",
            ValidationRule::Numeric(_) => "numeric",
            ValidationRule::DateTime(_) => "datetime",
            ValidationRule::Boolean(_) => "boolean",
        }
    }

    /// Checks that the rule's own constraints are consistent.
    ///
    /// # Errors
    /// Returns `InvalidRule` for inverted ranges, NaN bounds or an empty
    /// accepted-literal set.
    pub fn validate(&self) -> Result<()> {
        match self {
            ValidationRule::String(_) => Ok(()),
            ValidationRule::Numeric(rule) => rule.validate(),
            ValidationRule::DateTime(rule) => rule.validate(),
            ValidationRule::Boolean(rule) if rule.accepted_literals.is_empty() => Err(
                DqAuditError::invalid_rule("accepted_literals must not be empty"),
            ),
            ValidationRule::Boolean(_) => Ok(()),
        }
    }

    /// Evaluates one value.
    pub fn evaluate(&self, value: &Value) -> Verdict {
        if value.is_missing() {
            return Verdict::Missing;
        }
        let violation = match self {
            ValidationRule::String(rule) => rule.check(value),
            ValidationRule::Numeric(rule) => rule.check(value),
            ValidationRule::DateTime(rule) => rule.check(value),
            ValidationRule::Boolean(rule) => rule.check(value),
        };
        violation.map_or(Verdict::Valid, Verdict::Invalid)
    }
}

impl From<StringRule> for ValidationRule {
    fn from(rule: StringRule) -> Self {
        ValidationRule::String(rule)
    }
}

impl From<NumericRule> for ValidationRule {
    fn from(rule: NumericRule) -> Self {
        ValidationRule::Numeric(rule)
    }
}

impl From<DateTimeRule> for ValidationRule {
    fn from(rule: DateTimeRule) -> Self {
        ValidationRule::DateTime(rule)
    }
}

impl From<BooleanRule> for ValidationRule {
    fn from(rule: BooleanRule) -> Self {
        ValidationRule::Boolean(rule)
    }
}

/// Rules keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: BTreeMap<String, ValidationRule>,
}

impl RuleSet {
    /// Creates an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a rule for a column.
    pub fn with_rule(mut self, column: impl Into<String>, rule: impl Into<ValidationRule>) -> Self {
        self.insert(column, rule);
        self
    }

    /// Adds or replaces the rule for a column.
    pub fn insert(&mut self, column: impl Into<String>, rule: impl Into<ValidationRule>) {
        self.rules.insert(column.into(), rule.into());
    }

    /// Rule configured for a column.
    pub fn get(&self, column: &str) -> Option<&ValidationRule> {
        self.rules.get(column)
    }

    /// Iterates over rules in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ValidationRule)> {
        self.rules.iter()
    }

    /// Columns that have a rule.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Number of configured rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Parses a rule set from a JSON object of column name to tagged rule.
    ///
    /// ```rust
    /// use dqaudit_core::rules::RuleSet;
    ///
    /// let rules = RuleSet::from_json_str(
    ///     r#"{"email": {"type": "string", "max_length": 100}}"#,
    /// ).unwrap();
    /// assert_eq!(rules.len(), 1);
    /// ```
    ///
    /// # Errors
    /// `UnsupportedType` for an unknown `type` tag, `InvalidRule` for a
    /// malformed or contradictory rule, `Serialization` for invalid JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| DqAuditError::serialization("Failed to parse rule set", e))?;

        let mut rules = BTreeMap::new();
        for (column, raw_rule) in raw {
            let tag = raw_rule
                .get("type")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| {
                    DqAuditError::invalid_rule(format!(
                        "rule for column '{}' has no \"type\" tag",
                        column
                    ))
                })?;
            if !RULE_TYPES.contains(&tag) {
                return Err(DqAuditError::unsupported_type(tag));
            }

            let rule: ValidationRule = serde_json::from_value(raw_rule).map_err(|e| {
                DqAuditError::invalid_rule(format!("rule for column '{}': {}", column, e))
            })?;
            rule.validate()?;
            rules.insert(column, rule);
        }

        tracing::debug!("Loaded {} validation rules", rules.len());
        Ok(Self { rules })
    }

    /// Reads a rule set from a JSON file.
    ///
    /// # Errors
    /// `Io` when the file cannot be read, otherwise as [`RuleSet::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DqAuditError::io(format!("Failed to read rule file {}", path.display()), e)
        })?;
        Self::from_json_str(&contents)
    }
}

impl FromIterator<(String, ValidationRule)> for RuleSet {
    fn from_iter<I: IntoIterator<Item = (String, ValidationRule)>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}
