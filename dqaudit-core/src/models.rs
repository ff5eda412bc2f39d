//! Core data model: cell values, columns and the shared missing mask.
//!
//! [`Value::is_missing`] is the only missing-detection predicate in the
//! engine. Completeness and validity both consume a [`MissingMask`] built
//! from it, so the two checks can never disagree on which positions are
//! missing.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Rendering used for timestamps in text form.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Naive date-time layouts accepted when parsing text, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Date-only layouts accepted when parsing text.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// A single cell of a column.
///
/// `Int` is wider than 64 bits so that values outside the BIGINT range stay
/// representable and can be judged invalid instead of being lost on load.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit missing marker (SQL NULL, JSON null)
    Missing,
    Bool(bool),
    Int(i128),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Returns true for the missing marker and for floating NaN.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Canonical text rendering of a present value.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Text(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Numeric view of the value, parsing text when needed.
    ///
    /// Non-finite text (`"NaN"`, `"inf"`) does not count as a number.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) if !f.is_nan() => Some(Number::Float(*f)),
            Value::Text(s) => Number::parse(s),
            _ => None,
        }
    }

    /// Date-time view of the value, parsing text when needed.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(s) => parse_datetime(s),
            _ => None,
        }
    }

    /// Boolean literal view of the value after normalization.
    pub fn as_bool_literal(&self) -> Option<BoolLiteral> {
        match self {
            Value::Bool(true) => Some(BoolLiteral::True),
            Value::Bool(false) => Some(BoolLiteral::False),
            Value::Int(1) => Some(BoolLiteral::One),
            Value::Int(0) => Some(BoolLiteral::Zero),
            Value::Float(f) if *f == 1.0 => Some(BoolLiteral::One),
            Value::Float(f) if *f == 0.0 => Some(BoolLiteral::Zero),
            Value::Text(s) => BoolLiteral::parse(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Missing,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i128::from(i))
                } else if let Some(u) = n.as_u64() {
                    Value::Int(i128::from(u))
                } else {
                    n.as_f64().map_or(Value::Missing, Value::Float)
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(i128::from(value))
    }
}

impl From<i128> for Value {
    fn from(value: i128) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Missing, Into::into)
    }
}

/// A numeric quantity that compares exactly across integer and float forms.
///
/// Deserializes from JSON numbers or from numeric strings; JSON integers
/// beyond the 64-bit range arrive as floats, so exact wide bounds are
/// written as strings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i128),
    Float(f64),
}

/// 2^127, the first float magnitude outside the i128 range.
const I128_EDGE: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

impl Number {
    /// Parses an integer or finite float literal.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if let Ok(i) = trimmed.parse::<i128>() {
            return Some(Number::Int(i));
        }
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Number::Float)
    }

    /// True when the quantity has no fractional component.
    pub fn is_integral(&self) -> bool {
        match self {
            Number::Int(_) => true,
            Number::Float(f) => f.is_finite() && f.fract() == 0.0,
        }
    }

    /// Returns the integer form when the value is integral and fits i128.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Number::Int(i) => Some(*i),
            Number::Float(f) if self.is_integral() && f.abs() < I128_EDGE => Some(*f as i128),
            Number::Float(_) => None,
        }
    }

    /// Total order between two numbers without rounding through f64.
    ///
    /// NaN sorts above every other value; rule validation rejects NaN bounds.
    pub fn cmp_exact(&self, other: &Number) -> Ordering {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(b),
            (Number::Int(a), Number::Float(b)) => cmp_int_float(*a, *b),
            (Number::Float(a), Number::Int(b)) => cmp_int_float(*b, *a).reverse(),
            (Number::Float(a), Number::Float(b)) => a.total_cmp(b),
        }
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NumberVisitor)
    }
}

struct NumberVisitor;

impl Visitor<'_> for NumberVisitor {
    type Value = Number;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Number, E> {
        Ok(Number::Int(i128::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Number, E> {
        Ok(Number::Int(i128::from(v)))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<Number, E> {
        Ok(Number::Int(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Number, E> {
        Ok(i128::try_from(v).map_or(Number::Float(v as f64), Number::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Number, E> {
        Ok(Number::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Number, E> {
        Number::parse(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

fn cmp_int_float(int: i128, float: f64) -> Ordering {
    if float.is_nan() || float >= I128_EDGE {
        return Ordering::Less;
    }
    if float < -I128_EDGE {
        return Ordering::Greater;
    }
    let floor = float.floor();
    let floor_int = floor as i128;
    match int.cmp(&floor_int) {
        Ordering::Equal if float > floor => Ordering::Less,
        other => other,
    }
}

/// Recognized boolean spellings, compared case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoolLiteral {
    #[serde(rename = "true")]
    True,
    #[serde(rename = "false")]
    False,
    #[serde(rename = "1")]
    One,
    #[serde(rename = "0")]
    Zero,
    #[serde(rename = "yes")]
    Yes,
    #[serde(rename = "no")]
    No,
    #[serde(rename = "t")]
    T,
    #[serde(rename = "f")]
    F,
}

impl BoolLiteral {
    /// Every recognized literal.
    pub const ALL: [BoolLiteral; 8] = [
        BoolLiteral::True,
        BoolLiteral::False,
        BoolLiteral::One,
        BoolLiteral::Zero,
        BoolLiteral::Yes,
        BoolLiteral::No,
        BoolLiteral::T,
        BoolLiteral::F,
    ];

    /// Parses a literal, ignoring case and surrounding whitespace.
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|literal| literal.as_str() == normalized)
    }

    /// Normalized spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            BoolLiteral::True => "true",
            BoolLiteral::False => "false",
            BoolLiteral::One => "1",
            BoolLiteral::Zero => "0",
            BoolLiteral::Yes => "yes",
            BoolLiteral::No => "no",
            BoolLiteral::T => "t",
            BoolLiteral::F => "f",
        }
    }

    /// Truth value denoted by the literal.
    pub fn truth(&self) -> bool {
        matches!(
            self,
            BoolLiteral::True | BoolLiteral::One | BoolLiteral::Yes | BoolLiteral::T
        )
    }
}

impl fmt::Display for BoolLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a date-time from text (RFC 3339, common naive layouts, or a bare date).
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }
    DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(trimmed, format)
            .ok()
            .map(|date| date.and_time(NaiveTime::MIN))
    })
}

/// A named, ordered sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Type as declared by the source schema (e.g. `VARCHAR(50)`), if any
    pub declared_type: Option<String>,
    /// Ordered cell values
    pub values: Vec<Value>,
}

impl Column {
    /// Creates a column without a declared type.
    pub fn new<V: Into<Value>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Builder method to set the declared schema type.
    pub fn with_declared_type(mut self, declared_type: impl Into<String>) -> Self {
        self.declared_type = Some(declared_type.into());
        self
    }

    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Computes the missing mask of this column.
    pub fn missing_mask(&self) -> MissingMask {
        MissingMask::of(&self.values)
    }
}

/// Per-position missing flags, computed once and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingMask {
    flags: Vec<bool>,
    missing: usize,
}

impl MissingMask {
    /// Builds the mask from [`Value::is_missing`].
    pub fn of(values: &[Value]) -> Self {
        let flags: Vec<bool> = values.iter().map(Value::is_missing).collect();
        let missing = flags.iter().filter(|&&m| m).count();
        Self { flags, missing }
    }

    /// Number of positions covered.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// True when the mask covers no positions.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Whether position `index` is missing. Out-of-range positions are not.
    pub fn is_missing(&self, index: usize) -> bool {
        self.flags.get(index).copied().unwrap_or(false)
    }

    /// Count of missing positions.
    pub fn missing_count(&self) -> usize {
        self.missing
    }

    /// Count of present positions.
    pub fn present_count(&self) -> usize {
        self.flags.len().saturating_sub(self.missing)
    }

    /// Iterates over the flags in row order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.flags.iter().copied()
    }
}
