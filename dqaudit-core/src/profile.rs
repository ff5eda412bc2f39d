//! Semantic type resolution for columns.
//!
//! A declared schema type wins when present. Otherwise the type is inferred
//! from the leading non-missing values: every value admits a set of candidate
//! types and the most specific type admitted by all of them is chosen.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DqAuditError, Result};
use crate::models::{BoolLiteral, Column, Number, Value, parse_datetime};

/// Semantic type family of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    String,
    Integer,
    Floating,
    DateTime,
    Boolean,
}

impl SemanticType {
    /// Most specific first.
    const SPECIFICITY: [SemanticType; 5] = [
        SemanticType::Boolean,
        SemanticType::Integer,
        SemanticType::Floating,
        SemanticType::DateTime,
        SemanticType::String,
    ];

    /// Returns the lowercase name used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::String => "string",
            SemanticType::Integer => "integer",
            SemanticType::Floating => "floating",
            SemanticType::DateTime => "datetime",
            SemanticType::Boolean => "boolean",
        }
    }

    /// Maps a declared schema type such as `VARCHAR(50)` or `INT64`.
    ///
    /// Matching ignores case, length/precision parameters and MySQL-style
    /// sign modifiers.
    ///
    /// # Errors
    /// Returns `UnsupportedType` when the name matches no known family.
    pub fn from_declared(declared: &str) -> Result<Self> {
        let normalized = normalize_declared(declared);
        let semantic = match normalized.as_str() {
            "VARCHAR" | "CHAR" | "CHARACTER" | "CHARACTER VARYING" | "VARYING CHARACTER"
            | "NATIVE CHARACTER" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "STRING"
            | "NVARCHAR" | "NCHAR" | "NTEXT" | "CLOB" | "CITEXT" | "UUID" => SemanticType::String,
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT" | "INT2"
            | "INT4" | "INT8" | "INT16" | "INT32" | "INT64" | "SERIAL" | "SMALLSERIAL"
            | "BIGSERIAL" | "BIG INT" => SemanticType::Integer,
            "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "FLOAT64" | "DOUBLE" | "DOUBLE PRECISION"
            | "NUMERIC" | "DECIMAL" | "NUMBER" | "BIGNUMERIC" | "MONEY" => SemanticType::Floating,
            "DATE" | "DATETIME" | "DATETIME2" | "SMALLDATETIME" | "DATETIMEOFFSET" | "TIMESTAMP"
            | "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" | "TIMESTAMP WITHOUT TIME ZONE"
            | "TIME" | "TIMETZ" => SemanticType::DateTime,
            "BOOL" | "BOOLEAN" | "BIT" => SemanticType::Boolean,
            _ => return Err(DqAuditError::unsupported_type(declared.trim())),
        };
        Ok(semantic)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uppercases, drops parenthesized parameters and sign modifiers, and
/// collapses whitespace.
fn normalize_declared(declared: &str) -> String {
    let mut stripped = String::with_capacity(declared.len());
    let mut depth = 0usize;
    for ch in declared.chars() {
        match ch {
            '(' => depth = depth.saturating_add(1),
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(ch),
            _ => {}
        }
    }

    stripped
        .split_whitespace()
        .map(str::to_ascii_uppercase)
        .filter(|word| !matches!(word.as_str(), "UNSIGNED" | "SIGNED" | "ZEROFILL"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Type profiling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Number of leading non-missing values inspected during inference
    pub inference_sample_size: usize,
    /// Resolve columns with no declared type and no values as strings
    pub default_to_string: bool,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            inference_sample_size: 100,
            default_to_string: false,
        }
    }
}

impl ProfileConfig {
    /// Creates a new profile config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the inference sample size (minimum 1).
    pub fn with_inference_sample_size(mut self, size: usize) -> Self {
        if size == 0 {
            tracing::warn!("inference_sample_size 0 raised to 1");
        }
        self.inference_sample_size = size.max(1);
        self
    }

    /// Builder method to fall back to string for unresolvable columns.
    pub fn with_default_to_string(mut self, enabled: bool) -> Self {
        self.default_to_string = enabled;
        self
    }
}

/// Bit set over [`SemanticType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidates(u8);

impl Candidates {
    const ALL: Candidates = Candidates(0b1_1111);

    fn bit(semantic: SemanticType) -> u8 {
        match semantic {
            SemanticType::String => 1,
            SemanticType::Integer => 1 << 1,
            SemanticType::Floating => 1 << 2,
            SemanticType::DateTime => 1 << 3,
            SemanticType::Boolean => 1 << 4,
        }
    }

    fn of(types: &[SemanticType]) -> Self {
        Candidates(types.iter().fold(0, |acc, t| acc | Self::bit(*t)))
    }

    fn contains(self, semantic: SemanticType) -> bool {
        self.0 & Self::bit(semantic) != 0
    }

    fn intersect(self, other: Candidates) -> Self {
        Candidates(self.0 & other.0)
    }

    fn most_specific(self) -> Option<SemanticType> {
        SemanticType::SPECIFICITY
            .into_iter()
            .find(|t| self.contains(*t))
    }

    /// Types a single present value admits.
    fn admitted_by(value: &Value) -> Self {
        use SemanticType::{Boolean, DateTime, Floating, Integer, String};
        match value {
            Value::Bool(_) => Self::of(&[Boolean, String]),
            Value::Int(_) => Self::of(&[Integer, Floating, String]),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                Self::of(&[Integer, Floating, String])
            }
            Value::Float(_) => Self::of(&[Floating, String]),
            Value::Timestamp(_) => Self::of(&[DateTime, String]),
            Value::Text(s) => {
                let mut admitted = Self::of(&[String]).0;
                if BoolLiteral::parse(s).is_some() {
                    admitted |= Self::bit(Boolean);
                }
                match Number::parse(s) {
                    Some(Number::Int(_)) => admitted |= Self::bit(Integer) | Self::bit(Floating),
                    Some(Number::Float(_)) => admitted |= Self::bit(Floating),
                    None => {}
                }
                if parse_datetime(s).is_some() {
                    admitted |= Self::bit(DateTime);
                }
                Candidates(admitted)
            }
            Value::Missing => Self::ALL,
        }
    }
}

/// Resolves the semantic type of columns.
#[derive(Debug, Clone, Default)]
pub struct TypeProfiler {
    config: ProfileConfig,
}

impl TypeProfiler {
    /// Creates a profiler with the given settings.
    pub fn new(config: ProfileConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    /// Resolves the semantic type of a column.
    ///
    /// # Errors
    /// `UnsupportedType` for an unknown declared type, `UnresolvedType` when
    /// there is neither a declared type nor a present value.
    pub fn resolve(&self, column: &Column) -> Result<SemanticType> {
        self.profile(&column.name, column.declared_type.as_deref(), &column.values)
    }

    /// Resolves a type from its parts. An empty declared type counts as absent.
    pub fn profile(
        &self,
        name: &str,
        declared_type: Option<&str>,
        values: &[Value],
    ) -> Result<SemanticType> {
        if let Some(declared) = declared_type.filter(|d| !d.trim().is_empty()) {
            let semantic = SemanticType::from_declared(declared)?;
            tracing::trace!("Column '{}' declared as {} ({})", name, declared, semantic);
            return Ok(semantic);
        }

        let inferred = values
            .iter()
            .filter(|v| !v.is_missing())
            .take(self.config.inference_sample_size)
            .fold(None, |acc: Option<Candidates>, value| {
                let admitted = Candidates::admitted_by(value);
                Some(acc.map_or(admitted, |c| c.intersect(admitted)))
            })
            .and_then(Candidates::most_specific);

        match inferred {
            Some(semantic) => {
                tracing::trace!("Column '{}' inferred as {}", name, semantic);
                Ok(semantic)
            }
            None if self.config.default_to_string => {
                tracing::debug!("Column '{}' has no type evidence, defaulting to string", name);
                Ok(SemanticType::String)
            }
            None => Err(DqAuditError::unresolved_type(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_declared_type_mapping() {
        let test_cases = [
            ("VARCHAR(50)", SemanticType::String),
            ("varchar", SemanticType::String),
            ("character varying(255)", SemanticType::String),
            ("STRING", SemanticType::String),
            ("INT64", SemanticType::Integer),
            ("bigint", SemanticType::Integer),
            ("INT(11) UNSIGNED", SemanticType::Integer),
            ("NUMERIC(10, 2)", SemanticType::Floating),
            ("double precision", SemanticType::Floating),
            ("FLOAT64", SemanticType::Floating),
            ("TIMESTAMP WITH TIME ZONE", SemanticType::DateTime),
            ("date", SemanticType::DateTime),
            ("BOOL", SemanticType::Boolean),
            ("bit", SemanticType::Boolean),
        ];

        for (declared, expected) in test_cases {
            assert_eq!(
                SemanticType::from_declared(declared).unwrap(),
                expected,
                "Failed for declared type {}",
                declared
            );
        }
    }

    #[test]
    fn test_unknown_declared_type() {
        let err = SemanticType::from_declared("GEOGRAPHY").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
        assert!(err.to_string().contains("GEOGRAPHY"));
    }

    #[test]
    fn test_declared_type_wins_over_values() {
        let column = Column::new("c", vec!["1", "2"]).with_declared_type("TEXT");
        let profiler = TypeProfiler::default();
        assert_eq!(profiler.resolve(&column).unwrap(), SemanticType::String);
    }

    #[test]
    fn test_inference_from_native_values() {
        let profiler = TypeProfiler::default();
        let ints = Column::new("c", vec![Value::Int(0), Value::Int(1), Value::Missing]);
        assert_eq!(profiler.resolve(&ints).unwrap(), SemanticType::Integer);

        let floats = Column::new("c", vec![Value::Float(1.0), Value::Float(2.5)]);
        assert_eq!(profiler.resolve(&floats).unwrap(), SemanticType::Floating);

        let integral_floats = Column::new("c", vec![Value::Float(1.0), Value::Float(2.0)]);
        assert_eq!(
            profiler.resolve(&integral_floats).unwrap(),
            SemanticType::Integer
        );

        let bools = Column::new("c", vec![true, false]);
        assert_eq!(profiler.resolve(&bools).unwrap(), SemanticType::Boolean);
    }

    #[test]
    fn test_inference_from_text() {
        let profiler = TypeProfiler::default();
        let test_cases: [(&[&str], SemanticType); 6] = [
            (&["yes", "no", "T"], SemanticType::Boolean),
            (&["1", "0", "1"], SemanticType::Boolean),
            (&["1", "2", "3"], SemanticType::Integer),
            (&["1", "2.5"], SemanticType::Floating),
            (&["2024-01-01", "2024-02-01 10:00:00"], SemanticType::DateTime),
            (&["alice", "2024-01-01"], SemanticType::String),
        ];

        for (values, expected) in test_cases {
            let column = Column::new("c", values.iter().copied());
            assert_eq!(
                profiler.resolve(&column).unwrap(),
                expected,
                "Failed for values {:?}",
                values
            );
        }
    }

    #[test]
    fn test_inference_limited_to_leading_values() {
        let profiler = TypeProfiler::new(ProfileConfig::new().with_inference_sample_size(2));
        let column = Column::new("c", vec!["1", "2", "not a number"]);
        assert_eq!(profiler.resolve(&column).unwrap(), SemanticType::Integer);
    }

    #[test]
    fn test_unresolved_type() {
        let profiler = TypeProfiler::default();
        let column = Column::new("empty", vec![Value::Missing, Value::Missing]);
        let err = profiler.resolve(&column).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedType);
        assert!(err.to_string().contains("empty"));

        let lenient = TypeProfiler::new(ProfileConfig::new().with_default_to_string(true));
        assert_eq!(lenient.resolve(&column).unwrap(), SemanticType::String);
    }

    #[test]
    fn test_blank_declared_type_is_inferred() {
        let profiler = TypeProfiler::default();
        let column = Column::new("c", vec![Value::Int(5)]).with_declared_type("");
        assert_eq!(profiler.resolve(&column).unwrap(), SemanticType::Integer);
    }

    #[test]
    fn test_semantic_type_serde() {
        let json = serde_json::to_string(&SemanticType::DateTime).unwrap();
        assert_eq!(json, "\"datetime\"");
    }
}
