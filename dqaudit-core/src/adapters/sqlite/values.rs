//! Conversion of SQLite cells into engine values.
//!
//! SQLite is dynamically typed, so the storage class of each cell decides
//! the conversion rather than the declared column type. BLOBs become
//! `base64:`-prefixed text; TEXT that is not valid UTF-8 is decoded lossily
//! so the value still reaches the validity rules.

use base64::Engine;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};

use crate::error::{DqAuditError, Result};
use crate::models::Value;

/// Reads the cell at `index` of `row`.
///
/// # Errors
/// Returns `SourceUnavailable` when the cell cannot be decoded.
pub fn extract_value(row: &SqliteRow, index: usize) -> Result<Value> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| DqAuditError::source_unavailable("Failed to read SQLite cell", e))?;
    if raw.is_null() {
        return Ok(Value::Missing);
    }
    let storage_class = raw.type_info().name().to_ascii_uppercase();

    let decoded = match storage_class.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(index).map(Value::from),
        "REAL" => row.try_get_unchecked::<f64, _>(index).map(Value::Float),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| Value::Text(encode_blob(&bytes))),
        _ => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| Value::Text(decode_text(bytes))),
    };

    decoded.map_err(|e| {
        DqAuditError::source_unavailable(
            format!("Failed to decode SQLite {} cell", storage_class),
            e,
        )
    })
}

/// Decodes TEXT bytes, replacing invalid UTF-8 sequences with U+FFFD.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("TEXT cell is not valid UTF-8; decoding lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

/// Renders BLOB bytes as `base64:<standard encoding>`.
pub fn encode_blob(bytes: &[u8]) -> String {
    format!(
        "base64:{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}
