//! SQLite connection handling.
//!
//! # Connection Modes
//! - File-based: `sqlite:///path/to/database.db`, `sqlite://./relative.db`
//!   or a bare path ending in `.db`, `.sqlite` or `.sqlite3`
//! - In-memory: `sqlite::memory:` or `:memory:`
//!
//! File databases are opened read-only and must already exist.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use url::Url;

use super::SqliteSource;
use crate::Result;
use crate::error::{DqAuditError, redact_database_url};

/// How long to wait for the database to become available.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

impl SqliteSource {
    /// Opens `table` of the SQLite database at `connection_string`.
    ///
    /// # Errors
    /// - `Configuration` when the connection string is malformed or the
    ///   table does not exist
    /// - `SourceUnavailable` when the database cannot be opened
    pub async fn connect(connection_string: &str, table: &str) -> Result<Self> {
        validate_sqlite_connection_string(connection_string)?;
        tracing::info!(
            "Opening SQLite database {} (table '{}')",
            extract_database_name(connection_string),
            table
        );
        let pool = create_sqlite_pool(connection_string).await?;
        Self::from_pool(pool, table).await
    }
}

/// Checks if a connection string addresses an in-memory database.
pub fn is_in_memory(connection_string: &str) -> bool {
    connection_string.contains(":memory:") || connection_string.contains("mode=memory")
}

/// Validates SQLite connection string format.
///
/// # Errors
/// Returns `Configuration` if the string is neither a `sqlite:` URL, a
/// database file path, nor `:memory:`.
pub fn validate_sqlite_connection_string(connection_string: &str) -> Result<()> {
    if connection_string == ":memory:" {
        return Ok(());
    }

    if connection_string.ends_with(".db")
        || connection_string.ends_with(".sqlite")
        || connection_string.ends_with(".sqlite3")
    {
        return Ok(());
    }

    if connection_string.starts_with("sqlite:") {
        if is_in_memory(connection_string) {
            return Ok(());
        }
        if let Ok(url) = Url::parse(connection_string)
            && url.scheme() != "sqlite"
        {
            return Err(DqAuditError::configuration(
                "Connection string must use sqlite:// scheme",
            ));
        }
        if connection_string.starts_with("sqlite://") {
            return Ok(());
        }
    }

    Err(DqAuditError::configuration(format!(
        "Invalid SQLite connection string '{}': expected sqlite:// URL, file path, or :memory:",
        redact_database_url(connection_string)
    )))
}

/// Extracts the database file name for log messages.
pub fn extract_database_name(connection_string: &str) -> String {
    if is_in_memory(connection_string) {
        return ":memory:".to_string();
    }

    let path = connection_string
        .strip_prefix("sqlite://")
        .unwrap_or(connection_string);
    let path = path.split('?').next().unwrap_or(path);
    match path.rsplit('/').next() {
        Some(filename) if !filename.is_empty() => filename.to_string(),
        _ => "main".to_string(),
    }
}

/// Normalizes a connection string to SQLite URL format.
pub fn normalize_connection_string(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        return "sqlite::memory:".to_string();
    }
    if connection_string.starts_with("sqlite:") {
        return connection_string.to_string();
    }
    format!("sqlite://{}", connection_string)
}

async fn create_sqlite_pool(connection_string: &str) -> Result<SqlitePool> {
    let normalized = normalize_connection_string(connection_string);
    let mut options = SqliteConnectOptions::from_str(&normalized).map_err(|e| {
        DqAuditError::configuration(format!("Invalid SQLite connection string: {}", e))
    })?;

    if !is_in_memory(connection_string) {
        options = options.read_only(true).create_if_missing(false);
    }

    SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(|e| {
            DqAuditError::source_unavailable(
                format!(
                    "Failed to open SQLite database {}",
                    redact_database_url(connection_string)
                ),
                e,
            )
        })
}
