//! SQL text for SQLite sources.
//!
//! Identifiers are double-quoted with embedded quotes doubled; PRAGMA
//! arguments are single-quoted the same way. Row limits and percentages are
//! bound as parameters.

use crate::sampling::SamplingMethod;

/// Quotes an identifier for SQLite.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column listing with declared types.
pub fn table_info(table: &str) -> String {
    format!("PRAGMA table_info('{}')", table.replace('\'', "''"))
}

/// Row count, optionally restricted to rows where `null_column` is NULL.
pub fn count_rows(table: &str, null_column: Option<&str>) -> String {
    match null_column {
        Some(column) => format!(
            "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
            quote_identifier(table),
            quote_identifier(column)
        ),
        None => format!("SELECT COUNT(*) FROM {}", quote_identifier(table)),
    }
}

/// Every row of the given columns.
pub fn select_columns(table: &str, columns: &[&str]) -> String {
    format!(
        "SELECT {} FROM {}",
        column_list(columns),
        quote_identifier(table)
    )
}

/// Occurrence count per distinct value, in first-seen row order.
pub fn group_counts(table: &str, column: &str) -> String {
    let column = quote_identifier(column);
    format!(
        "SELECT {column}, COUNT(*) FROM {} GROUP BY {column} ORDER BY MIN(rowid)",
        quote_identifier(table)
    )
}

/// Missing, present and distinct counts of one column, in that order.
pub fn distinct_stats(table: &str, column: &str) -> String {
    let column = quote_identifier(column);
    format!(
        "SELECT COUNT(*) - COUNT({column}), COUNT({column}), COUNT(DISTINCT {column}) FROM {}",
        quote_identifier(table)
    )
}

/// Present values occurring more than once, most frequent first with ties
/// in first-seen row order. Binds the row limit.
pub fn top_repeated(table: &str, column: &str) -> String {
    let column = quote_identifier(column);
    format!(
        "SELECT {column}, COUNT(*) FROM {} WHERE {column} IS NOT NULL GROUP BY {column} \
         HAVING COUNT(*) > 1 ORDER BY COUNT(*) DESC, MIN(rowid) LIMIT ?",
        quote_identifier(table)
    )
}

/// Sample query. Binds the percentage (for percentage sampling) and then the
/// row limit.
pub fn sample(table: &str, columns: &[&str], method: &SamplingMethod) -> String {
    let select = select_columns(table, columns);
    match method {
        SamplingMethod::Limit => format!("{} LIMIT ?", select),
        SamplingMethod::Random => format!("{} ORDER BY RANDOM() LIMIT ?", select),
        SamplingMethod::Percentage { .. } => {
            format!("{} WHERE abs(random()) % 100 < ? LIMIT ?", select)
        }
    }
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "\"users\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_table_info_escapes_quotes() {
        assert_eq!(table_info("o'brien"), "PRAGMA table_info('o''brien')");
    }

    #[test]
    fn test_count_queries() {
        assert_eq!(count_rows("t", None), "SELECT COUNT(*) FROM \"t\"");
        assert_eq!(
            count_rows("t", Some("email")),
            "SELECT COUNT(*) FROM \"t\" WHERE \"email\" IS NULL"
        );
    }

    #[test]
    fn test_group_counts_query() {
        assert_eq!(
            group_counts("t", "code"),
            "SELECT \"code\", COUNT(*) FROM \"t\" GROUP BY \"code\" ORDER BY MIN(rowid)"
        );
    }

    #[test]
    fn test_distinct_queries() {
        assert_eq!(
            distinct_stats("t", "code"),
            "SELECT COUNT(*) - COUNT(\"code\"), COUNT(\"code\"), COUNT(DISTINCT \"code\") FROM \"t\""
        );
        assert_eq!(
            top_repeated("t", "code"),
            "SELECT \"code\", COUNT(*) FROM \"t\" WHERE \"code\" IS NOT NULL GROUP BY \"code\" \
             HAVING COUNT(*) > 1 ORDER BY COUNT(*) DESC, MIN(rowid) LIMIT ?"
        );
    }

    #[test]
    fn test_sample_queries() {
        let columns = ["id", "name"];
        assert_eq!(
            sample("t", &columns, &SamplingMethod::Limit),
            "SELECT \"id\", \"name\" FROM \"t\" LIMIT ?"
        );
        assert_eq!(
            sample("t", &columns, &SamplingMethod::Random),
            "SELECT \"id\", \"name\" FROM \"t\" ORDER BY RANDOM() LIMIT ?"
        );
        assert_eq!(
            sample("t", &columns, &SamplingMethod::Percentage { percent: 10.0 }),
            "SELECT \"id\", \"name\" FROM \"t\" WHERE abs(random()) % 100 < ? LIMIT ?"
        );
    }
}
