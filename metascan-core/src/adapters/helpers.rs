//! Driver-neutral result rows.
//!
//! Every driver hands back rows as ordered `(column, text value)` pairs.
//! Metadata and statistics queries are executed through the text protocol,
//! so each value arrives as its textual rendering and is parsed here.

use super::MetadataConnection;
use crate::Result;

/// One result row with case-insensitive column access.
///
/// # Example
/// ```rust
/// use metascan_core::adapters::QueryRow;
///
/// let row = QueryRow::default()
///     .with("TABLE_NAME", Some("users"))
///     .with("table_rows", Some("42"));
///
/// assert_eq!(row.get_str("table_name"), Some("users"));
/// assert_eq!(row.get_i64("TABLE_ROWS"), Some(42));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRow {
    columns: Vec<(String, Option<String>)>,
}

impl QueryRow {
    /// Creates a row from ordered column/value pairs.
    pub fn new(columns: Vec<(String, Option<String>)>) -> Self {
        Self { columns }
    }

    /// Appends a column; convenient for building fixtures.
    pub fn with(mut self, column: impl Into<String>, value: Option<&str>) -> Self {
        self.columns.push((column.into(), value.map(ToString::to_string)));
        self
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True for a row without columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Text value of a column, matched case-insensitively. SQL NULL and
    /// missing columns both yield `None`.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .and_then(|(_, value)| value.as_deref())
    }

    /// Owned text value of a column.
    pub fn get_string(&self, column: &str) -> Option<String> {
        self.get_str(column).map(ToString::to_string)
    }

    /// Integer value of a column; see [`parse_i64`].
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get_str(column).and_then(parse_i64)
    }

    /// Integer value narrowed to `i32`; out-of-range values yield `None`.
    pub fn get_i32(&self, column: &str) -> Option<i32> {
        self.get_i64(column).and_then(|v| i32::try_from(v).ok())
    }

    /// Floating-point value of a column.
    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get_str(column).and_then(parse_f64)
    }

    /// Boolean value of a column (`1`/`0`, `t`/`f`, `true`/`false`,
    /// `yes`/`no`).
    pub fn get_bool(&self, column: &str) -> Option<bool> {
        match self.get_str(column)?.trim().to_ascii_lowercase().as_str() {
            "1" | "t" | "true" | "yes" | "y" => Some(true),
            "0" | "f" | "false" | "no" | "n" => Some(false),
            _ => None,
        }
    }
}

/// Runs a statement and returns its first row, if any.
pub async fn fetch_first(
    connection: &mut dyn MetadataConnection,
    sql: &str,
) -> Result<Option<QueryRow>> {
    Ok(connection.query(sql).await?.into_iter().next())
}

/// Parses an integer rendering. Decimal renderings such as `"42.0"` (from
/// NUMBER or NUMERIC columns) are truncated toward zero.
pub fn parse_i64(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>().ok().or_else(|| {
        parse_f64(text)
            .filter(|v| v.is_finite() && v.abs() < 9.2e18)
            .map(|v| v.trunc() as i64)
    })
}

/// Parses a floating-point rendering.
pub fn parse_f64(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let row = QueryRow::default()
            .with("COLUMN_NAME", Some("id"))
            .with("REMARKS", None);
        assert_eq!(row.get_str("column_name"), Some("id"));
        assert_eq!(row.get_str("remarks"), None);
        assert_eq!(row.get_str("missing"), None);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_numeric_parsing() {
        let row = QueryRow::default()
            .with("a", Some(" 12 "))
            .with("b", Some("33.3333"))
            .with("c", Some("3000000000"))
            .with("d", Some("abc"));
        assert_eq!(row.get_i64("a"), Some(12));
        assert_eq!(row.get_i64("b"), Some(33));
        assert_eq!(row.get_f64("b"), Some(33.3333));
        assert_eq!(row.get_i32("c"), None);
        assert_eq!(row.get_i64("d"), None);
        assert_eq!(parse_i64("-127"), Some(-127));
    }

    #[test]
    fn test_bool_parsing() {
        let row = QueryRow::default()
            .with("pg", Some("t"))
            .with("mssql", Some("0"))
            .with("odd", Some("maybe"));
        assert_eq!(row.get_bool("pg"), Some(true));
        assert_eq!(row.get_bool("mssql"), Some(false));
        assert_eq!(row.get_bool("odd"), None);
    }
}
