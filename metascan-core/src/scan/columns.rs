//! Column introspection and decimal normalization.

use super::report::{StatisticKind, StatisticsReport};
use super::type_map::TypeMap;
use crate::Result;
use crate::adapters::{DialectStrategy, MetadataConnection, QueryRow};
use crate::models::{ColumnFacts, ColumnSnapshot};
use tracing::{debug, warn};

/// Largest length kept for decimal-family columns.
pub const MAX_DECIMAL_LENGTH: i32 = 38;

/// Largest precision kept for decimal-family columns.
pub const MAX_DECIMAL_PRECISION: i32 = 18;

/// Precision reported for `NUMBER` declared without precision or scale.
pub const UNBOUNDED_PRECISION: i32 = -127;

/// Removes a parenthesized suffix: `VARCHAR(255)` becomes `VARCHAR`.
pub fn strip_type_suffix(type_name: &str) -> String {
    type_name
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// True for `decimal`, `numeric` and `number`, case-insensitively.
pub fn is_decimal_family(field_type: &str) -> bool {
    ["decimal", "numeric", "number"]
        .iter()
        .any(|family| field_type.eq_ignore_ascii_case(family))
}

/// Applies the decimal rule to raw length and precision.
///
/// A decimal-family column reporting length 0 with precision -127 becomes
/// (38, 0). Other decimal-family values are capped at 38 and 18. Any other
/// type passes through.
pub fn normalize_length_precision(
    field_type: Option<&str>,
    length: Option<i32>,
    precision: Option<i32>,
) -> (Option<i32>, Option<i32>) {
    if !field_type.is_some_and(is_decimal_family) {
        return (length, precision);
    }
    if length == Some(0) && precision == Some(UNBOUNDED_PRECISION) {
        return (Some(MAX_DECIMAL_LENGTH), Some(0));
    }
    (
        length.map(|l| l.min(MAX_DECIMAL_LENGTH)),
        precision.map(|p| p.min(MAX_DECIMAL_PRECISION)),
    )
}

/// Builds column snapshots from the dialect's column metadata query.
pub struct ColumnIntrospector<'a> {
    dialect: &'a dyn DialectStrategy,
}

impl<'a> ColumnIntrospector<'a> {
    /// Creates an introspector for a dialect.
    pub fn new(dialect: &'a dyn DialectStrategy) -> Self {
        Self { dialect }
    }

    /// Lists the columns of one table in ordinal order.
    ///
    /// Extension hook failures are recorded in `report`; the column keeps
    /// its base facts.
    ///
    /// # Errors
    /// A failing metadata query aborts the table.
    pub async fn list_columns(
        &self,
        connection: &mut dyn MetadataConnection,
        schema: &str,
        table: &str,
        type_map: &TypeMap,
        report: &mut StatisticsReport,
    ) -> Result<Vec<ColumnSnapshot>> {
        let sql = self.dialect.column_metadata_sql(schema, table);
        let rows = connection.query(&sql).await.map_err(|e| {
            warn!(schema = %schema, table = %table, "Column metadata query failed: {}", e);
            e
        })?;

        let columns: Vec<ColumnSnapshot> = rows
            .iter()
            .filter_map(|row| self.build_column(row, table, type_map, report))
            .collect();

        debug!(table = %table, columns = columns.len(), "Introspected columns");
        Ok(columns)
    }

    fn build_column(
        &self,
        row: &QueryRow,
        table: &str,
        type_map: &TypeMap,
        report: &mut StatisticsReport,
    ) -> Option<ColumnSnapshot> {
        let Some(field_name) = row.get_string("column_name") else {
            warn!(table = %table, "Skipping column row without column_name");
            return None;
        };

        let mut column = ColumnSnapshot::new(table, field_name);
        column.field_type = row
            .get_str("type_name")
            .map(strip_type_suffix)
            .filter(|t| !t.is_empty());
        column.comment = row.get_string("remarks").filter(|r| !r.is_empty());
        column.length = row.get_i32("column_size");
        column.precision = self
            .dialect
            .decimal_digits(row)
            .and_then(|digits| digits.trim().parse::<i32>().ok());

        let mut facts = ColumnFacts {
            default_value: row.get_string("column_def").unwrap_or_default(),
            ..Default::default()
        };
        let extended = self.dialect.extend_column(row, &mut column, &mut facts);
        report.record(
            table,
            Some(&column.field_name),
            StatisticKind::ColumnExtension,
            extended,
        );

        let (length, precision) =
            normalize_length_precision(column.field_type.as_deref(), column.length, column.precision);
        column.length = length;
        column.precision = precision;

        facts.origin_type = column
            .field_type
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        facts.logical_type = type_map.lookup(&facts.origin_type).map(ToString::to_string);
        column.apply_facts(&facts);

        Some(column)
    }
}
