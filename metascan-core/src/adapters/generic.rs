//! ANSI `INFORMATION_SCHEMA` fallbacks.
//!
//! Used for dialects without a dedicated strategy and as the last resort of
//! the table statistics registry.

use super::catalog::{DialectKind, escape_literal};
use super::helpers::fetch_first;
use super::{DialectStrategy, MetadataConnection};
use crate::Result;
use crate::models::TableStorageStats;
use crate::scan::table_stats::TableStatsStrategy;
use async_trait::async_trait;

/// Column metadata through `INFORMATION_SCHEMA.COLUMNS`.
pub fn information_schema_columns(schema: &str, table: &str) -> String {
    format!(
        "SELECT TABLE_NAME AS table_name, COLUMN_NAME AS column_name, DATA_TYPE AS type_name, \
         COALESCE(CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION) AS column_size, \
         NUMERIC_SCALE AS decimal_digits, NULL AS remarks, COLUMN_DEFAULT AS column_def \
         FROM INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}' \
         ORDER BY ORDINAL_POSITION",
        escape_literal(schema),
        escape_literal(table)
    )
}

/// Strategy relying on the default hooks only.
#[derive(Debug, Clone, Copy)]
pub struct GenericDialect {
    kind: DialectKind,
}

impl GenericDialect {
    /// Creates the fallback strategy for a dialect.
    pub fn new(kind: DialectKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl DialectStrategy for GenericDialect {
    fn kind(&self) -> DialectKind {
        self.kind
    }
}

/// Row count through `SELECT COUNT(*)`; nothing else is portable.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericTableStats;

#[async_trait]
impl TableStatsStrategy for GenericTableStats {
    fn name(&self) -> &'static str {
        "generic"
    }

    async fn collect(
        &self,
        connection: &mut dyn MetadataConnection,
        dialect: &dyn DialectStrategy,
        schema: &str,
        table: &str,
    ) -> Result<TableStorageStats> {
        let sql = format!(
            "SELECT COUNT(*) AS table_rows FROM {}",
            dialect.qualified_table(schema, table)
        );
        let table_rows = fetch_first(connection, &sql)
            .await?
            .and_then(|row| row.get_i64("table_rows"));

        Ok(TableStorageStats {
            table_rows,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_information_schema_columns_escapes() {
        let sql = information_schema_columns("it's", "t");
        assert!(sql.contains("TABLE_SCHEMA = 'it''s'"));
        assert!(sql.contains("AS decimal_digits"));
    }

    #[test]
    fn test_generic_dialect_defaults() {
        let dialect = GenericDialect::new(DialectKind::Inceptor);
        assert_eq!(dialect.probe_sql(), "SELECT 1");
        assert_eq!(dialect.qualified_table("db", "t"), "`db`.`t`");
    }
}
