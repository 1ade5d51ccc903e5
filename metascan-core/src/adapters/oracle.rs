//! Oracle dialect.
//!
//! No Oracle driver is compiled into this crate; hosts that bring their own
//! [`ConnectionProvider`](super::ConnectionProvider) still get the catalog
//! queries and table statistics below.

use super::catalog::{DialectKind, escape_literal};
use super::helpers::fetch_first;
use super::{DialectStrategy, MetadataConnection, QueryRow};
use crate::Result;
use crate::error::MetaScanError;
use crate::models::TableStorageStats;
use crate::scan::table_stats::TableStatsStrategy;
use async_trait::async_trait;

/// Oracle block size assumed when converting `BLOCKS` to bytes.
pub const BLOCK_SIZE: i64 = 8192;

/// Decimal digits reported for `NUMBER` without precision or scale.
pub const UNBOUNDED_SCALE: &str = "-127";

/// Dialect strategy for Oracle.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

#[async_trait]
impl DialectStrategy for OracleDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Oracle
    }

    fn probe_sql(&self) -> &'static str {
        "SELECT 1 FROM DUAL"
    }

    fn column_metadata_sql(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT c.TABLE_NAME AS table_name, c.COLUMN_NAME AS column_name, c.DATA_TYPE AS type_name, \
             CASE WHEN c.DATA_TYPE = 'NUMBER' THEN NVL(c.DATA_PRECISION, 0) \
             WHEN c.CHAR_LENGTH > 0 THEN c.CHAR_LENGTH ELSE c.DATA_LENGTH END AS column_size, \
             c.DATA_PRECISION AS data_precision, c.DATA_SCALE AS decimal_digits, \
             m.COMMENTS AS remarks, c.DATA_DEFAULT AS column_def \
             FROM ALL_TAB_COLUMNS c \
             LEFT JOIN ALL_COL_COMMENTS m ON m.OWNER = c.OWNER AND m.TABLE_NAME = c.TABLE_NAME \
             AND m.COLUMN_NAME = c.COLUMN_NAME \
             WHERE c.OWNER = '{}' AND c.TABLE_NAME = '{}' \
             ORDER BY c.COLUMN_ID",
            escape_literal(schema),
            escape_literal(table)
        )
    }

    fn decimal_digits(&self, row: &QueryRow) -> Option<String> {
        let unbounded_number = row
            .get_str("type_name")
            .is_some_and(|t| t.eq_ignore_ascii_case("NUMBER"))
            && row.get_str("data_precision").is_none()
            && row.get_str("decimal_digits").is_none();

        if unbounded_number {
            Some(UNBOUNDED_SCALE.to_string())
        } else {
            row.get_string("decimal_digits")
        }
    }
}

/// Table statistics from `ALL_TABLES`, `ALL_CONSTRAINTS` and `ALL_INDEXES`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleTableStats;

#[async_trait]
impl TableStatsStrategy for OracleTableStats {
    fn name(&self) -> &'static str {
        "oracle"
    }

    async fn collect(
        &self,
        connection: &mut dyn MetadataConnection,
        _dialect: &dyn DialectStrategy,
        schema: &str,
        table: &str,
    ) -> Result<TableStorageStats> {
        let sql = format!(
            "SELECT t.NUM_ROWS AS table_rows, t.BLOCKS AS blocks, \
             (SELECT COUNT(*) FROM ALL_CONSTRAINTS c WHERE c.OWNER = t.OWNER \
              AND c.TABLE_NAME = t.TABLE_NAME AND c.CONSTRAINT_TYPE = 'P') AS primary_key_count, \
             (SELECT COUNT(*) FROM ALL_INDEXES i WHERE i.TABLE_OWNER = t.OWNER \
              AND i.TABLE_NAME = t.TABLE_NAME AND i.INDEX_NAME NOT IN \
              (SELECT c.INDEX_NAME FROM ALL_CONSTRAINTS c WHERE c.OWNER = t.OWNER \
               AND c.TABLE_NAME = t.TABLE_NAME AND c.CONSTRAINT_TYPE = 'P' \
               AND c.INDEX_NAME IS NOT NULL)) AS index_count \
             FROM ALL_TABLES t WHERE t.OWNER = '{}' AND t.TABLE_NAME = '{}'",
            escape_literal(schema),
            escape_literal(table)
        );

        let row = fetch_first(connection, &sql).await?.ok_or_else(|| {
            MetaScanError::query_failed(format!("table {}.{} not found in ALL_TABLES", schema, table))
        })?;

        let primary_key_count = row.get_i64("primary_key_count");
        Ok(TableStorageStats {
            table_rows: row.get_i64("table_rows"),
            data_length: row
                .get_i64("blocks")
                .map(|blocks| blocks.saturating_mul(BLOCK_SIZE)),
            index_length: None,
            has_primary_key: primary_key_count.map(|count| count > 0),
            primary_key_count,
            index_count: row.get_i64("index_count"),
        })
    }
}
