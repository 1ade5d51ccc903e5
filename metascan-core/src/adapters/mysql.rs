//! MySQL-family dialect (MySQL, MariaDB, Doris).
//!
//! MySQL and MariaDB table listings carry storage enrichment straight from
//! `information_schema.TABLES`; a secondary per-table query over
//! `information_schema.STATISTICS` adds primary key and index presence.
//! Doris speaks the same protocol but reports no storage figures there.

use super::catalog::{DialectKind, escape_literal};
use super::helpers::fetch_first;
use super::{DialectStrategy, MetadataConnection, QueryRow};
use crate::Result;
use crate::models::{
    AdvancedParam, ColumnFacts, ColumnSnapshot, TableFacts, TableSnapshot, TableStorageStats, keys,
};
use async_trait::async_trait;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Converts a megabyte figure reported by the listing query into bytes.
pub fn megabytes_to_bytes(megabytes: f64) -> i64 {
    (megabytes * BYTES_PER_MB).round() as i64
}

/// Dialect strategy for MySQL-protocol sources.
#[derive(Debug, Clone, Copy)]
pub struct MySqlDialect {
    kind: DialectKind,
}

impl MySqlDialect {
    /// Creates the strategy for a MySQL-family dialect.
    pub fn new(kind: DialectKind) -> Self {
        Self { kind }
    }

    /// Storage facts carried by a listing row.
    pub fn listing_facts(row: &QueryRow) -> TableFacts {
        TableFacts {
            engine: row.get_string("engine"),
            create_time: row.get_string("create_time"),
            update_time: row.get_string("update_time"),
            storage: TableStorageStats {
                table_rows: row.get_i64("table_rows"),
                data_length: row.get_f64("data_length").map(megabytes_to_bytes),
                index_length: row.get_f64("index_length").map(megabytes_to_bytes),
                ..Default::default()
            },
        }
    }

    /// Primary key and secondary index counts for one table.
    pub async fn index_facts(
        connection: &mut dyn MetadataConnection,
        schema: &str,
        table: &str,
    ) -> Result<(i64, i64)> {
        let sql = format!(
            "SELECT COUNT(DISTINCT CASE WHEN INDEX_NAME = 'PRIMARY' THEN INDEX_NAME END) AS primary_key_count, \
             COUNT(DISTINCT CASE WHEN INDEX_NAME <> 'PRIMARY' THEN INDEX_NAME END) AS index_count \
             FROM information_schema.STATISTICS \
             WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}'",
            escape_literal(schema),
            escape_literal(table)
        );
        let row = fetch_first(connection, &sql).await?.unwrap_or_default();
        Ok((
            row.get_i64("primary_key_count").unwrap_or(0),
            row.get_i64("index_count").unwrap_or(0),
        ))
    }
}

#[async_trait]
impl DialectStrategy for MySqlDialect {
    fn kind(&self) -> DialectKind {
        self.kind
    }

    fn column_metadata_sql(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT TABLE_NAME AS table_name, COLUMN_NAME AS column_name, UPPER(DATA_TYPE) AS type_name, \
             COALESCE(CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION, DATETIME_PRECISION) AS column_size, \
             NUMERIC_SCALE AS decimal_digits, COLUMN_COMMENT AS remarks, COLUMN_DEFAULT AS column_def, \
             COLUMN_KEY AS column_key, EXTRA AS extra \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}' \
             ORDER BY ORDINAL_POSITION",
            escape_literal(schema),
            escape_literal(table)
        )
    }

    fn extend_column(
        &self,
        row: &QueryRow,
        _column: &mut ColumnSnapshot,
        facts: &mut ColumnFacts,
    ) -> Result<()> {
        for key in [keys::COLUMN_KEY, keys::EXTRA] {
            if let Some(value) = row.get_str(key).filter(|v| !v.is_empty()) {
                facts.extra.push(AdvancedParam::new(key, value));
            }
        }
        Ok(())
    }

    async fn enrich_table(
        &self,
        connection: &mut dyn MetadataConnection,
        schema: &str,
        row: &QueryRow,
        table: &mut TableSnapshot,
    ) -> Result<()> {
        // Views report the literal comment "VIEW".
        if table.description.as_deref() == Some("VIEW") {
            table.description = None;
        }

        if !self.kind.is_mysql_family() {
            return Ok(());
        }

        let mut facts = Self::listing_facts(row);
        let index_result = Self::index_facts(connection, schema, &table.name).await;
        if let Ok((primary_key_count, index_count)) = &index_result {
            facts.storage.has_primary_key = Some(*primary_key_count > 0);
            facts.storage.primary_key_count = Some(*primary_key_count);
            facts.storage.index_count = Some(*index_count);
        }
        table.apply_facts(&facts);

        index_result.map(|_| ())
    }
}

#[cfg(feature = "mysql")]
pub use driver::MySqlMetadataConnection;

#[cfg(feature = "mysql")]
mod driver {
    use crate::adapters::{ConnectionConfig, MetadataConnection, QueryRow};
    use crate::error::{MetaScanError, redact_database_url};
    use crate::Result;
    use async_trait::async_trait;
    use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
    use sqlx::{Column, ConnectOptions, Connection, Executor, Row};
    use std::str::FromStr;

    /// Single MySQL connection executing statements over the text protocol.
    pub struct MySqlMetadataConnection {
        connection: MySqlConnection,
    }

    impl MySqlMetadataConnection {
        /// Connects with account/password passed as connection properties.
        pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
            let url = config.connection_url();
            let mut options = MySqlConnectOptions::from_str(url.as_str()).map_err(|e| {
                MetaScanError::configuration(format!(
                    "Invalid MySQL URL {}: {}",
                    redact_database_url(&config.url),
                    e
                ))
            })?;

            if let Some((account, password)) = config.password_properties() {
                if !account.is_empty() {
                    options = options.username(account);
                }
                if !password.is_empty() {
                    options = options.password(password);
                }
            }

            let connection = options
                .connect()
                .await
                .map_err(MetaScanError::connection_failed)?;
            Ok(Self { connection })
        }
    }

    fn to_query_row(row: &MySqlRow) -> QueryRow {
        QueryRow::new(
            row.columns()
                .iter()
                .map(|column| {
                    let value = row
                        .try_get_unchecked::<Option<String>, _>(column.ordinal())
                        .ok()
                        .flatten();
                    (column.name().to_string(), value)
                })
                .collect(),
        )
    }

    #[async_trait]
    impl MetadataConnection for MySqlMetadataConnection {
        async fn query(&mut self, sql: &str) -> Result<Vec<QueryRow>> {
            let rows = (&mut self.connection)
                .fetch_all(sql)
                .await
                .map_err(|e| MetaScanError::query_failed(e.to_string()))?;
            Ok(rows.iter().map(to_query_row).collect())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.connection
                .close()
                .await
                .map_err(MetaScanError::connection_failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::report::StatisticsReport;
    use crate::scan::table_stats::TableStatsRegistry;
    use crate::testing::ScriptedConnection;

    fn listing_row() -> QueryRow {
        QueryRow::default()
            .with("table_name", Some("orders"))
            .with("remarks", Some("customer orders"))
            .with("table_type", Some("table"))
            .with("engine", Some("InnoDB"))
            .with("table_rows", Some("1200"))
            .with("create_time", Some("2024-03-01 10:00:00"))
            .with("update_time", None)
            .with("data_length", Some("1.50"))
            .with("index_length", Some("0.25"))
    }

    #[test]
    fn test_megabytes_to_bytes() {
        assert_eq!(megabytes_to_bytes(1.5), 1_572_864);
        assert_eq!(megabytes_to_bytes(0.0), 0);
    }

    #[tokio::test]
    async fn test_enrichment_appends_storage_and_index_facts() {
        let mut connection = ScriptedConnection::new().on(
            "information_schema.STATISTICS",
            vec![QueryRow::default()
                .with("primary_key_count", Some("1"))
                .with("index_count", Some("2"))],
        );
        let mut table = TableSnapshot::new("orders");

        MySqlDialect::new(DialectKind::MySql)
            .enrich_table(&mut connection, "shop", &listing_row(), &mut table)
            .await
            .unwrap();

        assert_eq!(
            table.advanced_params.keys(),
            vec![
                "engine",
                "table_rows",
                "create_time",
                "update_time",
                "data_length",
                "index_length",
                "has_primary_key",
                "primary_key_count",
                "index_count"
            ]
        );
        assert_eq!(table.advanced_params.get(keys::DATA_LENGTH), Some("1572864"));
        assert_eq!(table.advanced_params.get(keys::HAS_PRIMARY_KEY), Some("true"));
        assert_eq!(table.row_count, Some(1200));
    }

    #[tokio::test]
    async fn test_index_query_failure_keeps_listing_facts() {
        let mut connection =
            ScriptedConnection::new().fail_on("information_schema.STATISTICS", "access denied");
        let mut table = TableSnapshot::new("orders");

        let result = MySqlDialect::new(DialectKind::MariaDb)
            .enrich_table(&mut connection, "shop", &listing_row(), &mut table)
            .await;

        assert!(result.is_err());
        assert!(table.advanced_params.contains_key(keys::ENGINE));
        assert!(!table.advanced_params.contains_key(keys::INDEX_COUNT));
    }

    #[tokio::test]
    async fn test_view_comment_cleared_and_doris_not_enriched() {
        let mut connection = ScriptedConnection::new();
        let mut table = TableSnapshot::new("v_orders");
        table.description = Some("VIEW".to_string());

        MySqlDialect::new(DialectKind::Doris)
            .enrich_table(&mut connection, "shop", &listing_row(), &mut table)
            .await
            .unwrap();

        assert_eq!(table.description, None);
        assert!(table.advanced_params.is_empty());
        assert!(connection.executed().is_empty());
    }

    #[tokio::test]
    async fn test_view_without_row_estimate_is_not_counted() {
        let mut connection = ScriptedConnection::new().on(
            "information_schema.STATISTICS",
            vec![QueryRow::default()
                .with("primary_key_count", Some("0"))
                .with("index_count", Some("0"))],
        );
        let row = QueryRow::default()
            .with("table_name", Some("v_orders"))
            .with("remarks", Some("VIEW"))
            .with("table_type", Some("view"))
            .with("engine", None)
            .with("table_rows", None)
            .with("create_time", None)
            .with("update_time", None)
            .with("data_length", None)
            .with("index_length", None);
        let mut table = TableSnapshot::new("v_orders");
        MySqlDialect::new(DialectKind::MySql)
            .enrich_table(&mut connection, "shop", &row, &mut table)
            .await
            .unwrap();

        let dialect = MySqlDialect::new(DialectKind::MySql);
        let mut report = StatisticsReport::default();
        let appended = TableStatsRegistry::with_defaults()
            .collect_for(&mut connection, &dialect, "shop", &mut table, &mut report)
            .await;

        assert!(!appended);
        assert!(connection.executed_matching("COUNT(*)").is_empty());
        assert_eq!(table.advanced_params.keys()[1], "table_rows");
        assert_eq!(table.advanced_params.get(keys::TABLE_ROWS), Some(""));
        assert_eq!(table.row_count, None);
    }

    #[test]
    fn test_extend_column_records_key_and_extra() {
        let row = QueryRow::default()
            .with("column_key", Some("PRI"))
            .with("extra", Some("auto_increment"));
        let mut column = ColumnSnapshot::new("orders", "id");
        let mut facts = ColumnFacts::default();

        MySqlDialect::new(DialectKind::MySql)
            .extend_column(&row, &mut column, &mut facts)
            .unwrap();

        assert_eq!(facts.extra.len(), 2);
        assert_eq!(facts.extra[0], AdvancedParam::new("column_key", "PRI"));
    }
}
