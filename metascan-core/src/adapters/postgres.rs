//! PostgreSQL-family dialect (PostgreSQL, openGauss, Hologres).

use super::catalog::{DialectKind, escape_literal};
use super::helpers::fetch_first;
use super::{DialectStrategy, MetadataConnection};
use crate::Result;
use crate::error::MetaScanError;
use crate::models::TableStorageStats;
use crate::scan::table_stats::TableStatsStrategy;
use async_trait::async_trait;

/// Dialect strategy for PostgreSQL-protocol sources.
#[derive(Debug, Clone, Copy)]
pub struct PostgresDialect {
    kind: DialectKind,
}

impl PostgresDialect {
    /// Creates the strategy for a PostgreSQL-family dialect.
    pub fn new(kind: DialectKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl DialectStrategy for PostgresDialect {
    fn kind(&self) -> DialectKind {
        self.kind
    }

    fn column_metadata_sql(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT c.table_name AS table_name, c.column_name AS column_name, c.udt_name AS type_name, \
             COALESCE(c.character_maximum_length, c.numeric_precision, c.datetime_precision) AS column_size, \
             c.numeric_scale AS decimal_digits, \
             pg_catalog.col_description(format('%I.%I', c.table_schema, c.table_name)::regclass::oid, \
             c.ordinal_position::int) AS remarks, \
             c.column_default AS column_def \
             FROM information_schema.columns c \
             WHERE c.table_schema = '{}' AND c.table_name = '{}' \
             ORDER BY c.ordinal_position",
            escape_literal(schema),
            escape_literal(table)
        )
    }
}

/// Table statistics from `pg_class`, `pg_constraint` and `pg_index`.
///
/// Row counts are the planner estimate (`reltuples`); tables never analyzed
/// report no row count.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresTableStats;

#[async_trait]
impl TableStatsStrategy for PostgresTableStats {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn collect(
        &self,
        connection: &mut dyn MetadataConnection,
        _dialect: &dyn DialectStrategy,
        schema: &str,
        table: &str,
    ) -> Result<TableStorageStats> {
        let sql = format!(
            "SELECT c.reltuples::bigint AS table_rows, \
             pg_relation_size(c.oid) AS data_length, \
             pg_indexes_size(c.oid) AS index_length, \
             (SELECT COUNT(*) FROM pg_catalog.pg_constraint con \
              WHERE con.conrelid = c.oid AND con.contype = 'p') AS primary_key_count, \
             (SELECT COUNT(*) FROM pg_catalog.pg_index i \
              WHERE i.indrelid = c.oid AND NOT i.indisprimary) AS index_count \
             FROM pg_catalog.pg_class c \
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
             WHERE n.nspname = '{}' AND c.relname = '{}'",
            escape_literal(schema),
            escape_literal(table)
        );

        let row = fetch_first(connection, &sql).await?.ok_or_else(|| {
            MetaScanError::query_failed(format!("relation {}.{} not found in pg_class", schema, table))
        })?;

        let primary_key_count = row.get_i64("primary_key_count");
        Ok(TableStorageStats {
            table_rows: row.get_i64("table_rows").filter(|rows| *rows >= 0),
            data_length: row.get_i64("data_length"),
            index_length: row.get_i64("index_length"),
            has_primary_key: primary_key_count.map(|count| count > 0),
            primary_key_count,
            index_count: row.get_i64("index_count"),
        })
    }
}

#[cfg(feature = "postgresql")]
pub use driver::PgMetadataConnection;

#[cfg(feature = "postgresql")]
mod driver {
    use crate::adapters::{ConnectionConfig, MetadataConnection, QueryRow};
    use crate::error::{MetaScanError, redact_database_url};
    use crate::Result;
    use async_trait::async_trait;
    use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
    use sqlx::{Column, ConnectOptions, Connection, Executor, Row};
    use std::str::FromStr;

    /// Single PostgreSQL connection executing statements over the simple
    /// query protocol.
    pub struct PgMetadataConnection {
        connection: PgConnection,
    }

    impl PgMetadataConnection {
        /// Connects with account/password passed as connection properties.
        pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
            let url = config.connection_url();
            let mut options = PgConnectOptions::from_str(url.as_str()).map_err(|e| {
                MetaScanError::configuration(format!(
                    "Invalid PostgreSQL URL {}: {}",
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
                .application_name("metascan")
                .connect()
                .await
                .map_err(MetaScanError::connection_failed)?;
            Ok(Self { connection })
        }
    }

    fn to_query_row(row: &PgRow) -> QueryRow {
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
    impl MetadataConnection for PgMetadataConnection {
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
    use crate::adapters::QueryRow;
    use crate::testing::ScriptedConnection;

    #[tokio::test]
    async fn test_table_stats_from_pg_class() {
        let mut connection = ScriptedConnection::new().on(
            "pg_relation_size",
            vec![QueryRow::default()
                .with("table_rows", Some("5000"))
                .with("data_length", Some("409600"))
                .with("index_length", Some("81920"))
                .with("primary_key_count", Some("1"))
                .with("index_count", Some("3"))],
        );
        let dialect = PostgresDialect::new(DialectKind::PostgreSql);

        let stats = PostgresTableStats
            .collect(&mut connection, &dialect, "public", "orders")
            .await
            .unwrap();

        assert_eq!(stats.table_rows, Some(5000));
        assert_eq!(stats.data_length, Some(409_600));
        assert_eq!(stats.has_primary_key, Some(true));
        assert_eq!(stats.index_count, Some(3));
        assert!(connection.executed()[0].contains("nspname = 'public'"));
    }

    #[tokio::test]
    async fn test_unanalyzed_table_has_no_row_count() {
        let mut connection = ScriptedConnection::new().on(
            "pg_relation_size",
            vec![QueryRow::default()
                .with("table_rows", Some("-1"))
                .with("primary_key_count", Some("0"))],
        );
        let dialect = PostgresDialect::new(DialectKind::OpenGauss);

        let stats = PostgresTableStats
            .collect(&mut connection, &dialect, "public", "fresh")
            .await
            .unwrap();

        assert_eq!(stats.table_rows, None);
        assert_eq!(stats.has_primary_key, Some(false));
    }

    #[tokio::test]
    async fn test_missing_relation_is_query_error() {
        let mut connection = ScriptedConnection::new();
        let dialect = PostgresDialect::new(DialectKind::Hologres);
        let err = PostgresTableStats
            .collect(&mut connection, &dialect, "public", "gone")
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_column_sql_uses_udt_name() {
        let sql = PostgresDialect::new(DialectKind::PostgreSql).column_metadata_sql("public", "t");
        assert!(sql.contains("c.udt_name AS type_name"));
        assert!(sql.contains("c.table_name = 't'"));
    }
}
