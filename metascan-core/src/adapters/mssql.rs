//! SQL Server dialect and the tiberius-backed connection.

use super::catalog::{DialectKind, escape_literal};
use super::helpers::fetch_first;
use super::{DialectStrategy, MetadataConnection};
use crate::Result;
use crate::error::MetaScanError;
use crate::models::TableStorageStats;
use crate::scan::table_stats::TableStatsStrategy;
use async_trait::async_trait;

/// Dialect strategy for SQL Server.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

#[async_trait]
impl DialectStrategy for SqlServerDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::SqlServer
    }

    fn column_metadata_sql(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT c.TABLE_NAME AS table_name, c.COLUMN_NAME AS column_name, c.DATA_TYPE AS type_name, \
             COALESCE(c.CHARACTER_MAXIMUM_LENGTH, c.NUMERIC_PRECISION, c.DATETIME_PRECISION) AS column_size, \
             c.NUMERIC_SCALE AS decimal_digits, CAST(ep.value AS NVARCHAR(4000)) AS remarks, \
             c.COLUMN_DEFAULT AS column_def \
             FROM INFORMATION_SCHEMA.COLUMNS c \
             LEFT JOIN sys.extended_properties ep \
             ON ep.major_id = OBJECT_ID(QUOTENAME(c.TABLE_SCHEMA) + '.' + QUOTENAME(c.TABLE_NAME)) \
             AND ep.minor_id = COLUMNPROPERTY(ep.major_id, c.COLUMN_NAME, 'ColumnId') \
             AND ep.name = 'MS_Description' \
             WHERE c.TABLE_SCHEMA = '{}' AND c.TABLE_NAME = '{}' \
             ORDER BY c.ORDINAL_POSITION",
            escape_literal(schema),
            escape_literal(table)
        )
    }
}

/// Table statistics from `sys.dm_db_partition_stats` and `sys.indexes`.
///
/// Needs `VIEW DATABASE STATE`; without it the branch fails and the table
/// keeps no storage figures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerTableStats;

#[async_trait]
impl TableStatsStrategy for SqlServerTableStats {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    async fn collect(
        &self,
        connection: &mut dyn MetadataConnection,
        _dialect: &dyn DialectStrategy,
        schema: &str,
        table: &str,
    ) -> Result<TableStorageStats> {
        let sql = format!(
            "SELECT \
             (SELECT SUM(p.row_count) FROM sys.dm_db_partition_stats p \
              WHERE p.object_id = o.object_id AND p.index_id IN (0, 1)) AS table_rows, \
             (SELECT SUM(p.used_page_count) * 8192 FROM sys.dm_db_partition_stats p \
              WHERE p.object_id = o.object_id AND p.index_id IN (0, 1)) AS data_length, \
             (SELECT COALESCE(SUM(p.used_page_count), 0) * 8192 FROM sys.dm_db_partition_stats p \
              WHERE p.object_id = o.object_id AND p.index_id > 1) AS index_length, \
             (SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
              WHERE tc.TABLE_SCHEMA = s.name AND tc.TABLE_NAME = o.name \
              AND tc.CONSTRAINT_TYPE = 'PRIMARY KEY') AS primary_key_count, \
             (SELECT COUNT(*) FROM sys.indexes i \
              WHERE i.object_id = o.object_id AND i.is_primary_key = 0 AND i.type > 0) AS index_count \
             FROM sys.objects o JOIN sys.schemas s ON s.schema_id = o.schema_id \
             WHERE s.name = '{}' AND o.name = '{}'",
            escape_literal(schema),
            escape_literal(table)
        );

        let row = fetch_first(connection, &sql).await?.ok_or_else(|| {
            MetaScanError::query_failed(format!("object {}.{} not found in sys.objects", schema, table))
        })?;

        let primary_key_count = row.get_i64("primary_key_count");
        Ok(TableStorageStats {
            table_rows: row.get_i64("table_rows"),
            data_length: row.get_i64("data_length"),
            index_length: row.get_i64("index_length"),
            has_primary_key: primary_key_count.map(|count| count > 0),
            primary_key_count,
            index_count: row.get_i64("index_count"),
        })
    }
}

#[cfg(feature = "mssql")]
pub use driver::TdsMetadataConnection;

#[cfg(feature = "mssql")]
mod driver {
    use crate::adapters::{ConnectionConfig, MetadataConnection, QueryRow};
    use crate::error::{MetaScanError, redact_database_url};
    use crate::Result;
    use async_trait::async_trait;
    use tiberius::{AuthMethod, Client, ColumnData, Config, FromSql};
    use tokio::net::TcpStream;
    use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

    /// Single TDS connection.
    pub struct TdsMetadataConnection {
        client: Client<Compat<TcpStream>>,
    }

    impl TdsMetadataConnection {
        /// Connects to `mssql://host:port/database`. Setting
        /// `trust_server_certificate=true` in the URL query skips certificate
        /// validation.
        pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
            let url = url::Url::parse(&config.url).map_err(|e| {
                MetaScanError::configuration(format!(
                    "Invalid SQL Server URL {}: {}",
                    redact_database_url(&config.url),
                    e
                ))
            })?;
            let host = url
                .host_str()
                .ok_or_else(|| MetaScanError::configuration("SQL Server URL has no host"))?;

            let mut tds = Config::new();
            tds.host(host);
            tds.port(url.port().unwrap_or(1433));
            tds.application_name("metascan");

            let database = url.path().trim_start_matches('/');
            if !database.is_empty() {
                tds.database(database);
            }

            if let Some((account, password)) = config.password_properties() {
                tds.authentication(AuthMethod::sql_server(account, password));
            }

            let trust_cert = url.query_pairs().any(|(key, value)| {
                key.eq_ignore_ascii_case("trust_server_certificate") && value == "true"
            });
            if trust_cert {
                tds.trust_cert();
            }

            let tcp = TcpStream::connect(tds.get_addr())
                .await
                .map_err(MetaScanError::connection_failed)?;
            tcp.set_nodelay(true)
                .map_err(MetaScanError::connection_failed)?;

            let client = Client::connect(tds, tcp.compat_write())
                .await
                .map_err(MetaScanError::connection_failed)?;
            Ok(Self { client })
        }
    }

    fn column_text(data: ColumnData<'static>) -> Option<String> {
        match data {
            ColumnData::U8(v) => v.map(|v| v.to_string()),
            ColumnData::I16(v) => v.map(|v| v.to_string()),
            ColumnData::I32(v) => v.map(|v| v.to_string()),
            ColumnData::I64(v) => v.map(|v| v.to_string()),
            ColumnData::F32(v) => v.map(|v| v.to_string()),
            ColumnData::F64(v) => v.map(|v| v.to_string()),
            ColumnData::Bit(v) => v.map(|v| if v { "1" } else { "0" }.to_string()),
            ColumnData::String(v) => v.map(|v| v.into_owned()),
            ColumnData::Guid(v) => v.map(|v| v.to_string()),
            ColumnData::Numeric(v) => v.map(|v| v.to_string()),
            ColumnData::Binary(_) | ColumnData::Xml(_) => None,
            temporal => chrono::NaiveDateTime::from_sql(&temporal)
                .ok()
                .flatten()
                .map(|v| v.to_string())
                .or_else(|| {
                    chrono::NaiveDate::from_sql(&temporal)
                        .ok()
                        .flatten()
                        .map(|v| v.to_string())
                })
                .or_else(|| {
                    chrono::NaiveTime::from_sql(&temporal)
                        .ok()
                        .flatten()
                        .map(|v| v.to_string())
                })
                .or_else(|| {
                    chrono::DateTime::<chrono::FixedOffset>::from_sql(&temporal)
                        .ok()
                        .flatten()
                        .map(|v| v.to_rfc3339())
                }),
        }
    }

    fn to_query_row(row: tiberius::Row) -> QueryRow {
        let names: Vec<String> = row
            .columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect();
        QueryRow::new(names.into_iter().zip(row.into_iter().map(column_text)).collect())
    }

    #[async_trait]
    impl MetadataConnection for TdsMetadataConnection {
        async fn query(&mut self, sql: &str) -> Result<Vec<QueryRow>> {
            let stream = self
                .client
                .simple_query(sql.to_string())
                .await
                .map_err(|e| MetaScanError::query_failed(e.to_string()))?;
            let rows = stream
                .into_first_result()
                .await
                .map_err(|e| MetaScanError::query_failed(e.to_string()))?;
            Ok(rows.into_iter().map(to_query_row).collect())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.client
                .close()
                .await
                .map_err(MetaScanError::connection_failed)
        }
    }
}
