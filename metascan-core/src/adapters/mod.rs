//! Dialect adapters and the connection seam.
//!
//! The scan components never talk to a driver directly. They run SQL through
//! a [`MetadataConnection`] opened by a [`ConnectionProvider`], and ask a
//! per-dialect [`DialectStrategy`] for every vendor-specific step: column
//! metadata SQL, decimal-digit extraction, column extension and table
//! enrichment.
//!
//! # Security
//! Connections are read-only in practice (metadata and aggregate SQL only)
//! and credentials never leave [`ConnectionConfig`] in clear text.

pub mod catalog;
pub mod config;
pub mod generic;
pub mod helpers;
pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;

pub use catalog::{DialectCatalog, DialectEntry, DialectKind, DriverId, IdentifierQuote, RowLimit};
pub use config::{AuthMode, ConnectionConfig, DataSourceDescriptor, ScanSettings};
pub use helpers::QueryRow;

use crate::models::{ColumnFacts, ColumnSnapshot, TableSnapshot};
use crate::{Result, error::MetaScanError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A live connection able to run metadata and statistics SQL.
///
/// Implementations execute plain SQL text and return every value as its
/// textual rendering.
#[async_trait]
pub trait MetadataConnection: Send {
    /// Executes one statement and returns all rows.
    async fn query(&mut self, sql: &str) -> Result<Vec<QueryRow>>;

    /// Releases the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens connections for resolved configurations.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Opens a connection ready for statement execution.
    ///
    /// # Errors
    /// `DriverNotFound` when the driver is not compiled in, `Connection` on
    /// network or authentication failure.
    async fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn MetadataConnection>>;
}

/// Provider backed by the compiled-in drivers.
#[derive(Debug, Clone)]
pub struct DriverConnectionProvider {
    connect_timeout: Duration,
}

impl Default for DriverConnectionProvider {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl DriverConnectionProvider {
    /// Creates a provider with the given connect timeout.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl ConnectionProvider for DriverConnectionProvider {
    async fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn MetadataConnection>> {
        debug!("Opening connection: {}", config);

        let connecting = async {
            match config.driver_id {
                #[cfg(feature = "postgresql")]
                DriverId::Postgres => postgres::PgMetadataConnection::connect(config)
                    .await
                    .map(|c| Box::new(c) as Box<dyn MetadataConnection>),
                #[cfg(feature = "mysql")]
                DriverId::MySql => mysql::MySqlMetadataConnection::connect(config)
                    .await
                    .map(|c| Box::new(c) as Box<dyn MetadataConnection>),
                #[cfg(feature = "mssql")]
                DriverId::SqlServer => mssql::TdsMetadataConnection::connect(config)
                    .await
                    .map(|c| Box::new(c) as Box<dyn MetadataConnection>),
                other => Err(MetaScanError::driver_not_found(
                    other.as_str(),
                    config.dialect.as_str(),
                )),
            }
        };

        match tokio::time::timeout(self.connect_timeout, connecting).await {
            Ok(result) => result,
            Err(_) => Err(MetaScanError::connection_with_context(
                format!("connect timed out after {:?}", self.connect_timeout),
                std::io::Error::from(std::io::ErrorKind::TimedOut),
            )),
        }
    }
}

/// Connection decorator imposing a per-statement timeout.
///
/// Expiry surfaces as a recoverable `QueryExecution` error.
pub struct TimeoutConnection {
    inner: Box<dyn MetadataConnection>,
    timeout: Duration,
}

impl TimeoutConnection {
    /// Wraps a connection.
    pub fn new(inner: Box<dyn MetadataConnection>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl MetadataConnection for TimeoutConnection {
    async fn query(&mut self, sql: &str) -> Result<Vec<QueryRow>> {
        debug!(sql = %sql, "executing");
        match tokio::time::timeout(self.timeout, self.inner.query(sql)).await {
            Ok(result) => result,
            Err(_) => Err(MetaScanError::query_failed(format!(
                "statement timed out after {:?}",
                self.timeout
            ))),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.inner.close().await
    }
}

/// Closes a connection, logging instead of failing when release fails.
pub async fn release(connection: Box<dyn MetadataConnection>) {
    if let Err(e) = connection.close().await {
        warn!("Failed to close connection cleanly: {}", e);
    }
}

/// Vendor-specific steps of the fixed scan skeleton.
#[async_trait]
pub trait DialectStrategy: Send + Sync {
    /// Dialect served by this strategy.
    fn kind(&self) -> DialectKind;

    /// Catalog entry of the dialect.
    fn entry(&self) -> &'static DialectEntry {
        DialectCatalog::entry(self.kind())
    }

    /// Quotes an identifier.
    fn quote_identifier(&self, ident: &str) -> String {
        self.entry().quote.quote(ident)
    }

    /// Schema-qualified, quoted table reference.
    fn qualified_table(&self, schema: &str, table: &str) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(schema),
            self.quote_identifier(table)
        )
    }

    /// Statement proving a connection can execute SQL.
    fn probe_sql(&self) -> &'static str {
        "SELECT 1"
    }

    /// Column metadata for one table, with the columns `table_name`,
    /// `column_name`, `type_name`, `column_size`, `decimal_digits`, `remarks`
    /// and `column_def`.
    fn column_metadata_sql(&self, schema: &str, table: &str) -> String {
        generic::information_schema_columns(schema, table)
    }

    /// Raw decimal-digits text of a column metadata row.
    fn decimal_digits(&self, row: &QueryRow) -> Option<String> {
        row.get_string("decimal_digits")
    }

    /// Adds driver-specific column facts before the column is finalized.
    fn extend_column(
        &self,
        _row: &QueryRow,
        _column: &mut ColumnSnapshot,
        _facts: &mut ColumnFacts,
    ) -> Result<()> {
        Ok(())
    }

    /// Enriches a listed table from its listing row and secondary queries.
    async fn enrich_table(
        &self,
        _connection: &mut dyn MetadataConnection,
        _schema: &str,
        _row: &QueryRow,
        _table: &mut TableSnapshot,
    ) -> Result<()> {
        Ok(())
    }
}

/// Returns the strategy for a dialect.
pub fn dialect_strategy(kind: DialectKind) -> Arc<dyn DialectStrategy> {
    match kind {
        DialectKind::MySql | DialectKind::MariaDb | DialectKind::Doris => {
            Arc::new(mysql::MySqlDialect::new(kind))
        }
        DialectKind::PostgreSql | DialectKind::OpenGauss | DialectKind::Hologres => {
            Arc::new(postgres::PostgresDialect::new(kind))
        }
        DialectKind::Oracle => Arc::new(oracle::OracleDialect),
        DialectKind::SqlServer => Arc::new(mssql::SqlServerDialect),
        DialectKind::Inceptor => Arc::new(generic::GenericDialect::new(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Credentials;

    #[tokio::test]
    async fn test_uncompiled_driver_is_driver_not_found() {
        let provider = DriverConnectionProvider::default();
        let config = ConnectionConfig::new(DialectKind::Oracle, "oracle://h:1521/ORCL")
            .with_credentials(Credentials::new("u", "p"));

        let err = match provider.open(&config).await {
            Ok(_) => panic!("oracle has no compiled driver"),
            Err(e) => e,
        };
        assert!(matches!(err, MetaScanError::DriverNotFound { .. }));
    }

    #[tokio::test]
    async fn test_token_dialect_without_driver() {
        let provider = DriverConnectionProvider::default();
        let config = ConnectionConfig::new(DialectKind::Inceptor, "jdbc:inceptor2://h:10000/db")
            .with_credentials(Credentials::new("u", "").with_token("t"));
        assert_eq!(config.auth_mode(), AuthMode::Token);
        assert!(matches!(
            provider.open(&config).await,
            Err(MetaScanError::DriverNotFound { .. })
        ));
    }

    #[test]
    fn test_strategy_lookup_covers_every_dialect() {
        for kind in DialectKind::ALL {
            assert_eq!(dialect_strategy(kind).kind(), kind);
        }
    }

    #[test]
    fn test_qualified_table_quoting() {
        assert_eq!(
            dialect_strategy(DialectKind::MySql).qualified_table("shop", "orders"),
            "`shop`.`orders`"
        );
        assert_eq!(
            dialect_strategy(DialectKind::SqlServer).qualified_table("dbo", "Orders"),
            "[dbo].[Orders]"
        );
        assert_eq!(
            dialect_strategy(DialectKind::PostgreSql).qualified_table("public", "t"),
            "\"public\".\"t\""
        );
    }
}
