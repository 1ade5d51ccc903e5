//! Scan orchestration.
//!
//! [`ScanEngine`] owns the connection provider, the scan settings and the
//! table statistics registry. Every public operation opens its own
//! connection, wraps it in a per-statement timeout and releases it on every
//! exit path.

use super::columns::ColumnIntrospector;
use super::report::StatisticsReport;
use super::statistics::StatisticsCollector;
use super::summary::DataSourceStatistics;
use super::table_stats::TableStatsRegistry;
use super::tables::TableEnumerator;
use super::type_map::TypeMap;
use crate::adapters::{
    ConnectionConfig, ConnectionProvider, DialectKind, DialectStrategy, MetadataConnection,
    ScanSettings, TimeoutConnection, dialect_strategy, release,
};
use crate::error::MetaScanError;
use crate::models::{ColumnSnapshot, TableSnapshot};
use crate::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of scanning one schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Schema (or database) name
    pub schema: String,
    /// Dialect of the source
    pub dialect: DialectKind,
    /// Scan start time
    pub collected_at: DateTime<Utc>,
    /// True when the scan stopped early on cancellation
    pub cancelled: bool,
    /// Listed tables, keyed by name
    pub tables: BTreeMap<String, TableSnapshot>,
    /// Columns of every scanned table, keyed by table then field name
    pub columns: BTreeMap<String, BTreeMap<String, ColumnSnapshot>>,
    /// Tables that could not be scanned, with the reason
    pub warnings: Vec<String>,
    /// Outcome of the best-effort steps
    pub report: StatisticsReport,
    /// Rollup of the tables and columns above
    pub summary: DataSourceStatistics,
}

impl SchemaSnapshot {
    /// Columns of one table.
    pub fn columns_of(&self, table: &str) -> Option<&BTreeMap<String, ColumnSnapshot>> {
        self.columns.get(table)
    }
}

enum TableOutcome {
    Scanned {
        table: TableSnapshot,
        columns: Vec<ColumnSnapshot>,
        report: StatisticsReport,
    },
    Failed {
        table: TableSnapshot,
        error: MetaScanError,
    },
    Skipped {
        table: TableSnapshot,
    },
}

fn by_field_name(columns: Vec<ColumnSnapshot>) -> BTreeMap<String, ColumnSnapshot> {
    columns
        .into_iter()
        .map(|column| (column.field_name.clone(), column))
        .collect()
}

/// Entry point for connection tests, listings and schema scans.
///
/// # Example
/// ```rust,no_run
/// use metascan_core::{ConnectionConfig, DialectKind, DriverConnectionProvider, ScanEngine, TypeMap};
/// use metascan_core::security::Credentials;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> metascan_core::Result<()> {
/// let config = ConnectionConfig::new(DialectKind::PostgreSql, "postgres://localhost:5432/shop")
///     .with_credentials(Credentials::new("reader", "secret"));
/// let engine = ScanEngine::new(Arc::new(DriverConnectionProvider::default()));
///
/// let snapshot = engine
///     .scan_schema(
///         &config,
///         "public",
///         &TypeMap::defaults_for(DialectKind::PostgreSql),
///         &CancellationToken::new(),
///     )
///     .await?;
/// println!("{} tables", snapshot.tables.len());
/// # Ok(())
/// # }
/// ```
pub struct ScanEngine {
    provider: Arc<dyn ConnectionProvider>,
    settings: ScanSettings,
    registry: TableStatsRegistry,
}

impl ScanEngine {
    /// Creates an engine with default settings and the built-in table
    /// statistics strategies.
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            settings: ScanSettings::default(),
            registry: TableStatsRegistry::with_defaults(),
        }
    }

    /// Builder method to replace the scan settings.
    pub fn with_settings(mut self, settings: ScanSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Builder method to replace the table statistics registry.
    pub fn with_registry(mut self, registry: TableStatsRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Active settings.
    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    async fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn MetadataConnection>> {
        let connection = self.provider.open(config).await?;
        Ok(Box::new(TimeoutConnection::new(
            connection,
            self.settings.query_timeout,
        )))
    }

    /// Opens a connection and runs the dialect probe statement.
    ///
    /// # Errors
    /// `DriverNotFound` or `Connection` when the source cannot be reached,
    /// `QueryExecution` when the probe fails.
    pub async fn test_connection(&self, config: &ConnectionConfig) -> Result<()> {
        let strategy = dialect_strategy(config.dialect);
        let mut connection = self.open(config).await?;
        let probed = connection.query(strategy.probe_sql()).await.map(|_| ());
        release(connection).await;

        if probed.is_ok() {
            info!("Connection test passed: {}", config);
        }
        probed
    }

    /// Lists the tables of a schema.
    ///
    /// # Errors
    /// Fails on invalid settings, connection failure or a failing page
    /// query.
    pub async fn list_tables(
        &self,
        config: &ConnectionConfig,
        schema: &str,
    ) -> Result<BTreeMap<String, TableSnapshot>> {
        self.settings.validate()?;
        let strategy = dialect_strategy(config.dialect);
        let mut report = StatisticsReport::default();
        self.list_tables_into(config, strategy.as_ref(), schema, &mut report)
            .await
    }

    /// Introspects the columns of one table and, unless disabled, computes
    /// their statistics.
    ///
    /// # Errors
    /// Fails on invalid settings, connection failure or a failing column
    /// metadata query. Statistic failures only leave keys out.
    pub async fn list_columns(
        &self,
        config: &ConnectionConfig,
        schema: &str,
        table: &str,
        type_map: &TypeMap,
    ) -> Result<BTreeMap<String, ColumnSnapshot>> {
        self.settings.validate()?;
        let strategy = dialect_strategy(config.dialect);
        let mut report = StatisticsReport::default();

        let mut connection = self.open(config).await?;
        let columns = self
            .introspect(
                connection.as_mut(),
                strategy.as_ref(),
                schema,
                table,
                type_map,
                &mut report,
            )
            .await;
        release(connection).await;
        columns.map(by_field_name)
    }

    /// Appends dialect storage statistics to a listed table.
    ///
    /// Returns whether anything was appended.
    ///
    /// # Errors
    /// Only connection failures propagate; a failing strategy appends
    /// nothing.
    pub async fn collect_table_statistics(
        &self,
        config: &ConnectionConfig,
        schema: &str,
        table: &mut TableSnapshot,
    ) -> Result<bool> {
        let strategy = dialect_strategy(config.dialect);
        let mut report = StatisticsReport::default();

        let mut connection = self.open(config).await?;
        let appended = self
            .registry
            .collect_for(
                connection.as_mut(),
                strategy.as_ref(),
                schema,
                table,
                &mut report,
            )
            .await;
        release(connection).await;
        Ok(appended)
    }

    /// Scans a whole schema.
    ///
    /// Tables run through a pool of `max_concurrency` tasks, one connection
    /// per table; the statements of one table run sequentially. `cancel` is
    /// checked before each table starts. A table whose scan fails with a
    /// recoverable error becomes a warning; a fatal error (connection,
    /// driver, credentials) stops remaining tables and is returned once the
    /// tables in flight have finished.
    ///
    /// # Errors
    /// Fails on invalid settings, a failing table listing or a fatal table
    /// error.
    pub async fn scan_schema(
        &self,
        config: &ConnectionConfig,
        schema: &str,
        type_map: &TypeMap,
        cancel: &CancellationToken,
    ) -> Result<SchemaSnapshot> {
        self.settings.validate()?;
        let collected_at = Utc::now();
        let strategy = dialect_strategy(config.dialect);
        info!(schema = %schema, "Starting schema scan: {}", config);

        let mut report = StatisticsReport::default();
        let listed = self.list_tables_into(config, strategy.as_ref(), schema, &mut report).await?;
        info!(schema = %schema, tables = listed.len(), "Tables listed");

        let stop = cancel.child_token();
        let mut tables = BTreeMap::new();
        let mut columns = BTreeMap::new();
        let mut warnings = Vec::new();
        let mut fatal: Option<MetaScanError> = None;

        let mut outcomes = stream::iter(listed.into_values())
            .map(|table| self.scan_table(config, strategy.as_ref(), schema, type_map, &stop, table))
            .buffer_unordered(self.settings.max_concurrency);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                TableOutcome::Scanned {
                    table,
                    columns: table_columns,
                    report: table_report,
                } => {
                    report.merge(table_report);
                    columns.insert(table.name.clone(), by_field_name(table_columns));
                    tables.insert(table.name.clone(), table);
                }
                TableOutcome::Failed { table, error } if error.is_fatal() => {
                    error!(table = %table.name, "Aborting scan: {}", error);
                    stop.cancel();
                    if fatal.is_none() {
                        fatal = Some(error);
                    }
                    tables.insert(table.name.clone(), table);
                }
                TableOutcome::Failed { table, error } => {
                    warn!(table = %table.name, "Table skipped: {}", error);
                    warnings.push(format!("{}: {}", table.name, error));
                    tables.insert(table.name.clone(), table);
                }
                TableOutcome::Skipped { table } => {
                    tables.insert(table.name.clone(), table);
                }
            }
        }
        drop(outcomes);

        if let Some(error) = fatal {
            return Err(error);
        }

        let cancelled = cancel.is_cancelled();
        if cancelled {
            warn!(schema = %schema, scanned = columns.len(), "Scan cancelled");
        }

        let summary = DataSourceStatistics::from_parts(&tables, &columns);
        info!(
            schema = %schema,
            tables = summary.table_count,
            fields = summary.field_count,
            warnings = warnings.len(),
            "Schema scan complete"
        );

        Ok(SchemaSnapshot {
            schema: schema.to_string(),
            dialect: config.dialect,
            collected_at,
            cancelled,
            tables,
            columns,
            warnings,
            report,
            summary,
        })
    }

    async fn list_tables_into(
        &self,
        config: &ConnectionConfig,
        strategy: &dyn DialectStrategy,
        schema: &str,
        report: &mut StatisticsReport,
    ) -> Result<BTreeMap<String, TableSnapshot>> {
        let mut connection = self.open(config).await?;
        let listed = TableEnumerator::new(strategy, &self.settings)
            .list_tables(connection.as_mut(), schema, report)
            .await;
        release(connection).await;
        listed
    }

    async fn scan_table(
        &self,
        config: &ConnectionConfig,
        strategy: &dyn DialectStrategy,
        schema: &str,
        type_map: &TypeMap,
        stop: &CancellationToken,
        mut table: TableSnapshot,
    ) -> TableOutcome {
        if stop.is_cancelled() {
            debug!(table = %table.name, "Skipping table after stop");
            return TableOutcome::Skipped { table };
        }

        info!(table = %table.name, "Scanning table");
        let mut connection = match self.open(config).await {
            Ok(connection) => connection,
            Err(error) => return TableOutcome::Failed { table, error },
        };

        let mut report = StatisticsReport::default();
        let scanned = self
            .introspect(
                connection.as_mut(),
                strategy,
                schema,
                &table.name,
                type_map,
                &mut report,
            )
            .await;
        let scanned = match scanned {
            Ok(columns) => {
                self.registry
                    .collect_for(connection.as_mut(), strategy, schema, &mut table, &mut report)
                    .await;
                Ok(columns)
            }
            Err(error) => Err(error),
        };
        release(connection).await;

        match scanned {
            Ok(columns) => TableOutcome::Scanned {
                table,
                columns,
                report,
            },
            Err(error) => TableOutcome::Failed { table, error },
        }
    }

    async fn introspect(
        &self,
        connection: &mut dyn MetadataConnection,
        strategy: &dyn DialectStrategy,
        schema: &str,
        table: &str,
        type_map: &TypeMap,
        report: &mut StatisticsReport,
    ) -> Result<Vec<ColumnSnapshot>> {
        let mut columns = ColumnIntrospector::new(strategy)
            .list_columns(connection, schema, table, type_map, report)
            .await?;

        if self.settings.collect_statistics {
            StatisticsCollector::new(strategy, &self.settings)
                .collect(connection, schema, table, &mut columns, report)
                .await;
        }
        Ok(columns)
    }
}
