//! Dialect-specific table statistics.
//!
//! Row counts, data and index sizes and key/index presence come from each
//! vendor's system catalog. A registry maps dialects to strategies and falls
//! back to a portable `COUNT(*)` for dialects without one.

use super::report::{StatisticKind, StatisticsReport};
use crate::Result;
use crate::adapters::generic::GenericTableStats;
use crate::adapters::mssql::SqlServerTableStats;
use crate::adapters::oracle::OracleTableStats;
use crate::adapters::postgres::PostgresTableStats;
use crate::adapters::{DialectKind, DialectStrategy, MetadataConnection};
use crate::models::{TableSnapshot, TableStorageStats, keys};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One way of collecting table storage statistics.
#[async_trait]
pub trait TableStatsStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Collects the figures for one table.
    ///
    /// # Errors
    /// Returns `QueryExecution` when a catalog query fails or the table is
    /// missing from the catalog.
    async fn collect(
        &self,
        connection: &mut dyn MetadataConnection,
        dialect: &dyn DialectStrategy,
        schema: &str,
        table: &str,
    ) -> Result<TableStorageStats>;
}

/// Dialect to strategy mapping with a generic fallback.
#[derive(Clone)]
pub struct TableStatsRegistry {
    strategies: HashMap<DialectKind, Arc<dyn TableStatsStrategy>>,
    fallback: Arc<dyn TableStatsStrategy>,
}

impl Default for TableStatsRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for TableStatsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut registered: Vec<(&str, &str)> = self
            .strategies
            .iter()
            .map(|(kind, strategy)| (kind.as_str(), strategy.name()))
            .collect();
        registered.sort_unstable();
        f.debug_struct("TableStatsRegistry")
            .field("strategies", &registered)
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

impl TableStatsRegistry {
    /// Registry with no dialect strategies, only the generic fallback.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
            fallback: Arc::new(GenericTableStats),
        }
    }

    /// Registry with the built-in catalog strategies.
    ///
    /// MySQL-family listings always carry a `table_rows` entry, empty for
    /// views, so those dialects never reach the fallback.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        let postgres: Arc<dyn TableStatsStrategy> = Arc::new(PostgresTableStats);
        for kind in [
            DialectKind::PostgreSql,
            DialectKind::OpenGauss,
            DialectKind::Hologres,
        ] {
            registry.register(kind, Arc::clone(&postgres));
        }
        registry.register(DialectKind::Oracle, Arc::new(OracleTableStats));
        registry.register(DialectKind::SqlServer, Arc::new(SqlServerTableStats));
        registry
    }

    /// Registers or replaces the strategy of a dialect.
    pub fn register(&mut self, kind: DialectKind, strategy: Arc<dyn TableStatsStrategy>) {
        self.strategies.insert(kind, strategy);
    }

    /// Strategy for a dialect, or the fallback.
    pub fn lookup(&self, kind: DialectKind) -> Arc<dyn TableStatsStrategy> {
        self.strategies
            .get(&kind)
            .map_or_else(|| Arc::clone(&self.fallback), Arc::clone)
    }

    /// Appends storage statistics to a table that has none yet.
    ///
    /// Tables already carrying `table_rows` (from listing enrichment) are
    /// left untouched. A failing strategy appends nothing and is recorded in
    /// `report`. Returns whether anything was appended.
    pub async fn collect_for(
        &self,
        connection: &mut dyn MetadataConnection,
        dialect: &dyn DialectStrategy,
        schema: &str,
        table: &mut TableSnapshot,
        report: &mut StatisticsReport,
    ) -> bool {
        if table.advanced_params.contains_key(keys::TABLE_ROWS) {
            debug!(table = %table.name, "Storage statistics already present");
            return false;
        }

        let strategy = self.lookup(dialect.kind());
        debug!(table = %table.name, strategy = strategy.name(), "Collecting storage statistics");
        let outcome = strategy
            .collect(connection, dialect, schema, &table.name)
            .await;

        match report.record(&table.name, None, StatisticKind::TableStorage, outcome) {
            Some(stats) if !stats.is_empty() => {
                table.append_storage_stats(&stats);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::QueryRow;
    use crate::adapters::dialect_strategy;
    use crate::testing::ScriptedConnection;

    #[test]
    fn test_registry_lookup_and_fallback() {
        let registry = TableStatsRegistry::with_defaults();
        assert_eq!(registry.lookup(DialectKind::Hologres).name(), "postgres");
        assert_eq!(registry.lookup(DialectKind::Oracle).name(), "oracle");
        assert_eq!(registry.lookup(DialectKind::SqlServer).name(), "sqlserver");
        assert_eq!(registry.lookup(DialectKind::Doris).name(), "generic");
        assert_eq!(registry.lookup(DialectKind::Inceptor).name(), "generic");
    }

    #[tokio::test]
    async fn test_existing_table_rows_skip_collection() {
        let registry = TableStatsRegistry::with_defaults();
        let dialect = dialect_strategy(DialectKind::MySql);
        let mut connection = ScriptedConnection::new();
        let mut table = TableSnapshot::new("orders");
        table.advanced_params.push(keys::TABLE_ROWS, Some("10".to_string()));
        let mut report = StatisticsReport::default();

        let appended = registry
            .collect_for(&mut connection, dialect.as_ref(), "shop", &mut table, &mut report)
            .await;

        assert!(!appended);
        assert!(connection.executed().is_empty());
        assert_eq!(table.advanced_params.len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_appends_row_count_only() {
        let registry = TableStatsRegistry::with_defaults();
        let dialect = dialect_strategy(DialectKind::Doris);
        let mut connection = ScriptedConnection::new().on(
            "COUNT(*)",
            vec![QueryRow::default().with("table_rows", Some("42"))],
        );
        let mut table = TableSnapshot::new("events");
        let mut report = StatisticsReport::default();

        assert!(
            registry
                .collect_for(&mut connection, dialect.as_ref(), "dw", &mut table, &mut report)
                .await
        );
        assert_eq!(table.advanced_params.keys(), vec!["table_rows"]);
        assert_eq!(table.row_count, Some(42));
        assert!(connection.executed()[0].contains("FROM `dw`.`events`"));
    }

    #[tokio::test]
    async fn test_failure_appends_nothing() {
        let registry = TableStatsRegistry::with_defaults();
        let dialect = dialect_strategy(DialectKind::PostgreSql);
        let mut connection = ScriptedConnection::new().fail_on("pg_class", "permission denied");
        let mut table = TableSnapshot::new("orders");
        let mut report = StatisticsReport::default();

        let appended = registry
            .collect_for(&mut connection, dialect.as_ref(), "public", &mut table, &mut report)
            .await;

        assert!(!appended);
        assert!(table.advanced_params.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, StatisticKind::TableStorage);
    }
}
