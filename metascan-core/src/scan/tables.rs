//! Paginated table enumeration.

use super::report::{StatisticKind, StatisticsReport};
use crate::Result;
use crate::adapters::catalog::render_table_query;
use crate::adapters::{DialectStrategy, MetadataConnection, ScanSettings};
use crate::models::{ScanSourceKind, TableSnapshot};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Lists every table of a schema through the dialect's listing template.
pub struct TableEnumerator<'a> {
    dialect: &'a dyn DialectStrategy,
    page_size: u64,
}

impl<'a> TableEnumerator<'a> {
    /// Creates an enumerator paging with `settings.page_size`.
    pub fn new(dialect: &'a dyn DialectStrategy, settings: &ScanSettings) -> Self {
        Self {
            dialect,
            page_size: settings.page_size.max(1),
        }
    }

    /// Lists the tables of `schema`, keyed by table name.
    ///
    /// Pages are requested at offsets 0, P, 2P, ... until a page returns
    /// fewer than P rows. A listing that is an exact multiple of P therefore
    /// ends with one empty page. Names repeated across pages keep the last
    /// row seen. Enrichment failures are recorded in `report` and leave the
    /// table with whatever facts were applied.
    ///
    /// # Errors
    /// A failing page query aborts the listing with its error.
    pub async fn list_tables(
        &self,
        connection: &mut dyn MetadataConnection,
        schema: &str,
        report: &mut StatisticsReport,
    ) -> Result<BTreeMap<String, TableSnapshot>> {
        let template = self.dialect.entry().table_template;
        let mut tables = BTreeMap::new();
        let mut offset: u64 = 0;

        loop {
            let sql = render_table_query(template, schema, offset, self.page_size);
            let rows = connection.query(&sql).await?;
            let fetched = rows.len();
            debug!(schema = %schema, offset, fetched, "Fetched table page");

            for row in &rows {
                let Some(name) = row.get_string("table_name") else {
                    warn!(schema = %schema, "Skipping listing row without table_name");
                    continue;
                };

                let mut table = TableSnapshot::new(name.clone());
                table.description = row.get_string("remarks").filter(|r| !r.is_empty());
                table.scan_source_kind = ScanSourceKind::from_table_type(row.get_str("table_type"));

                let enriched = self
                    .dialect
                    .enrich_table(connection, schema, row, &mut table)
                    .await;
                report.record(&name, None, StatisticKind::TableEnrichment, enriched);

                tables.insert(name, table);
            }

            if (fetched as u64) < self.page_size {
                break;
            }
            offset = offset.saturating_add(self.page_size);
        }

        debug!(schema = %schema, tables = tables.len(), "Table listing complete");
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{DialectKind, QueryRow, dialect_strategy};
    use crate::models::keys;
    use crate::testing::ScriptedConnection;

    fn table_row(name: &str, kind: &str) -> QueryRow {
        QueryRow::default()
            .with("table_name", Some(name))
            .with("remarks", Some(""))
            .with("table_type", Some(kind))
    }

    fn page(names: std::ops::Range<usize>) -> Vec<QueryRow> {
        names.map(|i| table_row(&format!("t{:04}", i), "table")).collect()
    }

    #[tokio::test]
    async fn test_pages_until_short_page() {
        let mut connection = ScriptedConnection::new()
            .on("OFFSET 0", page(0..1000))
            .on("OFFSET 1000", page(1000..2000))
            .on("OFFSET 2000", page(2000..2500));
        let dialect = dialect_strategy(DialectKind::Doris);
        let settings = ScanSettings::default();
        let mut report = StatisticsReport::default();

        let tables = TableEnumerator::new(dialect.as_ref(), &settings)
            .list_tables(&mut connection, "dw", &mut report)
            .await
            .unwrap();

        assert_eq!(tables.len(), 2500);
        assert_eq!(connection.executed().len(), 3);
        assert!(connection.executed()[2].contains("LIMIT 1000 OFFSET 2000"));
    }

    #[tokio::test]
    async fn test_exact_multiple_ends_with_empty_page() {
        let mut connection = ScriptedConnection::new()
            .on("OFFSET 0", page(0..2))
            .on("OFFSET 2", page(2..4));
        let dialect = dialect_strategy(DialectKind::Doris);
        let settings = ScanSettings::default().with_page_size(2);
        let mut report = StatisticsReport::default();

        let tables = TableEnumerator::new(dialect.as_ref(), &settings)
            .list_tables(&mut connection, "dw", &mut report)
            .await
            .unwrap();

        assert_eq!(tables.len(), 4);
        assert_eq!(connection.executed().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_schema() {
        let mut connection = ScriptedConnection::new();
        let dialect = dialect_strategy(DialectKind::PostgreSql);
        let mut report = StatisticsReport::default();

        let tables = TableEnumerator::new(dialect.as_ref(), &ScanSettings::default())
            .list_tables(&mut connection, "empty", &mut report)
            .await
            .unwrap();

        assert!(tables.is_empty());
        assert_eq!(connection.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_page_failure_aborts() {
        let mut connection = ScriptedConnection::new().fail_on("pg_class", "relation does not exist");
        let dialect = dialect_strategy(DialectKind::PostgreSql);
        let mut report = StatisticsReport::default();

        let result = TableEnumerator::new(dialect.as_ref(), &ScanSettings::default())
            .list_tables(&mut connection, "public", &mut report)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_kinds_comments_and_duplicates() {
        let mut connection = ScriptedConnection::new().on(
            "OFFSET 0",
            vec![
                table_row("orders", "table").with("remarks", Some("first")),
                table_row("v_orders", "view"),
                table_row("ext", "foreign"),
                QueryRow::default()
                    .with("table_name", Some("orders"))
                    .with("remarks", Some("customer orders"))
                    .with("table_type", Some("table")),
            ],
        );
        let dialect = dialect_strategy(DialectKind::PostgreSql);
        let mut report = StatisticsReport::default();

        let tables = TableEnumerator::new(dialect.as_ref(), &ScanSettings::default())
            .list_tables(&mut connection, "public", &mut report)
            .await
            .unwrap();

        assert_eq!(tables.len(), 3);
        assert_eq!(tables["orders"].description.as_deref(), Some("customer orders"));
        assert_eq!(tables["v_orders"].scan_source_kind, Some(ScanSourceKind::View));
        assert_eq!(tables["v_orders"].description, None);
        assert_eq!(tables["ext"].scan_source_kind, None);
    }

    #[tokio::test]
    async fn test_mysql_listing_enriched_and_enrichment_failure_recorded() {
        let mut connection = ScriptedConnection::new()
            .fail_on("information_schema.STATISTICS", "access denied")
            .on(
                "information_schema.TABLES",
                vec![table_row("orders", "table")
                    .with("engine", Some("InnoDB"))
                    .with("table_rows", Some("7"))],
            );
        let dialect = dialect_strategy(DialectKind::MySql);
        let mut report = StatisticsReport::default();

        let tables = TableEnumerator::new(dialect.as_ref(), &ScanSettings::default())
            .list_tables(&mut connection, "shop", &mut report)
            .await
            .unwrap();

        let orders = &tables["orders"];
        assert_eq!(orders.advanced_params.get(keys::ENGINE), Some("InnoDB"));
        assert_eq!(orders.row_count, Some(7));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, StatisticKind::TableEnrichment);
    }
}
