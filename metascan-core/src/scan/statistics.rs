//! Per-column statistics with adaptive sampling.
//!
//! For every eligible column three aggregates run over the table, or over a
//! bounded sub-select when the table exceeds the sampling threshold: the
//! null ratio, the distinct count and the top-K value distribution. Each
//! aggregate fails on its own; the column simply lacks the matching keys.

use super::report::{StatisticKind, StatisticsReport};
use crate::Result;
use crate::adapters::helpers::fetch_first;
use crate::adapters::{DialectStrategy, MetadataConnection, ScanSettings};
use crate::models::{
    ColumnSnapshot, FieldStatistics, NullStatistics, UniqueStatistics, ValueDistributionEntry,
};
use tracing::{debug, info};

const EXCLUDED_TYPES: [&str; 4] = ["blob", "clob", "text", "binary"];

const STATISTIC_TYPES: [&str; 12] = [
    "int", "bigint", "smallint", "tinyint", "decimal", "numeric", "float", "double", "varchar",
    "char", "date", "time",
];

/// Whether a column type gets statistics.
///
/// Large-object and binary types are excluded; otherwise the type must name
/// an integer, decimal, floating, character or temporal family.
pub fn is_eligible(field_type: Option<&str>) -> bool {
    let Some(field_type) = field_type else {
        return false;
    };
    let lower = field_type.to_lowercase();
    if EXCLUDED_TYPES.iter().any(|t| lower.contains(t)) {
        return false;
    }
    STATISTIC_TYPES.iter().any(|t| lower.contains(t))
}

/// Where the aggregates of one table read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingPlan {
    /// Row count from `COUNT(*)`, 0 when unknown
    pub total_rows: u64,
    /// Rows in the sub-select, `None` for the full table
    pub sample_limit: Option<u64>,
    /// `FROM` clause target
    pub source: String,
}

impl SamplingPlan {
    /// True when aggregates run on a sample.
    pub fn is_sampled(&self) -> bool {
        self.sample_limit.is_some()
    }
}

/// Computes column statistics for one table, one statement at a time.
pub struct StatisticsCollector<'a> {
    dialect: &'a dyn DialectStrategy,
    settings: &'a ScanSettings,
}

impl<'a> StatisticsCollector<'a> {
    /// Creates a collector.
    pub fn new(dialect: &'a dyn DialectStrategy, settings: &'a ScanSettings) -> Self {
        Self { dialect, settings }
    }

    /// Decides between full-table and sampled aggregates.
    ///
    /// A failing row count is recorded and treated as 0, which never samples.
    pub async fn plan(
        &self,
        connection: &mut dyn MetadataConnection,
        schema: &str,
        table: &str,
        report: &mut StatisticsReport,
    ) -> SamplingPlan {
        let qualified = self.dialect.qualified_table(schema, table);
        let sql = format!("SELECT COUNT(*) AS row_count FROM {}", qualified);
        let counted = fetch_first(connection, &sql)
            .await
            .map(|row| row.and_then(|r| r.get_i64("row_count")).unwrap_or(0));
        let total_rows = report
            .record(table, None, StatisticKind::RowCount, counted)
            .map_or(0, |count| u64::try_from(count).unwrap_or(0));

        let sample_limit = self.settings.sample_limit_for(total_rows);
        let source = match sample_limit {
            Some(limit) => self
                .dialect
                .entry()
                .row_limit
                .sampled_source(&qualified, limit),
            None => qualified,
        };

        SamplingPlan {
            total_rows,
            sample_limit,
            source,
        }
    }

    /// Null percentage of a column.
    pub fn null_ratio_sql(&self, field: &str, source: &str) -> String {
        format!(
            "SELECT COUNT(CASE WHEN {f} IS NULL THEN 1 END) * 100.0 / NULLIF(COUNT(*), 0) AS null_ratio FROM {s}",
            f = self.dialect.quote_identifier(field),
            s = source
        )
    }

    /// Distinct count of a column and row count of the source.
    pub fn uniqueness_sql(&self, field: &str, source: &str) -> String {
        format!(
            "SELECT COUNT(DISTINCT {f}) AS unique_count, COUNT(*) AS source_rows FROM {s}",
            f = self.dialect.quote_identifier(field),
            s = source
        )
    }

    /// Most frequent non-null values of a column.
    pub fn distribution_sql(&self, field: &str, source: &str) -> String {
        let f = self.dialect.quote_identifier(field);
        let body = format!(
            "{f} AS dist_value, COUNT(*) AS dist_count FROM {s} WHERE {f} IS NOT NULL \
             GROUP BY {f} ORDER BY dist_count DESC",
            f = f,
            s = source
        );
        self.dialect
            .entry()
            .row_limit
            .limit_select(&body, self.settings.distribution_top_k)
    }

    /// Appends statistics to every eligible column of a table.
    pub async fn collect(
        &self,
        connection: &mut dyn MetadataConnection,
        schema: &str,
        table: &str,
        columns: &mut [ColumnSnapshot],
        report: &mut StatisticsReport,
    ) {
        let eligible = columns
            .iter()
            .filter(|c| is_eligible(c.field_type.as_deref()))
            .count();
        report.skipped_fields = report
            .skipped_fields
            .saturating_add(columns.len().saturating_sub(eligible));
        if eligible == 0 {
            debug!(table = %table, "No column eligible for statistics");
            return;
        }

        let plan = self.plan(connection, schema, table, report).await;
        if plan.is_sampled() {
            report.sampled_tables = report.sampled_tables.saturating_add(1);
            info!(
                table = %table,
                total_rows = plan.total_rows,
                sample = plan.sample_limit.unwrap_or_default(),
                "Sampling large table for statistics"
            );
        }

        for column in columns
            .iter_mut()
            .filter(|c| is_eligible(c.field_type.as_deref()))
        {
            let stats = self
                .field_statistics(connection, &plan, table, &column.field_name, report)
                .await;
            column.append_statistics(&stats);
            if !stats.is_empty() {
                report.analyzed_fields = report.analyzed_fields.saturating_add(1);
            }
        }
    }

    async fn field_statistics(
        &self,
        connection: &mut dyn MetadataConnection,
        plan: &SamplingPlan,
        table: &str,
        field: &str,
        report: &mut StatisticsReport,
    ) -> FieldStatistics {
        let nulls = self.null_statistics(connection, plan, field).await;
        let unique = self.unique_statistics(connection, plan, field).await;
        let distribution = self.value_distribution(connection, plan, field).await;

        FieldStatistics {
            nulls: report.record(table, Some(field), StatisticKind::NullRatio, nulls),
            unique: report.record(table, Some(field), StatisticKind::Uniqueness, unique),
            distribution: report.record(table, Some(field), StatisticKind::Distribution, distribution),
        }
    }

    async fn null_statistics(
        &self,
        connection: &mut dyn MetadataConnection,
        plan: &SamplingPlan,
        field: &str,
    ) -> Result<NullStatistics> {
        let sql = self.null_ratio_sql(field, &plan.source);
        let null_ratio = fetch_first(connection, &sql)
            .await?
            .and_then(|row| row.get_f64("null_ratio"))
            .unwrap_or(0.0)
            .clamp(0.0, 100.0);

        let null_count = if plan.is_sampled() || plan.total_rows == 0 {
            0
        } else {
            (null_ratio * plan.total_rows as f64 / 100.0).round() as i64
        };

        Ok(NullStatistics {
            null_ratio,
            null_count,
        })
    }

    async fn unique_statistics(
        &self,
        connection: &mut dyn MetadataConnection,
        plan: &SamplingPlan,
        field: &str,
    ) -> Result<UniqueStatistics> {
        let sql = self.uniqueness_sql(field, &plan.source);
        let row = fetch_first(connection, &sql).await?.unwrap_or_default();
        let unique_count = row.get_i64("unique_count").unwrap_or(0);
        let source_rows = row.get_i64("source_rows").unwrap_or(0);

        let unique_ratio = if source_rows > 0 {
            unique_count as f64 * 100.0 / source_rows as f64
        } else {
            0.0
        };

        Ok(UniqueStatistics {
            unique_count,
            unique_ratio,
        })
    }

    async fn value_distribution(
        &self,
        connection: &mut dyn MetadataConnection,
        plan: &SamplingPlan,
        field: &str,
    ) -> Result<Vec<ValueDistributionEntry>> {
        let sql = self.distribution_sql(field, &plan.source);
        let mut entries: Vec<ValueDistributionEntry> = connection
            .query(&sql)
            .await?
            .into_iter()
            .map(|row| {
                ValueDistributionEntry::from_raw(
                    row.get_string("dist_value"),
                    row.get_i64("dist_count").unwrap_or(0),
                )
            })
            .collect();

        entries.sort_by(|a, b| b.count.cmp(&a.count));
        entries.truncate(usize::try_from(self.settings.distribution_top_k).unwrap_or(usize::MAX));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{DialectKind, QueryRow, dialect_strategy};
    use crate::models::keys;
    use crate::testing::ScriptedConnection;

    fn column(name: &str, field_type: &str) -> ColumnSnapshot {
        let mut column = ColumnSnapshot::new("orders", name);
        column.field_type = Some(field_type.to_string());
        column
    }

    fn count_row(rows: &str) -> Vec<QueryRow> {
        vec![QueryRow::default().with("row_count", Some(rows))]
    }

    #[test]
    fn test_eligibility() {
        assert!(is_eligible(Some("VARCHAR")));
        assert!(is_eligible(Some("bigint")));
        assert!(is_eligible(Some("TIMESTAMP")));
        assert!(!is_eligible(Some("LONGTEXT")));
        assert!(!is_eligible(Some("varbinary")));
        assert!(!is_eligible(Some("CLOB")));
        assert!(!is_eligible(Some("json")));
        assert!(!is_eligible(None));
    }

    #[tokio::test]
    async fn test_small_table_uses_full_source() {
        let dialect = dialect_strategy(DialectKind::MySql);
        let settings = ScanSettings::default();
        let mut connection = ScriptedConnection::new()
            .on("AS row_count", count_row("200"))
            .on(
                "AS null_ratio",
                vec![QueryRow::default().with("null_ratio", Some("12.5"))],
            )
            .on(
                "AS unique_count",
                vec![QueryRow::default()
                    .with("unique_count", Some("150"))
                    .with("source_rows", Some("200"))],
            )
            .on(
                "AS dist_value",
                vec![
                    QueryRow::default()
                        .with("dist_value", Some("paid"))
                        .with("dist_count", Some("120")),
                    QueryRow::default()
                        .with("dist_value", Some("open"))
                        .with("dist_count", Some("55")),
                ],
            );
        let mut columns = vec![column("status", "VARCHAR"), column("payload", "BLOB")];
        let mut report = StatisticsReport::default();

        StatisticsCollector::new(dialect.as_ref(), &settings)
            .collect(&mut connection, "shop", "orders", &mut columns, &mut report)
            .await;

        let status = &columns[0].advanced_params;
        assert_eq!(status.get(keys::NULL_RATIO), Some("12.50"));
        assert_eq!(status.get(keys::NULL_COUNT), Some("25"));
        assert_eq!(status.get(keys::UNIQUE_COUNT), Some("150"));
        assert_eq!(status.get(keys::UNIQUE_RATIO), Some("75.00"));
        assert_eq!(
            status.get(keys::VALUE_DISTRIBUTION),
            Some(r#"[{"value":"paid","count":120},{"value":"open","count":55}]"#)
        );
        assert!(columns[1].advanced_params.is_empty());
        assert_eq!(report.analyzed_fields, 1);
        assert_eq!(report.skipped_fields, 1);

        for sql in connection.executed() {
            assert!(!sql.contains("LIMIT 100000"), "unexpected sample: {}", sql);
        }
        assert!(
            connection.executed_matching("AS null_ratio")[0].ends_with("FROM `shop`.`orders`")
        );
    }

    #[tokio::test]
    async fn test_large_table_is_sampled() {
        let dialect = dialect_strategy(DialectKind::MySql);
        let settings = ScanSettings::default();
        let mut connection = ScriptedConnection::new()
            .on("AS row_count", count_row("5000000"))
            .on(
                "AS null_ratio",
                vec![QueryRow::default().with("null_ratio", Some("10"))],
            );
        let mut columns = vec![column("customer_id", "INT")];
        let mut report = StatisticsReport::default();

        StatisticsCollector::new(dialect.as_ref(), &settings)
            .collect(&mut connection, "shop", "orders", &mut columns, &mut report)
            .await;

        for sql in connection.executed_matching("customer_id") {
            assert!(
                sql.contains("(SELECT * FROM `shop`.`orders` LIMIT 100000) AS t"),
                "not sampled: {}",
                sql
            );
        }
        assert_eq!(columns[0].advanced_params.get(keys::NULL_COUNT), Some("0"));
        assert_eq!(report.sampled_tables, 1);
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let dialect = dialect_strategy(DialectKind::PostgreSql);
        let settings = ScanSettings::default();
        let mut connection = ScriptedConnection::new().on("AS row_count", count_row("1000000"));
        let mut report = StatisticsReport::default();

        let plan = StatisticsCollector::new(dialect.as_ref(), &settings)
            .plan(&mut connection, "public", "orders", &mut report)
            .await;

        assert!(!plan.is_sampled());
        assert_eq!(plan.source, "\"public\".\"orders\"");
    }

    #[tokio::test]
    async fn test_row_count_failure_means_full_table() {
        let dialect = dialect_strategy(DialectKind::SqlServer);
        let settings = ScanSettings::default();
        let mut connection = ScriptedConnection::new().fail_on("AS row_count", "timeout");
        let mut report = StatisticsReport::default();

        let plan = StatisticsCollector::new(dialect.as_ref(), &settings)
            .plan(&mut connection, "dbo", "Orders", &mut report)
            .await;

        assert_eq!(plan.total_rows, 0);
        assert!(!plan.is_sampled());
        assert_eq!(report.failures[0].kind, StatisticKind::RowCount);
    }

    #[tokio::test]
    async fn test_failing_uniqueness_keeps_other_statistics() {
        let dialect = dialect_strategy(DialectKind::MySql);
        let settings = ScanSettings::default();
        let mut connection = ScriptedConnection::new()
            .on("AS row_count", count_row("10"))
            .on(
                "AS null_ratio",
                vec![QueryRow::default().with("null_ratio", Some("0"))],
            )
            .fail_on("AS unique_count", "lock wait timeout")
            .on(
                "AS dist_value",
                vec![QueryRow::default()
                    .with("dist_value", Some("a"))
                    .with("dist_count", Some("10"))],
            );
        let mut columns = vec![column("code", "CHAR"), column("amount", "DECIMAL")];
        let mut report = StatisticsReport::default();

        StatisticsCollector::new(dialect.as_ref(), &settings)
            .collect(&mut connection, "shop", "orders", &mut columns, &mut report)
            .await;

        for column in &columns {
            let params = &column.advanced_params;
            assert_eq!(
                params.keys(),
                vec!["null_ratio", "null_count", "value_distribution"]
            );
        }
        assert_eq!(report.failures_for("orders", "code").len(), 1);
        assert_eq!(report.analyzed_fields, 2);
    }

    #[tokio::test]
    async fn test_failing_column_leaves_sibling_complete() {
        let dialect = dialect_strategy(DialectKind::MySql);
        let settings = ScanSettings::default();
        let mut connection = ScriptedConnection::new()
            .fail_on("`code`", "Unknown column 'code'")
            .on("AS row_count", count_row("4"))
            .on(
                "AS null_ratio",
                vec![QueryRow::default().with("null_ratio", Some("25"))],
            )
            .on(
                "AS unique_count",
                vec![QueryRow::default()
                    .with("unique_count", Some("2"))
                    .with("source_rows", Some("4"))],
            )
            .on(
                "AS dist_value",
                vec![QueryRow::default()
                    .with("dist_value", Some("9.99"))
                    .with("dist_count", Some("2"))],
            );
        let mut columns = vec![column("code", "CHAR"), column("amount", "DECIMAL")];
        let mut report = StatisticsReport::default();

        StatisticsCollector::new(dialect.as_ref(), &settings)
            .collect(&mut connection, "shop", "orders", &mut columns, &mut report)
            .await;

        assert!(columns[0].advanced_params.is_empty());
        assert_eq!(report.failures_for("orders", "code").len(), 3);

        let amount = &columns[1].advanced_params;
        assert_eq!(
            amount.keys(),
            vec![
                "null_ratio",
                "null_count",
                "unique_count",
                "unique_ratio",
                "value_distribution"
            ]
        );
        assert_eq!(amount.get(keys::NULL_COUNT), Some("1"));
        assert_eq!(amount.get(keys::UNIQUE_RATIO), Some("50.00"));
        assert!(report.failures_for("orders", "amount").is_empty());
        assert_eq!(report.analyzed_fields, 1);
    }

    #[tokio::test]
    async fn test_empty_table_ratios_are_zero() {
        let dialect = dialect_strategy(DialectKind::MySql);
        let settings = ScanSettings::default();
        let mut connection = ScriptedConnection::new()
            .on("AS row_count", count_row("0"))
            .on(
                "AS null_ratio",
                vec![QueryRow::default().with("null_ratio", None)],
            )
            .on(
                "AS unique_count",
                vec![QueryRow::default()
                    .with("unique_count", Some("0"))
                    .with("source_rows", Some("0"))],
            );
        let mut columns = vec![column("id", "INT")];
        let mut report = StatisticsReport::default();

        StatisticsCollector::new(dialect.as_ref(), &settings)
            .collect(&mut connection, "shop", "empty", &mut columns, &mut report)
            .await;

        let params = &columns[0].advanced_params;
        assert_eq!(params.get(keys::NULL_RATIO), Some("0.00"));
        assert_eq!(params.get(keys::NULL_COUNT), Some("0"));
        assert_eq!(params.get(keys::UNIQUE_RATIO), Some("0.00"));
        assert_eq!(params.get(keys::VALUE_DISTRIBUTION), Some("[]"));
    }

    #[tokio::test]
    async fn test_distribution_keeps_top_k_descending() {
        let dialect = dialect_strategy(DialectKind::MySql);
        let settings = ScanSettings::default();
        let rows: Vec<QueryRow> = (1..=12)
            .map(|i| {
                let value = format!("v{}", i);
                let count = i.to_string();
                QueryRow::default()
                    .with("dist_value", Some(value.as_str()))
                    .with("dist_count", Some(count.as_str()))
            })
            .collect();
        let mut connection = ScriptedConnection::new()
            .on("AS row_count", count_row("78"))
            .on("AS dist_value", rows);
        let mut columns = vec![column("bucket", "VARCHAR")];
        let mut report = StatisticsReport::default();

        StatisticsCollector::new(dialect.as_ref(), &settings)
            .collect(&mut connection, "shop", "orders", &mut columns, &mut report)
            .await;

        let json = columns[0]
            .advanced_params
            .get(keys::VALUE_DISTRIBUTION)
            .unwrap();
        let entries: Vec<ValueDistributionEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0].value, "v12");
        assert!(entries.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn test_distribution_sql_per_row_limit() {
        let settings = ScanSettings::default();
        let mssql = dialect_strategy(DialectKind::SqlServer);
        let sql = StatisticsCollector::new(mssql.as_ref(), &settings)
            .distribution_sql("status", "[dbo].[Orders]");
        assert!(sql.starts_with("SELECT TOP 10 [status] AS dist_value"));

        let oracle = dialect_strategy(DialectKind::Oracle);
        let sql = StatisticsCollector::new(oracle.as_ref(), &settings)
            .distribution_sql("STATUS", "\"HR\".\"ORDERS\"");
        assert!(sql.ends_with("FETCH FIRST 10 ROWS ONLY"));
    }

    #[test]
    fn test_null_value_renders_as_null_literal() {
        let entry = ValueDistributionEntry::from_raw(None, 3);
        assert_eq!(entry.value, "NULL");
    }
}
