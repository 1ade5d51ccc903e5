//! Collected outcomes of best-effort steps.
//!
//! Statistics, enrichment and extension steps never abort their column or
//! table. Each step yields a `Result`; failures land here and the snapshot
//! simply lacks the corresponding keys.

use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which best-effort step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticKind {
    /// `SELECT COUNT(*)` used for the sampling decision
    RowCount,
    /// Null ratio query
    NullRatio,
    /// Distinct count query
    Uniqueness,
    /// Top-K distribution query
    Distribution,
    /// Dialect table statistics
    TableStorage,
    /// Listing enrichment (MySQL-family index query)
    TableEnrichment,
    /// Dialect column extension hook
    ColumnExtension,
}

/// One failed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticFailure {
    /// Table the step ran against
    pub table: String,
    /// Column, for per-field steps
    pub field: Option<String>,
    /// Step kind
    pub kind: StatisticKind,
    /// Error message
    pub message: String,
}

/// Outcome counters and failures of one table or one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsReport {
    /// Columns that received statistics
    pub analyzed_fields: usize,
    /// Columns skipped as ineligible
    pub skipped_fields: usize,
    /// Tables whose statistics ran on a sample
    pub sampled_tables: usize,
    /// Failed steps
    pub failures: Vec<StatisticFailure>,
}

impl StatisticsReport {
    /// Unwraps a step outcome, recording and logging a failure.
    pub fn record<T>(
        &mut self,
        table: &str,
        field: Option<&str>,
        kind: StatisticKind,
        outcome: Result<T>,
    ) -> Option<T> {
        match outcome {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    table = %table,
                    field = field.unwrap_or("-"),
                    kind = ?kind,
                    "Skipping statistic: {}",
                    e
                );
                self.failures.push(StatisticFailure {
                    table: table.to_string(),
                    field: field.map(ToString::to_string),
                    kind,
                    message: e.to_string(),
                });
                None
            }
        }
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.analyzed_fields = self.analyzed_fields.saturating_add(other.analyzed_fields);
        self.skipped_fields = self.skipped_fields.saturating_add(other.skipped_fields);
        self.sampled_tables = self.sampled_tables.saturating_add(other.sampled_tables);
        self.failures.extend(other.failures);
    }

    /// Failures recorded for one column.
    pub fn failures_for(&self, table: &str, field: &str) -> Vec<&StatisticFailure> {
        self.failures
            .iter()
            .filter(|f| f.table == table && f.field.as_deref() == Some(field))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetaScanError;

    #[test]
    fn test_record_keeps_success_and_logs_failure() {
        let mut report = StatisticsReport::default();
        assert_eq!(
            report.record("t", Some("a"), StatisticKind::NullRatio, Ok(5)),
            Some(5)
        );
        let failed: Option<i32> = report.record(
            "t",
            Some("b"),
            StatisticKind::Uniqueness,
            Err(MetaScanError::query_failed("boom")),
        );
        assert_eq!(failed, None);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures_for("t", "b")[0].kind, StatisticKind::Uniqueness);
        assert!(report.failures_for("t", "a").is_empty());
    }

    #[test]
    fn test_merge_sums_counters() {
        let mut total = StatisticsReport {
            analyzed_fields: 2,
            ..Default::default()
        };
        total.merge(StatisticsReport {
            analyzed_fields: 3,
            skipped_fields: 1,
            sampled_tables: 1,
            failures: Vec::new(),
        });
        assert_eq!(total.analyzed_fields, 5);
        assert_eq!(total.skipped_fields, 1);
        assert_eq!(total.sampled_tables, 1);
    }
}
