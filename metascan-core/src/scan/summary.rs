//! Data-source rollup of a scanned schema.

use crate::adapters::helpers::{parse_f64, parse_i64};
use crate::models::{AdvancedParams, ColumnSnapshot, TableSnapshot, keys};
use crate::scan::engine::SchemaSnapshot;
use humansize::{WINDOWS, format_size};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Null ratio above which a field counts as sparse.
pub const HIGH_NULL_RATIO: f64 = 20.0;

/// Unique ratio above which a field counts as unique.
pub const HIGH_UNIQUE_RATIO: f64 = 95.0;

/// Aggregated counts, sizes and quality figures of one schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSourceStatistics {
    /// Tables and views listed
    pub table_count: u64,
    /// Columns introspected
    pub field_count: u64,
    /// Sum of known row counts
    pub total_rows: i64,
    /// Sum of data sizes in bytes
    pub total_data_size: u64,
    /// `total_data_size` for humans
    pub total_data_size_formatted: String,
    /// Sum of index sizes in bytes
    pub total_index_size: u64,
    /// `total_index_size` for humans
    pub total_index_size_formatted: String,
    /// Data plus index bytes
    pub total_size: u64,
    /// `total_size` for humans
    pub total_size_formatted: String,
    /// Tables carrying a comment
    pub tables_with_comment: u64,
    /// Fields carrying a comment
    pub fields_with_comment: u64,
    /// Tables reporting a primary key
    pub tables_with_primary_key: u64,
    /// Tables reporting at least one secondary index
    pub tables_with_index: u64,
    /// Sum of secondary index counts
    pub total_index_count: u64,
    /// Fields with a null ratio or unique ratio
    pub analyzed_field_count: u64,
    /// Mean null ratio over fields that have one
    pub avg_null_ratio: Option<f64>,
    /// Largest null ratio
    pub max_null_ratio: Option<f64>,
    /// Fields with a null ratio above [`HIGH_NULL_RATIO`]
    pub high_null_ratio_field_count: u64,
    /// Mean unique ratio over fields that have one
    pub avg_unique_ratio: Option<f64>,
    /// Fields with a unique ratio above [`HIGH_UNIQUE_RATIO`]
    pub unique_field_count: u64,
    /// Fields carrying a value distribution
    pub fields_with_distribution_count: u64,
}

fn latest_i64(params: &AdvancedParams, key: &str) -> Option<i64> {
    params.get_last(key).and_then(parse_i64)
}

fn latest_f64(params: &AdvancedParams, key: &str) -> Option<f64> {
    params.get_last(key).and_then(parse_f64)
}

fn non_negative(value: Option<i64>) -> u64 {
    value.and_then(|v| u64::try_from(v).ok()).unwrap_or(0)
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

impl DataSourceStatistics {
    /// Rolls up a finished snapshot.
    pub fn from_snapshot(snapshot: &SchemaSnapshot) -> Self {
        Self::from_parts(&snapshot.tables, &snapshot.columns)
    }

    /// Rolls up table and column snapshots.
    ///
    /// Unparseable parameter values are ignored.
    pub fn from_parts(
        tables: &BTreeMap<String, TableSnapshot>,
        columns: &BTreeMap<String, BTreeMap<String, ColumnSnapshot>>,
    ) -> Self {
        let mut stats = Self {
            table_count: tables.len() as u64,
            ..Default::default()
        };

        for table in tables.values() {
            let params = &table.advanced_params;
            stats.total_rows = stats
                .total_rows
                .saturating_add(table.row_count.unwrap_or(0).max(0));
            stats.total_data_size = stats
                .total_data_size
                .saturating_add(non_negative(latest_i64(params, keys::DATA_LENGTH)));
            stats.total_index_size = stats
                .total_index_size
                .saturating_add(non_negative(latest_i64(params, keys::INDEX_LENGTH)));

            if table.description.as_deref().is_some_and(|d| !d.is_empty()) {
                stats.tables_with_comment += 1;
            }
            if params
                .get_last(keys::HAS_PRIMARY_KEY)
                .is_some_and(|v| v.eq_ignore_ascii_case("true"))
            {
                stats.tables_with_primary_key += 1;
            }
            let index_count = non_negative(latest_i64(params, keys::INDEX_COUNT));
            if index_count > 0 {
                stats.tables_with_index += 1;
                stats.total_index_count = stats.total_index_count.saturating_add(index_count);
            }
        }

        let mut null_ratios = Vec::new();
        let mut unique_ratios = Vec::new();
        for column in columns.values().flat_map(BTreeMap::values) {
            stats.field_count += 1;
            if column.comment.as_deref().is_some_and(|c| !c.is_empty()) {
                stats.fields_with_comment += 1;
            }

            let params = &column.advanced_params;
            let null_ratio = latest_f64(params, keys::NULL_RATIO);
            let unique_ratio = latest_f64(params, keys::UNIQUE_RATIO);
            if null_ratio.is_some() || unique_ratio.is_some() {
                stats.analyzed_field_count += 1;
            }
            if let Some(ratio) = null_ratio {
                null_ratios.push(ratio);
                if ratio > HIGH_NULL_RATIO {
                    stats.high_null_ratio_field_count += 1;
                }
            }
            if let Some(ratio) = unique_ratio {
                unique_ratios.push(ratio);
                if ratio > HIGH_UNIQUE_RATIO {
                    stats.unique_field_count += 1;
                }
            }
            if params.contains_key(keys::VALUE_DISTRIBUTION) {
                stats.fields_with_distribution_count += 1;
            }
        }

        stats.avg_null_ratio = mean(&null_ratios);
        stats.max_null_ratio = null_ratios.iter().copied().reduce(f64::max);
        stats.avg_unique_ratio = mean(&unique_ratios);

        stats.total_size = stats.total_data_size.saturating_add(stats.total_index_size);
        stats.total_data_size_formatted = format_size(stats.total_data_size, WINDOWS);
        stats.total_index_size_formatted = format_size(stats.total_index_size, WINDOWS);
        stats.total_size_formatted = format_size(stats.total_size, WINDOWS);
        stats
    }
}
