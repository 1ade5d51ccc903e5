//! Snapshot data structures produced by a scan.
//!
//! Table and column snapshots carry an ordered key/value side channel,
//! [`AdvancedParams`], whose serialized form is the JSON array
//! `[{"key":"..","value":".."}]` consumed by downstream persistence. Inside
//! the engine the side channel is built from typed structures
//! ([`ColumnFacts`], [`TableFacts`], [`TableStorageStats`],
//! [`FieldStatistics`]) that are merged into the list only at the boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Advanced parameter key names shared with downstream consumers.
pub mod keys {
    /// Marker flag recorded on every introspected column
    pub const CHECK_PRIMARY_KEY: &str = "checkPrimaryKey";
    /// Raw column default value
    pub const COLUMN_DEF: &str = "COLUMN_DEF";
    /// Lowercase source type name
    pub const ORIGIN_FIELD_TYPE: &str = "originFieldType";
    /// Logical type resolved through the type map
    pub const VIRTUAL_FIELD_TYPE: &str = "virtualFieldType";
    /// MySQL column key (`PRI`, `UNI`, `MUL`)
    pub const COLUMN_KEY: &str = "column_key";
    /// MySQL column extra attributes (`auto_increment`, ...)
    pub const EXTRA: &str = "extra";

    /// Storage engine (MySQL family)
    pub const ENGINE: &str = "engine";
    /// Approximate or exact table row count
    pub const TABLE_ROWS: &str = "table_rows";
    /// Table creation timestamp
    pub const CREATE_TIME: &str = "create_time";
    /// Table last update timestamp
    pub const UPDATE_TIME: &str = "update_time";
    /// Data size in bytes
    pub const DATA_LENGTH: &str = "data_length";
    /// Index size in bytes
    pub const INDEX_LENGTH: &str = "index_length";
    /// Whether the table has a primary key
    pub const HAS_PRIMARY_KEY: &str = "has_primary_key";
    /// Number of primary key constraints
    pub const PRIMARY_KEY_COUNT: &str = "primary_key_count";
    /// Number of secondary indexes
    pub const INDEX_COUNT: &str = "index_count";

    /// Null percentage, two decimals
    pub const NULL_RATIO: &str = "null_ratio";
    /// Derived null count
    pub const NULL_COUNT: &str = "null_count";
    /// Distinct non-null values
    pub const UNIQUE_COUNT: &str = "unique_count";
    /// Distinct percentage, two decimals
    pub const UNIQUE_RATIO: &str = "unique_ratio";
    /// Top-K value histogram as a JSON array
    pub const VALUE_DISTRIBUTION: &str = "value_distribution";
}

/// One entry of the advanced parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedParam {
    /// Parameter name
    pub key: String,
    /// Stringified value; empty when the source reported no value
    #[serde(deserialize_with = "null_as_empty")]
    pub value: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl AdvancedParam {
    /// Creates a parameter with a present value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered, append-only list of key/value pairs.
///
/// Serialized as a string holding the JSON array so that it round-trips
/// unchanged through the persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AdvancedParams(Vec<AdvancedParam>);

impl AdvancedParams {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the persisted JSON array form. Empty input yields an empty list.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
            .map(Self)
            .map_err(|e| crate::error::MetaScanError::Serialization {
                context: "advanced params".to_string(),
                source: e,
            })
    }

    /// Renders the persisted JSON array form.
    pub fn to_json(&self) -> String {
        // A Vec of two-string structs cannot fail to serialize.
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    /// Appends a pair, keeping any earlier entry with the same key.
    /// An absent value is stored as an empty string.
    pub fn push(&mut self, key: impl Into<String>, value: Option<String>) {
        self.0.push(AdvancedParam {
            key: key.into(),
            value: value.unwrap_or_default(),
        });
    }

    /// Sets a pair in place when the key exists, otherwise appends it.
    ///
    /// Used for schema facts so reprocessing a column or table never
    /// duplicates introspection keys.
    pub fn upsert(&mut self, key: &str, value: Option<String>) {
        match self.0.iter_mut().find(|p| p.key == key) {
            Some(existing) => existing.value = value.unwrap_or_default(),
            None => self.push(key, value),
        }
    }

    /// Returns the value of the first entry with `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    /// Returns the value of the last entry with `key`.
    ///
    /// Statistics keys may repeat across passes; the latest pass wins for
    /// readers.
    pub fn get_last(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    /// Returns true when any entry uses `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|p| p.key == key)
    }

    /// Iterates the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &AdvancedParam> {
        self.0.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no entries were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<&str> {
        self.0.iter().map(|p| p.key.as_str()).collect()
    }
}

impl From<AdvancedParams> for String {
    fn from(params: AdvancedParams) -> Self {
        params.to_json()
    }
}

impl TryFrom<String> for AdvancedParams {
    type Error = crate::error::MetaScanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}

/// Kind of relation a table listing row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSourceKind {
    /// Base table
    Table,
    /// View
    View,
}

impl ScanSourceKind {
    /// Maps a `table_type` column value; anything but table/view is unknown.
    pub fn from_table_type(table_type: Option<&str>) -> Option<Self> {
        let table_type = table_type?.trim();
        if table_type.eq_ignore_ascii_case("table") {
            Some(Self::Table)
        } else if table_type.eq_ignore_ascii_case("view") {
            Some(Self::View)
        } else {
            None
        }
    }
}

/// One table (or view) discovered in a schema listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Generated identifier
    pub id: Uuid,
    /// Table name; identity within one schema listing
    pub name: String,
    /// Table comment
    pub description: Option<String>,
    /// Row count when known
    pub row_count: Option<i64>,
    /// Table or view; `None` when the source reported another kind
    pub scan_source_kind: Option<ScanSourceKind>,
    /// Ordered schema facts and table statistics
    pub advanced_params: AdvancedParams,
}

impl TableSnapshot {
    /// Creates a snapshot with a fresh identifier and no params.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            row_count: None,
            scan_source_kind: None,
            advanced_params: AdvancedParams::new(),
        }
    }

    /// Merges dialect enrichment facts, replacing keys already present.
    pub fn apply_facts(&mut self, facts: &TableFacts) {
        for (key, value) in facts.entries() {
            self.advanced_params.upsert(key, value);
        }
        if self.row_count.is_none() {
            self.row_count = facts.storage.table_rows;
        }
    }

    /// Appends table statistics after the existing entries.
    pub fn append_storage_stats(&mut self, stats: &TableStorageStats) {
        for (key, value) in stats.entries() {
            self.advanced_params.push(key, value);
        }
        if self.row_count.is_none() {
            self.row_count = stats.table_rows;
        }
    }
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSnapshot {
    /// Generated identifier
    pub id: Uuid,
    /// Owning table
    pub table_name: String,
    /// Column name; identity together with `table_name`
    pub field_name: String,
    /// Type name with any parenthesized suffix removed
    pub field_type: Option<String>,
    /// Column comment
    pub comment: Option<String>,
    /// Column size after decimal normalization
    pub length: Option<i32>,
    /// Decimal digits after decimal normalization
    pub precision: Option<i32>,
    /// Ordered schema facts followed by statistics
    pub advanced_params: AdvancedParams,
}

impl ColumnSnapshot {
    /// Creates a snapshot with a fresh identifier and no params.
    pub fn new(table_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            table_name: table_name.into(),
            field_name: field_name.into(),
            field_type: None,
            comment: None,
            length: None,
            precision: None,
            advanced_params: AdvancedParams::new(),
        }
    }

    /// Merges introspection facts, replacing keys already present.
    pub fn apply_facts(&mut self, facts: &ColumnFacts) {
        for (key, value) in facts.entries() {
            self.advanced_params.upsert(&key, value);
        }
    }

    /// Appends computed statistics after the existing entries.
    pub fn append_statistics(&mut self, stats: &FieldStatistics) {
        for (key, value) in stats.entries() {
            self.advanced_params.push(key, Some(value));
        }
    }
}

/// Column schema facts recorded during introspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnFacts {
    /// Raw default value, empty when absent
    pub default_value: String,
    /// Lowercase stripped source type
    pub origin_type: String,
    /// Logical type from the type map
    pub logical_type: Option<String>,
    /// Dialect-specific facts appended after the fixed block
    pub extra: Vec<AdvancedParam>,
}

impl ColumnFacts {
    /// Fixed-order key/value view: marker, default, origin type, logical type,
    /// then dialect extras.
    pub fn entries(&self) -> Vec<(String, Option<String>)> {
        let mut entries = vec![
            (keys::CHECK_PRIMARY_KEY.to_string(), Some("true".to_string())),
            (keys::COLUMN_DEF.to_string(), Some(self.default_value.clone())),
            (
                keys::ORIGIN_FIELD_TYPE.to_string(),
                Some(self.origin_type.clone()),
            ),
            (keys::VIRTUAL_FIELD_TYPE.to_string(), self.logical_type.clone()),
        ];
        entries.extend(
            self.extra
                .iter()
                .map(|p| (p.key.clone(), Some(p.value.clone()))),
        );
        entries
    }
}

/// Table-level size, row and index figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStorageStats {
    /// Row count
    pub table_rows: Option<i64>,
    /// Data size in bytes
    pub data_length: Option<i64>,
    /// Index size in bytes
    pub index_length: Option<i64>,
    /// Primary key presence
    pub has_primary_key: Option<bool>,
    /// Number of primary key constraints
    pub primary_key_count: Option<i64>,
    /// Number of secondary indexes
    pub index_count: Option<i64>,
}

impl TableStorageStats {
    /// Present figures in the uniform key order.
    pub fn entries(&self) -> Vec<(&'static str, Option<String>)> {
        let candidates = [
            (keys::TABLE_ROWS, self.table_rows.map(|v| v.to_string())),
            (keys::DATA_LENGTH, self.data_length.map(|v| v.to_string())),
            (keys::INDEX_LENGTH, self.index_length.map(|v| v.to_string())),
            (
                keys::HAS_PRIMARY_KEY,
                self.has_primary_key.map(|v| v.to_string()),
            ),
            (
                keys::PRIMARY_KEY_COUNT,
                self.primary_key_count.map(|v| v.to_string()),
            ),
            (keys::INDEX_COUNT, self.index_count.map(|v| v.to_string())),
        ];
        candidates
            .into_iter()
            .filter(|(_, value)| value.is_some())
            .collect()
    }

    /// True when no figure was collected.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Table facts captured while listing MySQL-family schemas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFacts {
    /// Storage engine
    pub engine: Option<String>,
    /// Creation timestamp as reported
    pub create_time: Option<String>,
    /// Last update timestamp as reported
    pub update_time: Option<String>,
    /// Rows, sizes and index presence
    pub storage: TableStorageStats,
}

impl TableFacts {
    /// Key/value view in listing order.
    ///
    /// `table_rows` is always present, empty when the listing reported
    /// none, so that listed tables are never counted again. Other missing
    /// storage figures are omitted.
    pub fn entries(&self) -> Vec<(&'static str, Option<String>)> {
        let storage: BTreeMap<&str, Option<String>> = self.storage.entries().into_iter().collect();
        let storage_value = |key: &'static str| storage.get(key).cloned().map(|v| (key, v));

        let mut entries = vec![
            (keys::ENGINE, self.engine.clone()),
            (
                keys::TABLE_ROWS,
                self.storage.table_rows.map(|rows| rows.to_string()),
            ),
        ];
        entries.push((keys::CREATE_TIME, self.create_time.clone()));
        entries.push((keys::UPDATE_TIME, self.update_time.clone()));
        entries.extend(storage_value(keys::DATA_LENGTH));
        entries.extend(storage_value(keys::INDEX_LENGTH));
        entries.extend(storage_value(keys::HAS_PRIMARY_KEY));
        entries.extend(storage_value(keys::PRIMARY_KEY_COUNT));
        entries.extend(storage_value(keys::INDEX_COUNT));
        entries
    }
}

/// Distinct-value figures for a column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniqueStatistics {
    /// Distinct non-null values
    pub unique_count: i64,
    /// `unique_count * 100 / rows`, 0 for an empty source
    pub unique_ratio: f64,
}

/// Null figures for a column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NullStatistics {
    /// Null percentage in [0, 100]
    pub null_ratio: f64,
    /// Derived null count, 0 for sampled sources
    pub null_count: i64,
}

/// One bucket of a value histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDistributionEntry {
    /// Value rendered as text, `"NULL"` for a null value
    pub value: String,
    /// Occurrences
    pub count: i64,
}

impl ValueDistributionEntry {
    /// Builds an entry, rendering an absent value as `"NULL"`.
    pub fn from_raw(value: Option<String>, count: i64) -> Self {
        Self {
            value: value.unwrap_or_else(|| "NULL".to_string()),
            count,
        }
    }
}

/// Statistics computed for one column. Absent parts failed or were not run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldStatistics {
    /// Null ratio and count
    pub nulls: Option<NullStatistics>,
    /// Distinct count and ratio
    pub unique: Option<UniqueStatistics>,
    /// Top-K histogram, descending by count
    pub distribution: Option<Vec<ValueDistributionEntry>>,
}

impl FieldStatistics {
    /// Statistic pairs in append order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::new();
        if let Some(nulls) = &self.nulls {
            entries.push((keys::NULL_RATIO, format!("{:.2}", nulls.null_ratio)));
            entries.push((keys::NULL_COUNT, nulls.null_count.to_string()));
        }
        if let Some(unique) = &self.unique {
            entries.push((keys::UNIQUE_COUNT, unique.unique_count.to_string()));
            entries.push((keys::UNIQUE_RATIO, format!("{:.2}", unique.unique_ratio)));
        }
        if let Some(distribution) = &self.distribution
            && let Ok(json) = serde_json::to_string(distribution)
        {
            entries.push((keys::VALUE_DISTRIBUTION, json));
        }
        entries
    }

    /// True when no statistic succeeded.
    pub fn is_empty(&self) -> bool {
        self.nulls.is_none() && self.unique.is_none() && self.distribution.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advanced_params_json_shape() {
        let mut params = AdvancedParams::new();
        params.push("checkPrimaryKey", Some("true".to_string()));
        params.push("virtualFieldType", None);

        assert_eq!(
            params.to_json(),
            r#"[{"key":"checkPrimaryKey","value":"true"},{"key":"virtualFieldType","value":""}]"#
        );

        let parsed = AdvancedParams::from_json(&params.to_json()).unwrap();
        assert_eq!(parsed, params);
    }

    #[test]
    fn test_null_values_read_back_as_empty_strings() {
        let parsed =
            AdvancedParams::from_json(r#"[{"key":"update_time","value":null}]"#).unwrap();
        assert_eq!(parsed.get("update_time"), Some(""));
        assert_eq!(
            parsed.to_json(),
            r#"[{"key":"update_time","value":""}]"#
        );
    }

    #[test]
    fn test_advanced_params_serde_as_string() {
        let mut params = AdvancedParams::new();
        params.push("engine", Some("InnoDB".to_string()));

        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(
            value,
            serde_json::Value::String(r#"[{"key":"engine","value":"InnoDB"}]"#.to_string())
        );
        let back: AdvancedParams = serde_json::from_value(value).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_empty_json_parses_to_empty_list() {
        assert!(AdvancedParams::from_json("").unwrap().is_empty());
        assert!(AdvancedParams::from_json("[]").unwrap().is_empty());
        assert!(AdvancedParams::from_json("{not json").is_err());
    }

    #[test]
    fn test_upsert_replaces_in_place_push_appends() {
        let mut params = AdvancedParams::new();
        params.push("a", Some("1".to_string()));
        params.push("b", Some("2".to_string()));
        params.upsert("a", Some("3".to_string()));
        assert_eq!(params.keys(), vec!["a", "b"]);
        assert_eq!(params.get("a"), Some("3"));

        params.push("a", Some("4".to_string()));
        assert_eq!(params.keys(), vec!["a", "b", "a"]);
        assert_eq!(params.get_last("a"), Some("4"));
    }

    #[test]
    fn test_scan_source_kind_mapping() {
        assert_eq!(
            ScanSourceKind::from_table_type(Some("TABLE")),
            Some(ScanSourceKind::Table)
        );
        assert_eq!(
            ScanSourceKind::from_table_type(Some("view")),
            Some(ScanSourceKind::View)
        );
        assert_eq!(ScanSourceKind::from_table_type(Some("SYSTEM TABLE")), None);
        assert_eq!(ScanSourceKind::from_table_type(None), None);
    }

    #[test]
    fn test_column_facts_fixed_order() {
        let facts = ColumnFacts {
            default_value: String::new(),
            origin_type: "varchar".to_string(),
            logical_type: Some("string".to_string()),
            extra: vec![AdvancedParam::new(keys::COLUMN_KEY, "PRI")],
        };
        let mut column = ColumnSnapshot::new("users", "id");
        column.apply_facts(&facts);
        column.apply_facts(&facts);

        assert_eq!(
            column.advanced_params.keys(),
            vec![
                "checkPrimaryKey",
                "COLUMN_DEF",
                "originFieldType",
                "virtualFieldType",
                "column_key"
            ]
        );
        assert_eq!(column.advanced_params.get(keys::COLUMN_DEF), Some(""));
    }

    #[test]
    fn test_statistics_append_after_facts_and_may_repeat() {
        let mut column = ColumnSnapshot::new("users", "email");
        column.apply_facts(&ColumnFacts::default());
        let stats = FieldStatistics {
            nulls: Some(NullStatistics {
                null_ratio: 12.346,
                null_count: 5,
            }),
            unique: Some(UniqueStatistics {
                unique_count: 40,
                unique_ratio: 100.0,
            }),
            distribution: None,
        };
        column.append_statistics(&stats);
        column.append_statistics(&stats);

        let names = column.advanced_params.keys();
        assert_eq!(names.len(), 12);
        assert_eq!(&names[4..8], &["null_ratio", "null_count", "unique_count", "unique_ratio"]);
        assert_eq!(column.advanced_params.get(keys::NULL_RATIO), Some("12.35"));
        assert_eq!(column.advanced_params.get(keys::UNIQUE_RATIO), Some("100.00"));
    }

    #[test]
    fn test_distribution_serialization_escapes_and_renders_null() {
        let stats = FieldStatistics {
            nulls: None,
            unique: None,
            distribution: Some(vec![
                ValueDistributionEntry::from_raw(Some(r#"say "hi"\"#.to_string()), 3),
                ValueDistributionEntry::from_raw(None, 1),
            ]),
        };
        let entries = stats.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].1,
            r#"[{"value":"say \"hi\"\\","count":3},{"value":"NULL","count":1}]"#
        );
    }

    #[test]
    fn test_table_facts_order_and_row_count() {
        let facts = TableFacts {
            engine: Some("InnoDB".to_string()),
            create_time: Some("2024-01-01 00:00:00".to_string()),
            update_time: None,
            storage: TableStorageStats {
                table_rows: Some(42),
                data_length: Some(16384),
                index_length: Some(0),
                ..Default::default()
            },
        };
        let mut table = TableSnapshot::new("orders");
        table.apply_facts(&facts);

        assert_eq!(
            table.advanced_params.keys(),
            vec![
                "engine",
                "table_rows",
                "create_time",
                "update_time",
                "data_length",
                "index_length"
            ]
        );
        assert_eq!(table.row_count, Some(42));
    }

    #[test]
    fn test_storage_stats_only_present_figures() {
        let stats = TableStorageStats {
            table_rows: Some(10),
            has_primary_key: Some(true),
            ..Default::default()
        };
        let mut table = TableSnapshot::new("t");
        table.append_storage_stats(&stats);
        assert_eq!(table.advanced_params.keys(), vec!["table_rows", "has_primary_key"]);
        assert_eq!(table.advanced_params.get(keys::HAS_PRIMARY_KEY), Some("true"));
        assert!(TableStorageStats::default().is_empty());
    }
}
