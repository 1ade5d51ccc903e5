//! Table and column comparison of two snapshots.

use metascan_core::SchemaSnapshot;
use metascan_core::scan::{ChangeDetector, ColumnDiff};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Differences between an earlier and a later snapshot of one schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    /// Tables only in the later snapshot
    pub added_tables: Vec<String>,
    /// Tables only in the earlier snapshot
    pub removed_tables: Vec<String>,
    /// Column differences of tables present in both, non-empty only
    pub tables: BTreeMap<String, ColumnDiff>,
}

impl SnapshotDiff {
    /// Compares two snapshots table by table.
    pub fn between(old: &SchemaSnapshot, new: &SchemaSnapshot) -> Self {
        let no_columns = BTreeMap::new();
        let mut diff = Self::default();

        for name in new.tables.keys() {
            if !old.tables.contains_key(name) {
                diff.added_tables.push(name.clone());
                continue;
            }
            let columns = ChangeDetector::diff_columns(
                old.columns_of(name).unwrap_or(&no_columns),
                new.columns_of(name).unwrap_or(&no_columns),
            );
            if !columns.is_empty() {
                diff.tables.insert(name.clone(), columns);
            }
        }

        diff.removed_tables = old
            .tables
            .keys()
            .filter(|name| !new.tables.contains_key(*name))
            .cloned()
            .collect();
        diff
    }

    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added_tables.is_empty() && self.removed_tables.is_empty() && self.tables.is_empty()
    }

    /// One line per difference, `+`/`-`/`~` prefixed.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for table in &self.added_tables {
            let _ = writeln!(out, "+ {}", table);
        }
        for table in &self.removed_tables {
            let _ = writeln!(out, "- {}", table);
        }
        for (table, columns) in &self.tables {
            for field in &columns.added {
                let _ = writeln!(out, "+ {}.{}", table, field);
            }
            for field in &columns.removed {
                let _ = writeln!(out, "- {}.{}", table, field);
            }
            for (field, change) in &columns.changed {
                let _ = writeln!(out, "~ {}.{} ({:?})", table, field, change);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metascan_core::{
        ColumnSnapshot, DataSourceStatistics, DialectKind, StatisticsReport, TableSnapshot,
    };

    fn snapshot(tables: &[(&str, &[(&str, &str)])]) -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot {
            schema: "shop".to_string(),
            dialect: DialectKind::MySql,
            collected_at: chrono::Utc::now(),
            cancelled: false,
            tables: BTreeMap::new(),
            columns: BTreeMap::new(),
            warnings: Vec::new(),
            report: StatisticsReport::default(),
            summary: DataSourceStatistics::default(),
        };
        for (table, fields) in tables {
            snapshot
                .tables
                .insert(table.to_string(), TableSnapshot::new(*table));
            let columns = fields
                .iter()
                .map(|(field, field_type)| {
                    let mut column = ColumnSnapshot::new(*table, *field);
                    column.field_type = Some(field_type.to_string());
                    (field.to_string(), column)
                })
                .collect();
            snapshot.columns.insert(table.to_string(), columns);
        }
        snapshot
    }

    #[test]
    fn test_identical_snapshots_have_no_diff() {
        let old = snapshot(&[("orders", &[("id", "INT")])]);
        let new = snapshot(&[("orders", &[("id", "INT")])]);
        let diff = SnapshotDiff::between(&old, &new);
        assert!(diff.is_empty());
        assert_eq!(diff.render(), "");
    }

    #[test]
    fn test_tables_and_columns_classified() {
        let old = snapshot(&[
            ("orders", &[("id", "INT"), ("note", "VARCHAR")]),
            ("legacy", &[("id", "INT")]),
        ]);
        let new = snapshot(&[
            ("orders", &[("id", "BIGINT"), ("total", "DECIMAL")]),
            ("customers", &[("id", "INT")]),
        ]);

        let diff = SnapshotDiff::between(&old, &new);

        assert_eq!(diff.added_tables, vec!["customers"]);
        assert_eq!(diff.removed_tables, vec!["legacy"]);
        let orders = &diff.tables["orders"];
        assert_eq!(orders.added, vec!["total"]);
        assert_eq!(orders.removed, vec!["note"]);
        assert_eq!(orders.changed.len(), 1);
        assert_eq!(orders.changed[0].0, "id");

        let rendered = diff.render();
        assert!(rendered.contains("+ customers\n"));
        assert!(rendered.contains("- legacy\n"));
        assert!(rendered.contains("~ orders.id (FieldType)\n"));
    }
}
