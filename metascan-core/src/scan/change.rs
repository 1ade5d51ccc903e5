//! Column change detection between two snapshots.
//!
//! Text attributes compare with empty-as-null equality. Integer attributes
//! coerce null to 0 before comparing, so a column going from no length to a
//! length of 0 is not reported as changed.

use crate::models::{AdvancedParams, ColumnSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute that differs between two column snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnChange {
    /// Column comment
    Comment,
    /// Column size
    Length,
    /// Decimal digits
    Precision,
    /// Serialized advanced params
    AdvancedParams,
    /// Field type
    FieldType,
}

/// Per-table column comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDiff {
    /// Columns only in the new snapshot
    pub added: Vec<String>,
    /// Columns only in the old snapshot
    pub removed: Vec<String>,
    /// Columns in both whose first differing attribute is given
    pub changed: Vec<(String, ColumnChange)>,
}

impl ColumnDiff {
    /// True when both sides describe the same columns.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

fn text_eq(left: Option<&str>, right: Option<&str>) -> bool {
    left.unwrap_or_default() == right.unwrap_or_default()
}

fn int_eq(left: Option<i32>, right: Option<i32>) -> bool {
    left.unwrap_or(0) == right.unwrap_or(0)
}

fn params_text(params: &AdvancedParams) -> Option<String> {
    (!params.is_empty()).then(|| params.to_json())
}

/// Stateless comparison of column snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    /// First differing attribute, checked in the order comment, length,
    /// precision, advanced params, type.
    pub fn first_difference(old: &ColumnSnapshot, new: &ColumnSnapshot) -> Option<ColumnChange> {
        if !text_eq(old.comment.as_deref(), new.comment.as_deref()) {
            return Some(ColumnChange::Comment);
        }
        if !int_eq(old.length, new.length) {
            return Some(ColumnChange::Length);
        }
        if !int_eq(old.precision, new.precision) {
            return Some(ColumnChange::Precision);
        }
        if !text_eq(
            params_text(&old.advanced_params).as_deref(),
            params_text(&new.advanced_params).as_deref(),
        ) {
            return Some(ColumnChange::AdvancedParams);
        }
        if !text_eq(old.field_type.as_deref(), new.field_type.as_deref()) {
            return Some(ColumnChange::FieldType);
        }
        None
    }

    /// Whether two snapshots of a column differ.
    pub fn has_changed(old: &ColumnSnapshot, new: &ColumnSnapshot) -> bool {
        Self::first_difference(old, new).is_some()
    }

    /// Classifies the columns of one table.
    pub fn diff_columns(
        old: &BTreeMap<String, ColumnSnapshot>,
        new: &BTreeMap<String, ColumnSnapshot>,
    ) -> ColumnDiff {
        let mut diff = ColumnDiff::default();

        for (name, new_column) in new {
            match old.get(name) {
                None => diff.added.push(name.clone()),
                Some(old_column) => {
                    if let Some(change) = Self::first_difference(old_column, new_column) {
                        diff.changed.push((name.clone(), change));
                    }
                }
            }
        }
        diff.removed = old
            .keys()
            .filter(|name| !new.contains_key(*name))
            .cloned()
            .collect();

        diff
    }
}
