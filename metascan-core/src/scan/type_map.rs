//! Source type to logical type mapping.

use crate::adapters::DialectKind;
use crate::{Result, error::MetaScanError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const COMMON: &[(&str, &str)] = &[
    ("char", "char"),
    ("varchar", "varchar"),
    ("text", "varchar"),
    ("tinyint", "tinyint"),
    ("smallint", "smallint"),
    ("int", "int"),
    ("integer", "int"),
    ("bigint", "bigint"),
    ("float", "float"),
    ("real", "float"),
    ("double", "double"),
    ("decimal", "decimal"),
    ("numeric", "decimal"),
    ("boolean", "boolean"),
    ("date", "date"),
    ("time", "time"),
    ("timestamp", "timestamp"),
    ("datetime", "timestamp"),
    ("json", "json"),
    ("binary", "binary"),
    ("varbinary", "binary"),
    ("blob", "binary"),
];

const MYSQL: &[(&str, &str)] = &[
    ("mediumint", "int"),
    ("tinytext", "varchar"),
    ("mediumtext", "varchar"),
    ("longtext", "varchar"),
    ("longblob", "binary"),
    ("bit", "boolean"),
    ("year", "smallint"),
    ("enum", "varchar"),
    ("set", "varchar"),
];

const POSTGRES: &[(&str, &str)] = &[
    ("int2", "smallint"),
    ("int4", "int"),
    ("int8", "bigint"),
    ("float4", "float"),
    ("float8", "double"),
    ("bool", "boolean"),
    ("bpchar", "char"),
    ("timestamptz", "timestamp"),
    ("timetz", "time"),
    ("jsonb", "json"),
    ("bytea", "binary"),
    ("uuid", "varchar"),
];

const ORACLE: &[(&str, &str)] = &[
    ("number", "decimal"),
    ("varchar2", "varchar"),
    ("nvarchar2", "varchar"),
    ("nchar", "char"),
    ("clob", "varchar"),
    ("nclob", "varchar"),
    ("binary_float", "float"),
    ("binary_double", "double"),
    ("raw", "binary"),
];

const SQLSERVER: &[(&str, &str)] = &[
    ("nchar", "char"),
    ("nvarchar", "varchar"),
    ("ntext", "varchar"),
    ("bit", "boolean"),
    ("money", "decimal"),
    ("smallmoney", "decimal"),
    ("datetime2", "timestamp"),
    ("smalldatetime", "timestamp"),
    ("datetimeoffset", "timestamp"),
    ("uniqueidentifier", "varchar"),
    ("image", "binary"),
];

const INCEPTOR: &[(&str, &str)] = &[("string", "varchar")];

/// Lowercase source type names mapped to logical types.
///
/// Keys are normalized to lowercase on insert and lookup.
///
/// # Example
/// ```rust
/// use metascan_core::scan::TypeMap;
/// use metascan_core::DialectKind;
///
/// let map = TypeMap::defaults_for(DialectKind::Oracle);
/// assert_eq!(map.lookup("VARCHAR2"), Some("varchar"));
/// assert_eq!(map.lookup("sdo_geometry"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeMap(BTreeMap<String, String>);

impl TypeMap {
    /// Empty map; every column gets a null logical type.
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in mapping for a dialect.
    pub fn defaults_for(kind: DialectKind) -> Self {
        let specific = match kind {
            DialectKind::MySql | DialectKind::MariaDb | DialectKind::Doris => MYSQL,
            DialectKind::PostgreSql | DialectKind::OpenGauss | DialectKind::Hologres => POSTGRES,
            DialectKind::Oracle => ORACLE,
            DialectKind::SqlServer => SQLSERVER,
            DialectKind::Inceptor => INCEPTOR,
        };
        COMMON
            .iter()
            .chain(specific)
            .map(|(source, logical)| (*source, *logical))
            .collect()
    }

    /// Parses a JSON object of `source type -> logical type`.
    ///
    /// # Errors
    /// Returns `Serialization` for anything but a flat string object.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, String> =
            serde_json::from_str(json).map_err(|e| MetaScanError::Serialization {
                context: "type map must be a JSON object of strings".to_string(),
                source: e,
            })?;
        Ok(raw.into_iter().collect())
    }

    /// Reads a JSON type map from disk.
    ///
    /// # Errors
    /// Returns `Io` when the file cannot be read, `Serialization` when it is
    /// not a flat string object.
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MetaScanError::Io {
                context: format!("reading type map {}", path.display()),
                source: e,
            })?;
        Self::from_json(&json)
    }

    /// Adds or replaces one mapping.
    pub fn insert(&mut self, source_type: &str, logical_type: impl Into<String>) {
        self.0
            .insert(source_type.to_lowercase(), logical_type.into());
    }

    /// Overlays `other` on top of this map.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Logical type of a source type, case-insensitively.
    pub fn lookup(&self, source_type: &str) -> Option<&str> {
        self.0.get(&source_type.to_lowercase()).map(String::as_str)
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for TypeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (source, logical) in iter {
            map.insert(source.as_ref(), logical);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_lowercases_keys() {
        let map = TypeMap::from_json(r#"{"VARCHAR":"string","Int4":"integer"}"#).unwrap();
        assert_eq!(map.lookup("varchar"), Some("string"));
        assert_eq!(map.lookup("INT4"), Some("integer"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_from_json_rejects_nested_values() {
        let err = TypeMap::from_json(r#"{"varchar":{"to":"string"}}"#).unwrap_err();
        assert!(matches!(err, MetaScanError::Serialization { .. }));
    }

    #[test]
    fn test_dialect_defaults_overlay_common() {
        let pg = TypeMap::defaults_for(DialectKind::PostgreSql);
        assert_eq!(pg.lookup("int8"), Some("bigint"));
        assert_eq!(pg.lookup("varchar"), Some("varchar"));

        let mssql = TypeMap::defaults_for(DialectKind::SqlServer);
        assert_eq!(mssql.lookup("bit"), Some("boolean"));
        assert_eq!(mssql.lookup("int8"), None);
    }

    #[test]
    fn test_extend_overrides() {
        let mut map = TypeMap::defaults_for(DialectKind::MySql);
        map.extend(TypeMap::from_json(r#"{"varchar":"string"}"#).unwrap());
        assert_eq!(map.lookup("varchar"), Some("string"));
        assert_eq!(map.lookup("bigint"), Some("bigint"));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let err = TypeMap::load(Path::new("/nonexistent/metascan/types.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, MetaScanError::Io { .. }));
    }
}
