//! Static dialect catalog.
//!
//! Maps a data-source type to its driver, URL shape, table-listing template
//! and the SQL conventions (identifier quoting, row limiting) the rest of the
//! engine needs. Lookups are pure and fail with
//! [`MetaScanError::UnsupportedDialect`] for unknown types.

use crate::{Result, error::MetaScanError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data-source dialects known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// MySQL
    MySql,
    /// MariaDB
    MariaDb,
    /// Apache Doris (MySQL wire protocol)
    Doris,
    /// PostgreSQL
    PostgreSql,
    /// openGauss (PostgreSQL wire protocol)
    OpenGauss,
    /// Hologres (PostgreSQL wire protocol)
    Hologres,
    /// Oracle Database
    Oracle,
    /// Microsoft SQL Server
    SqlServer,
    /// Transwarp Inceptor (token authentication)
    Inceptor,
}

impl DialectKind {
    /// Every dialect, in catalog order.
    pub const ALL: [Self; 9] = [
        Self::MySql,
        Self::MariaDb,
        Self::Doris,
        Self::PostgreSql,
        Self::OpenGauss,
        Self::Hologres,
        Self::Oracle,
        Self::SqlServer,
        Self::Inceptor,
    ];

    /// Resolves a data-source type string, case-insensitively.
    ///
    /// # Errors
    /// Returns `UnsupportedDialect` when the type has no mapping.
    pub fn parse(source_type: &str) -> Result<Self> {
        let normalized = source_type.trim().to_ascii_lowercase();
        let kind = match normalized.as_str() {
            "mysql" => Self::MySql,
            "maria" | "mariadb" => Self::MariaDb,
            "doris" => Self::Doris,
            "postgresql" | "postgres" | "pgsql" => Self::PostgreSql,
            "opengauss" => Self::OpenGauss,
            "hologres" => Self::Hologres,
            "oracle" => Self::Oracle,
            "sqlserver" | "mssql" => Self::SqlServer,
            "inceptor" | "inceptor-jdbc" => Self::Inceptor,
            _ => return Err(MetaScanError::unsupported_dialect(source_type)),
        };
        Ok(kind)
    }

    /// Canonical type string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::MariaDb => "mariadb",
            Self::Doris => "doris",
            Self::PostgreSql => "postgresql",
            Self::OpenGauss => "opengauss",
            Self::Hologres => "hologres",
            Self::Oracle => "oracle",
            Self::SqlServer => "sqlserver",
            Self::Inceptor => "inceptor",
        }
    }

    /// True for dialects whose table listing carries storage enrichment.
    pub fn is_mysql_family(self) -> bool {
        matches!(self, Self::MySql | Self::MariaDb)
    }

    /// True for dialects speaking the PostgreSQL catalog.
    pub fn is_postgres_family(self) -> bool {
        matches!(self, Self::PostgreSql | Self::OpenGauss | Self::Hologres)
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DialectKind {
    type Err = MetaScanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Driver family used to open a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverId {
    /// sqlx PostgreSQL driver
    Postgres,
    /// sqlx MySQL driver
    MySql,
    /// tiberius TDS driver
    SqlServer,
    /// Oracle OCI driver
    Oracle,
    /// Inceptor JDBC bridge
    Inceptor,
}

impl DriverId {
    /// Driver identifier string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::SqlServer => "mssql",
            Self::Oracle => "oracle",
            Self::Inceptor => "inceptor",
        }
    }

    /// True when the driver is compiled into this build.
    pub fn is_available(self) -> bool {
        match self {
            Self::Postgres => cfg!(feature = "postgresql"),
            Self::MySql => cfg!(feature = "mysql"),
            Self::SqlServer => cfg!(feature = "mssql"),
            Self::Oracle | Self::Inceptor => false,
        }
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier quoting convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierQuote {
    /// `` `name` ``
    Backtick,
    /// `"name"`
    DoubleQuote,
    /// `[name]`
    Bracket,
}

impl IdentifierQuote {
    /// Quotes one identifier, doubling the closing delimiter.
    pub fn quote(self, ident: &str) -> String {
        match self {
            Self::Backtick => format!("`{}`", ident.replace('`', "``")),
            Self::DoubleQuote => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::Bracket => format!("[{}]", ident.replace(']', "]]")),
        }
    }
}

/// Row-limiting syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLimit {
    /// `... LIMIT n`
    Limit,
    /// `SELECT TOP n ...`
    Top,
    /// `... FETCH FIRST n ROWS ONLY`
    FetchFirst,
}

impl RowLimit {
    /// Bounded sub-select over `source`, aliased as `t`.
    pub fn sampled_source(self, source: &str, limit: u64) -> String {
        match self {
            Self::Limit => format!("(SELECT * FROM {} LIMIT {}) AS t", source, limit),
            Self::Top => format!("(SELECT TOP {} * FROM {}) AS t", limit, source),
            Self::FetchFirst => {
                format!("(SELECT * FROM {} FETCH FIRST {} ROWS ONLY) t", source, limit)
            }
        }
    }

    /// Applies a row limit to a `SELECT <body>` statement.
    pub fn limit_select(self, body: &str, limit: u64) -> String {
        match self {
            Self::Limit => format!("SELECT {} LIMIT {}", body, limit),
            Self::Top => format!("SELECT TOP {} {}", limit, body),
            Self::FetchFirst => format!("SELECT {} FETCH FIRST {} ROWS ONLY", body, limit),
        }
    }
}

/// One catalog row.
#[derive(Debug, Clone, Copy)]
pub struct DialectEntry {
    /// Dialect
    pub kind: DialectKind,
    /// Driver family
    pub driver: DriverId,
    /// URL scheme prefix, including `://`
    pub url_prefix: &'static str,
    /// Port used when the descriptor has none
    pub default_port: u16,
    /// Whether the dialect authenticates with a bearer token
    pub requires_token: bool,
    /// Identifier quoting
    pub quote: IdentifierQuote,
    /// Row limiting syntax
    pub row_limit: RowLimit,
    /// Paginated table listing; placeholders `{schema}`, `{offset}`,
    /// `{limit}` and `{upper}` (offset + limit)
    pub table_template: &'static str,
}

const MYSQL_TABLES: &str = "SELECT TABLE_NAME AS table_name, TABLE_COMMENT AS remarks, \
CASE TABLE_TYPE WHEN 'BASE TABLE' THEN 'table' WHEN 'VIEW' THEN 'view' ELSE TABLE_TYPE END AS table_type, \
ENGINE AS engine, TABLE_ROWS AS table_rows, CREATE_TIME AS create_time, UPDATE_TIME AS update_time, \
ROUND(DATA_LENGTH / 1024 / 1024, 2) AS data_length, ROUND(INDEX_LENGTH / 1024 / 1024, 2) AS index_length \
FROM information_schema.TABLES WHERE TABLE_SCHEMA = '{schema}' \
ORDER BY TABLE_NAME LIMIT {limit} OFFSET {offset}";

const DORIS_TABLES: &str = "SELECT TABLE_NAME AS table_name, TABLE_COMMENT AS remarks, \
CASE TABLE_TYPE WHEN 'BASE TABLE' THEN 'table' WHEN 'VIEW' THEN 'view' ELSE TABLE_TYPE END AS table_type \
FROM information_schema.TABLES WHERE TABLE_SCHEMA = '{schema}' \
ORDER BY TABLE_NAME LIMIT {limit} OFFSET {offset}";

const POSTGRES_TABLES: &str = "SELECT c.relname AS table_name, obj_description(c.oid, 'pg_class') AS remarks, \
CASE c.relkind WHEN 'r' THEN 'table' WHEN 'p' THEN 'table' WHEN 'v' THEN 'view' WHEN 'm' THEN 'view' \
ELSE c.relkind::text END AS table_type \
FROM pg_catalog.pg_class c JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
WHERE n.nspname = '{schema}' AND c.relkind IN ('r', 'p', 'v', 'm', 'f') \
ORDER BY c.relname LIMIT {limit} OFFSET {offset}";

const ORACLE_TABLES: &str = "SELECT table_name, remarks, table_type FROM (\
SELECT q.*, ROWNUM AS rn FROM (\
SELECT TABLE_NAME AS table_name, COMMENTS AS remarks, LOWER(TABLE_TYPE) AS table_type \
FROM ALL_TAB_COMMENTS WHERE OWNER = '{schema}' ORDER BY TABLE_NAME\
) q WHERE ROWNUM <= {upper}\
) WHERE rn > {offset}";

const SQLSERVER_TABLES: &str = "SELECT t.TABLE_NAME AS table_name, \
CAST(ep.value AS NVARCHAR(4000)) AS remarks, \
CASE t.TABLE_TYPE WHEN 'BASE TABLE' THEN 'table' WHEN 'VIEW' THEN 'view' ELSE t.TABLE_TYPE END AS table_type \
FROM INFORMATION_SCHEMA.TABLES t \
LEFT JOIN sys.extended_properties ep ON ep.major_id = OBJECT_ID(QUOTENAME(t.TABLE_SCHEMA) + '.' + QUOTENAME(t.TABLE_NAME)) \
AND ep.minor_id = 0 AND ep.name = 'MS_Description' \
WHERE t.TABLE_SCHEMA = '{schema}' \
ORDER BY t.TABLE_NAME OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY";

const INCEPTOR_TABLES: &str = "SELECT table_name, commentstring AS remarks, \
CASE table_type WHEN 'MANAGED_TABLE' THEN 'table' WHEN 'EXTERNAL_TABLE' THEN 'table' \
WHEN 'VIRTUAL_VIEW' THEN 'view' ELSE table_type END AS table_type \
FROM system.tables_v WHERE database_name = '{schema}' \
ORDER BY table_name LIMIT {limit} OFFSET {offset}";

const CATALOG: [DialectEntry; 9] = [
    DialectEntry {
        kind: DialectKind::MySql,
        driver: DriverId::MySql,
        url_prefix: "mysql://",
        default_port: 3306,
        requires_token: false,
        quote: IdentifierQuote::Backtick,
        row_limit: RowLimit::Limit,
        table_template: MYSQL_TABLES,
    },
    DialectEntry {
        kind: DialectKind::MariaDb,
        driver: DriverId::MySql,
        url_prefix: "mysql://",
        default_port: 3306,
        requires_token: false,
        quote: IdentifierQuote::Backtick,
        row_limit: RowLimit::Limit,
        table_template: MYSQL_TABLES,
    },
    DialectEntry {
        kind: DialectKind::Doris,
        driver: DriverId::MySql,
        url_prefix: "mysql://",
        default_port: 9030,
        requires_token: false,
        quote: IdentifierQuote::Backtick,
        row_limit: RowLimit::Limit,
        table_template: DORIS_TABLES,
    },
    DialectEntry {
        kind: DialectKind::PostgreSql,
        driver: DriverId::Postgres,
        url_prefix: "postgres://",
        default_port: 5432,
        requires_token: false,
        quote: IdentifierQuote::DoubleQuote,
        row_limit: RowLimit::Limit,
        table_template: POSTGRES_TABLES,
    },
    DialectEntry {
        kind: DialectKind::OpenGauss,
        driver: DriverId::Postgres,
        url_prefix: "postgres://",
        default_port: 5432,
        requires_token: false,
        quote: IdentifierQuote::DoubleQuote,
        row_limit: RowLimit::Limit,
        table_template: POSTGRES_TABLES,
    },
    DialectEntry {
        kind: DialectKind::Hologres,
        driver: DriverId::Postgres,
        url_prefix: "postgres://",
        default_port: 80,
        requires_token: false,
        quote: IdentifierQuote::DoubleQuote,
        row_limit: RowLimit::Limit,
        table_template: POSTGRES_TABLES,
    },
    DialectEntry {
        kind: DialectKind::Oracle,
        driver: DriverId::Oracle,
        url_prefix: "oracle://",
        default_port: 1521,
        requires_token: false,
        quote: IdentifierQuote::DoubleQuote,
        row_limit: RowLimit::FetchFirst,
        table_template: ORACLE_TABLES,
    },
    DialectEntry {
        kind: DialectKind::SqlServer,
        driver: DriverId::SqlServer,
        url_prefix: "mssql://",
        default_port: 1433,
        requires_token: false,
        quote: IdentifierQuote::Bracket,
        row_limit: RowLimit::Top,
        table_template: SQLSERVER_TABLES,
    },
    DialectEntry {
        kind: DialectKind::Inceptor,
        driver: DriverId::Inceptor,
        url_prefix: "jdbc:inceptor2://",
        default_port: 10000,
        requires_token: true,
        quote: IdentifierQuote::Backtick,
        row_limit: RowLimit::Limit,
        table_template: INCEPTOR_TABLES,
    },
];

/// Read-only access to the dialect table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialectCatalog;

impl DialectCatalog {
    /// Returns the entry for a dialect.
    pub fn entry(kind: DialectKind) -> &'static DialectEntry {
        // CATALOG lists every variant in `DialectKind::ALL` order.
        &CATALOG[kind as usize]
    }

    /// Looks up an entry by data-source type string.
    ///
    /// # Errors
    /// Returns `UnsupportedDialect` for unknown types.
    pub fn lookup(source_type: &str) -> Result<&'static DialectEntry> {
        DialectKind::parse(source_type).map(Self::entry)
    }

    /// Driver identifier for a data-source type.
    pub fn resolve_driver(source_type: &str) -> Result<DriverId> {
        Self::lookup(source_type).map(|entry| entry.driver)
    }

    /// Table-listing template for a data-source type.
    pub fn table_metadata_template(source_type: &str) -> Result<&'static str> {
        Self::lookup(source_type).map(|entry| entry.table_template)
    }

    /// Builds the connection URL (without credentials) for a data source.
    pub fn build_url(
        source_type: &str,
        host: &str,
        port: Option<u16>,
        database: Option<&str>,
    ) -> Result<String> {
        let entry = Self::lookup(source_type)?;
        if host.trim().is_empty() {
            return Err(MetaScanError::configuration("host cannot be empty"));
        }
        let port = port.unwrap_or(entry.default_port);
        let database = database.unwrap_or_default();
        Ok(format!("{}{}:{}/{}", entry.url_prefix, host, port, database))
    }
}

/// Escapes a value for use inside a single-quoted SQL literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Fills the table-listing placeholders of a template.
pub fn render_table_query(template: &str, schema: &str, offset: u64, limit: u64) -> String {
    template
        .replace("{schema}", &escape_literal(schema))
        .replace("{offset}", &offset.to_string())
        .replace("{limit}", &limit.to_string())
        .replace("{upper}", &offset.saturating_add(limit).to_string())
}
