//! Core engine of metascan: metadata introspection and statistics for
//! heterogeneous relational data sources.
//!
//! Given a data-source descriptor, the engine resolves a dialect, opens a
//! driver connection, enumerates tables page by page, introspects columns,
//! normalizes their types and computes per-column statistics (null ratio,
//! uniqueness, value distribution) with adaptive sampling on large tables.
//! Dialect-specific enrichment adds table storage and index facts.
//!
//! # Guarantees
//! - Only catalog and aggregate SQL is executed against a source
//! - Every connection is released on every exit path
//! - Credentials are zeroized on drop and never logged
//! - A failed statistic never fails its column or table
//!
//! # Architecture
//! - [`adapters`]: dialect catalog, connection seam and per-dialect strategies
//! - [`scan`]: table enumeration, column introspection, statistics and the
//!   [`ScanEngine`] orchestrating them
//! - [`models`]: snapshots and their ordered advanced params

pub mod adapters;
pub mod error;
pub mod logging;
pub mod models;
pub mod scan;
pub mod security;
pub mod testing;

// Re-export commonly used types
pub use adapters::{
    ConnectionConfig, ConnectionProvider, DataSourceDescriptor, DialectCatalog, DialectKind,
    DriverConnectionProvider, MetadataConnection, ScanSettings,
};
pub use error::{MetaScanError, Result};
pub use logging::{LogFormat, init_logging};
pub use models::{AdvancedParams, ColumnSnapshot, ScanSourceKind, TableSnapshot};
pub use scan::{DataSourceStatistics, ScanEngine, SchemaSnapshot, StatisticsReport, TypeMap};
pub use security::{CredentialDecryptor, Credentials, PlaintextDecryptor};
