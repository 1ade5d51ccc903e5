//! Configuration types for scans.
//!
//! - `DataSourceDescriptor`: stored data-source settings, password encrypted
//! - `ConnectionConfig`: resolved, immutable per scan call
//! - `ScanSettings`: paging, sampling, timeout and concurrency knobs
//!
//! # Security
//! `DataSourceDescriptor` only ever holds ciphertext. `ConnectionConfig`
//! holds plaintext credentials in zeroizing storage and is neither
//! serializable nor printable with its secrets.

mod connection;
mod scan;

pub use connection::{AuthMode, ConnectionConfig, DataSourceDescriptor};
pub use scan::ScanSettings;
