//! Scan tuning: paging, adaptive sampling, timeouts and concurrency.

use crate::{Result, error::MetaScanError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for one scan invocation.
///
/// # Example
/// ```rust
/// use metascan_core::adapters::ScanSettings;
/// use std::time::Duration;
///
/// let settings = ScanSettings::default()
///     .with_max_concurrency(4)
///     .with_query_timeout(Duration::from_secs(60));
///
/// assert!(settings.validate().is_ok());
/// assert_eq!(settings.sample_limit_for(2_000_000), Some(100_000));
/// assert_eq!(settings.sample_limit_for(1_000_000), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Rows per table-listing page
    pub page_size: u64,
    /// Row count above which statistics run on a sample
    pub sample_threshold: u64,
    /// Rows in the sampled sub-select
    pub sample_limit: u64,
    /// Buckets kept in a value distribution
    pub distribution_top_k: u64,
    /// Per-statement timeout
    pub query_timeout: Duration,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// Tables processed concurrently, one connection each
    pub max_concurrency: usize,
    /// Whether per-column statistics are computed
    pub collect_statistics: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            page_size: 1000,
            sample_threshold: 1_000_000,
            sample_limit: 100_000,
            distribution_top_k: 10,
            query_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            max_concurrency: 1,
            collect_statistics: true,
        }
    }
}

impl ScanSettings {
    /// Validates scan settings.
    ///
    /// # Errors
    /// Returns error if a size, limit or timeout is zero or out of range
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(MetaScanError::configuration(
                "page_size must be greater than 0",
            ));
        }

        if self.sample_limit == 0 {
            return Err(MetaScanError::configuration(
                "sample_limit must be greater than 0",
            ));
        }

        if self.sample_limit > self.sample_threshold {
            return Err(MetaScanError::configuration(
                "sample_limit must not exceed sample_threshold",
            ));
        }

        if self.distribution_top_k == 0 {
            return Err(MetaScanError::configuration(
                "distribution_top_k must be greater than 0",
            ));
        }

        if self.max_concurrency == 0 {
            return Err(MetaScanError::configuration(
                "max_concurrency must be greater than 0",
            ));
        }

        if self.max_concurrency > 64 {
            return Err(MetaScanError::configuration(
                "max_concurrency should not exceed 64 to protect the source system",
            ));
        }

        if self.query_timeout.is_zero() {
            return Err(MetaScanError::configuration(
                "query_timeout must be greater than 0",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(MetaScanError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Sample size for a table of `total_rows`; `None` means full-table
    /// statistics.
    pub fn sample_limit_for(&self, total_rows: u64) -> Option<u64> {
        (total_rows > self.sample_threshold).then_some(self.sample_limit)
    }

    /// Builder method to set the page size.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Builder method to set the per-statement timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Builder method to set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder method to set table-level concurrency.
    pub fn with_max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = workers;
        self
    }

    /// Builder method to toggle per-column statistics.
    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.collect_statistics = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ScanSettings::default();
        assert_eq!(settings.page_size, 1000);
        assert_eq!(settings.sample_threshold, 1_000_000);
        assert_eq!(settings.sample_limit, 100_000);
        assert_eq!(settings.distribution_top_k, 10);
        assert_eq!(settings.max_concurrency, 1);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_sampling_threshold_is_strict() {
        let settings = ScanSettings::default();
        assert_eq!(settings.sample_limit_for(0), None);
        assert_eq!(settings.sample_limit_for(1_000_000), None);
        assert_eq!(settings.sample_limit_for(1_000_001), Some(100_000));
        assert_eq!(settings.sample_limit_for(2_000_000), Some(100_000));
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        assert!(ScanSettings::default().with_page_size(0).validate().is_err());
        assert!(ScanSettings::default().with_max_concurrency(0).validate().is_err());
        assert!(ScanSettings::default().with_max_concurrency(65).validate().is_err());
        assert!(
            ScanSettings::default()
                .with_query_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let settings: ScanSettings = serde_json::from_str(r#"{"max_concurrency": 3}"#).unwrap();
        assert_eq!(settings.max_concurrency, 3);
        assert_eq!(settings.page_size, 1000);
    }
}
