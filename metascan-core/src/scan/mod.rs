//! Schema scanning: table listing, column introspection, statistics and
//! the engine orchestrating them.

pub mod change;
pub mod columns;
pub mod engine;
pub mod report;
pub mod statistics;
pub mod summary;
pub mod table_stats;
pub mod tables;
pub mod type_map;

pub use change::{ChangeDetector, ColumnChange, ColumnDiff};
pub use columns::{ColumnIntrospector, normalize_length_precision, strip_type_suffix};
pub use engine::{ScanEngine, SchemaSnapshot};
pub use report::{StatisticFailure, StatisticKind, StatisticsReport};
pub use statistics::{SamplingPlan, StatisticsCollector, is_eligible};
pub use summary::DataSourceStatistics;
pub use table_stats::{TableStatsRegistry, TableStatsStrategy};
pub use tables::TableEnumerator;
pub use type_map::TypeMap;
