// Tariff ETR Engine - Core Library
// Resolves tariff rates by longest code prefix and aggregates value-weighted effective rates

pub mod error;
pub mod config;
pub mod labels;     // Rate -> bucket label configuration
pub mod schedule;   // Rate schedules merged into one prefix table
pub mod resolver;   // Longest-prefix rate lookup
pub mod record;
pub mod aggregate;  // Group x rate buckets, pivoted wide
pub mod rollup;     // "All <dimension>" variants
pub mod etr;        // Effective tariff rate per group
pub mod sector;     // HS chapter -> sector groups
pub mod reference;  // ISO3-aligned reference data (GDP, population)
pub mod ingest;     // CSV in/out
pub mod pipeline;

// Re-export commonly used types
pub use error::{EtrError, Result};
pub use config::{EtrConfig, ReferenceConfig, SectorMapConfig};
pub use labels::{RateLabel, RateLabels, UNKNOWN_LABEL};
pub use schedule::{RateTable, ScheduleEntry};
pub use resolver::{canonical_code, resolve, RateResolver, DEFAULT_RATE, MIN_PREFIX_LEN};
pub use record::{Dimensions, ResolvedRecord, TradeRecord};
pub use aggregate::{GroupAggregator, GroupKey, PivotRow, RateBucketTable};
pub use rollup::{sentinel_for, RollupEngine, RollupVariant, VariantRows};
pub use etr::{EtrCalculator, EtrResult, EtrUnit, NullPolicy};
pub use sector::SectorMap;
pub use reference::{check_alignment, MergedRow, ReferenceMerge, ReferenceRow, ALL_SENTINEL};
pub use ingest::{
    average_by_period, read_records, read_reference, write_merged, write_results, IngestConfig,
};
pub use pipeline::{EtrPipeline, RunReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
