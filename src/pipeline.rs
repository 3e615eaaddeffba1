// 🚚 Pipeline - one batch run from trade records to ETR rows
// load -> (sector map) -> resolve -> rollup-expand -> aggregate -> ETR -> sort

use crate::config::EtrConfig;
use crate::error::{EtrError, Result};
use crate::etr::{EtrCalculator, EtrResult, EtrUnit};
use crate::record::{ResolvedRecord, TradeRecord};
use crate::reference::{MergedRow, ReferenceMerge, ReferenceRow};
use crate::resolver::RateResolver;
use crate::rollup::RollupEngine;
use crate::schedule::{RateTable, ScheduleEntry};
use crate::sector::SectorMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

// ============================================================================
// RUN REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// One row per (group, rollup variant), sorted by the grouping dimensions
    pub results: Vec<EtrResult>,

    pub dimensions: Vec<String>,
    pub unit: EtrUnit,

    /// Records entering aggregation (after unmapped codes were dropped)
    pub record_count: usize,
    pub dropped_unmapped: usize,

    /// Sum of non-null input values; equals the grand-total row
    pub input_total: f64,

    pub variant_count: usize,
    pub undefined_etr_count: usize,

    /// SHA-256 of the merged rate table
    pub table_digest: String,

    pub computed_at: DateTime<Utc>,
}

impl RunReport {
    pub fn summary(&self) -> String {
        format!(
            "{} records -> {} rows over {} variants ({} undefined ETR, {} unmapped dropped), unit {}",
            self.record_count,
            self.results.len(),
            self.variant_count,
            self.undefined_etr_count,
            self.dropped_unmapped,
            self.unit
        )
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct EtrPipeline {
    config: EtrConfig,
    table: RateTable,
    sector_map: Option<SectorMap>,
}

impl EtrPipeline {
    /// Build the rate table once from schedules in precedence order
    pub fn new(config: EtrConfig, schedules: &[ScheduleEntry]) -> Result<Self> {
        config.validate()?;
        for entry in schedules {
            let exception_rate = (!entry.exceptions.is_empty()).then_some(0.0);
            if let Some(rate) = std::iter::once(entry.rate)
                .chain(exception_rate)
                .find(|r| !config.rate_labels.has_label(*r))
            {
                return Err(EtrError::Config(format!(
                    "schedule '{}' uses rate {} which has no entry in rate_labels",
                    entry.name, rate
                )));
            }
        }
        let table = RateTable::build(schedules)?;

        Ok(EtrPipeline {
            config,
            table,
            sector_map: None,
        })
    }

    /// Load schedules (and the sector map, if configured) from the paths in `config`
    pub fn from_config(config: EtrConfig) -> Result<Self> {
        if config.schedules.is_empty() {
            return Err(EtrError::Config("no schedule documents configured".to_string()));
        }

        let schedules = config
            .schedules
            .iter()
            .map(ScheduleEntry::from_file)
            .collect::<Result<Vec<_>>>()?;
        let sector_map = match &config.sector_map {
            Some(sm) => Some(SectorMap::from_file(&sm.path)?),
            None => None,
        };

        let mut pipeline = EtrPipeline::new(config, &schedules)?;
        pipeline.sector_map = sector_map;
        Ok(pipeline)
    }

    pub fn with_sector_map(mut self, sector_map: SectorMap) -> Self {
        self.sector_map = Some(sector_map);
        self
    }

    pub fn config(&self) -> &EtrConfig {
        &self.config
    }

    pub fn table(&self) -> &RateTable {
        &self.table
    }

    pub fn resolve(&self, records: Vec<TradeRecord>) -> Vec<ResolvedRecord> {
        RateResolver::new(&self.table, self.config.default_rate)
            .with_min_prefix_len(self.config.min_prefix_len)
            .resolve_all(records)
    }

    pub fn run(&self, records: Vec<TradeRecord>) -> Result<RunReport> {
        let (records, dropped_unmapped) = match &self.sector_map {
            Some(map) => {
                let dimension = self
                    .config
                    .sector_map
                    .as_ref()
                    .map(|sm| sm.dimension.as_str())
                    .unwrap_or("sector");
                map.assign(records, dimension)
            }
            None => (records, 0),
        };

        let resolved = self.resolve(records);
        let input_total: f64 = resolved.iter().filter_map(|r| r.value()).sum();
        let dims = &self.config.dimensions;

        let sentinels = self.config.effective_sentinels();
        let variants = RollupEngine::new(&self.config.rate_labels, &sentinels)
            .parallel(self.config.parallel)
            .expand(&resolved, dims)?;
        let variant_count = variants.len();

        let calculator = EtrCalculator::new(&self.config.rate_labels, self.config.unit)
            .with_null_policy(self.config.null_policy);
        let mut results: Vec<EtrResult> = variants
            .iter()
            .flat_map(|v| calculator.compute(&v.rows))
            .collect();
        results.sort_by(|a, b| compare_keys(&a.key, &b.key));

        let undefined_etr_count = results.iter().filter(|r| r.is_undefined()).count();

        info!(
            records = resolved.len(),
            rows = results.len(),
            variants = variant_count,
            undefined = undefined_etr_count,
            "ETR run complete"
        );

        Ok(RunReport {
            results,
            dimensions: dims.clone(),
            unit: self.config.unit,
            record_count: resolved.len(),
            dropped_unmapped,
            input_total,
            variant_count,
            undefined_etr_count,
            table_digest: self.table.digest(),
            computed_at: Utc::now(),
        })
    }

    /// Attach reference values (GDP, population) keyed by the configured ISO3 dimension
    pub fn merge_reference(&self, results: Vec<EtrResult>, reference: &[ReferenceRow]) -> Result<Vec<MergedRow>> {
        let ref_config = self
            .config
            .reference
            .as_ref()
            .ok_or_else(|| EtrError::Config("no reference dataset configured".to_string()))?;
        let idx = self
            .config
            .dimensions
            .iter()
            .position(|d| *d == ref_config.code_dimension)
            .ok_or_else(|| {
                EtrError::Config(format!("'{}' is not a grouping dimension", ref_config.code_dimension))
            })?;

        ReferenceMerge::new(ref_config.sentinel.clone()).merge(
            results,
            |r| r.key.get(idx).cloned().flatten().unwrap_or_default(),
            reference,
        )
    }
}

/// Lexicographic over dimension values, nulls last
fn compare_keys(a: &[Option<String>], b: &[Option<String>]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = match (x, y) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}
