// 🪜 Rollup Engine - every "collapse dimension to ALL" combination
// Each variant relabels its own copy of the original records; variants never feed each other

use crate::aggregate::{GroupAggregator, PivotRow};
use crate::error::Result;
use crate::labels::RateLabels;
use crate::record::ResolvedRecord;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Sentinel value used when a dimension is collapsed ("All countries", "All sectors").
///
/// Without an entry in `overrides` the name is pluralised by English suffix rules only:
/// consonant + "y" becomes "ies", everything else gets an "s". Irregular plurals
/// ("person", "datum") need an explicit override.
pub fn sentinel_for(dimension: &str, overrides: &BTreeMap<String, String>) -> String {
    if let Some(sentinel) = overrides.get(dimension) {
        return sentinel.clone();
    }

    let plural = match dimension.strip_suffix('y') {
        Some(stem) if !stem.is_empty() && !stem.ends_with(|c: char| "aeiou".contains(c)) => {
            format!("{}ies", stem)
        }
        _ => format!("{}s", dimension),
    };
    format!("All {}", plural)
}

// ============================================================================
// VARIANT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupVariant {
    /// Per dimension: true = replaced by its sentinel
    pub collapsed: Vec<bool>,
}

impl RollupVariant {
    /// All 2^k masks: base first, then the last dimension collapsed, ..., all collapsed
    pub fn enumerate(dimension_count: usize) -> Vec<RollupVariant> {
        (0..1usize << dimension_count)
            .map(|mask| RollupVariant {
                collapsed: (0..dimension_count)
                    .map(|j| (mask >> (dimension_count - 1 - j)) & 1 == 1)
                    .collect(),
            })
            .collect()
    }

    pub fn is_base(&self) -> bool {
        self.collapsed.iter().all(|c| !c)
    }

    pub fn is_fully_collapsed(&self) -> bool {
        self.collapsed.iter().all(|c| *c)
    }

    /// Human-readable name, e.g. "country=*, sector=ALL"
    pub fn describe(&self, dims: &[String]) -> String {
        dims.iter()
            .zip(&self.collapsed)
            .map(|(d, c)| format!("{}={}", d, if *c { "ALL" } else { "*" }))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRows {
    pub variant: RollupVariant,
    pub rows: Vec<PivotRow>,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct RollupEngine<'a> {
    labels: &'a RateLabels,
    sentinels: &'a BTreeMap<String, String>,
    parallel: bool,
}

impl<'a> RollupEngine<'a> {
    pub fn new(labels: &'a RateLabels, sentinels: &'a BTreeMap<String, String>) -> Self {
        RollupEngine {
            labels,
            sentinels,
            parallel: false,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn expand(&self, records: &[ResolvedRecord], dims: &[String]) -> Result<Vec<VariantRows>> {
        let variants = RollupVariant::enumerate(dims.len());

        if self.parallel {
            variants
                .par_iter()
                .map(|v| self.evaluate(records, dims, v))
                .collect()
        } else {
            variants
                .iter()
                .map(|v| self.evaluate(records, dims, v))
                .collect()
        }
    }

    /// All variants' rows concatenated in variant order
    pub fn expand_flat(&self, records: &[ResolvedRecord], dims: &[String]) -> Result<Vec<PivotRow>> {
        Ok(self
            .expand(records, dims)?
            .into_iter()
            .flat_map(|v| v.rows)
            .collect())
    }

    fn evaluate(
        &self,
        records: &[ResolvedRecord],
        dims: &[String],
        variant: &RollupVariant,
    ) -> Result<VariantRows> {
        let aggregator = GroupAggregator::new(self.labels);

        let rows = if variant.is_base() {
            aggregator.aggregate(records, dims)?
        } else {
            let relabeled = self.relabel(records, dims, variant);
            aggregator.aggregate(&relabeled, dims)?
        };

        debug!(variant = %variant.describe(dims), groups = rows.len(), "rollup variant aggregated");
        Ok(VariantRows {
            variant: variant.clone(),
            rows,
        })
    }

    fn relabel(
        &self,
        records: &[ResolvedRecord],
        dims: &[String],
        variant: &RollupVariant,
    ) -> Vec<ResolvedRecord> {
        let replacements: Vec<(&str, String)> = dims
            .iter()
            .zip(&variant.collapsed)
            .filter(|(_, c)| **c)
            .map(|(d, _)| (d.as_str(), sentinel_for(d, self.sentinels)))
            .collect();

        records
            .iter()
            .map(|r| {
                let mut copy = r.clone();
                for (dim, sentinel) in &replacements {
                    copy.record.dimensions.set(dim, Some(sentinel.clone()));
                }
                copy
            })
            .collect()
    }
}
