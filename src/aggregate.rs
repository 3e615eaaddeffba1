// 🧮 Group Aggregator - sum trade values per group and rate bucket, then pivot wide
// Pivot conservation: the bucket columns of a row always sum to its total

use crate::error::{EtrError, Result};
use crate::labels::RateLabels;
use crate::record::ResolvedRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tuple of dimension values identifying a group; nulls group together
pub type GroupKey = Vec<Option<String>>;

// ============================================================================
// RATE BUCKET TABLE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupBuckets {
    /// Summed value per rate label
    pub buckets: BTreeMap<String, f64>,

    /// Records in the group whose value was null
    pub null_count: usize,
}

/// Long-form (group, rate label) -> summed value
#[derive(Debug, Clone, PartialEq)]
pub struct RateBucketTable {
    pub dimensions: Vec<String>,
    pub groups: BTreeMap<GroupKey, GroupBuckets>,
}

impl RateBucketTable {
    pub fn get(&self, key: &GroupKey, label: &str) -> f64 {
        self.groups
            .get(key)
            .and_then(|g| g.buckets.get(label))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

// ============================================================================
// PIVOT ROW
// ============================================================================

/// One wide row: a value per known rate label (zero-filled) plus the total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    pub key: GroupKey,
    pub values: Vec<(String, f64)>,
    pub total: f64,
    pub null_count: usize,
}

impl PivotRow {
    pub fn get(&self, label: &str) -> f64 {
        self.values
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }

    pub fn bucket_sum(&self) -> f64 {
        self.values.iter().map(|(_, v)| v).sum()
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct GroupAggregator<'a> {
    labels: &'a RateLabels,
}

impl<'a> GroupAggregator<'a> {
    pub fn new(labels: &'a RateLabels) -> Self {
        GroupAggregator { labels }
    }

    /// Group by the given dimensions and sum values per rate label.
    /// A record that does not carry one of `dims` is a schema error.
    pub fn sum_by_group_and_rate(
        &self,
        records: &[ResolvedRecord],
        dims: &[String],
    ) -> Result<RateBucketTable> {
        let mut groups: BTreeMap<GroupKey, GroupBuckets> = BTreeMap::new();

        for (index, resolved) in records.iter().enumerate() {
            let key = group_key(resolved, dims).ok_or_else(|| {
                EtrError::schema(
                    format!("record {} ({})", index, resolved.record.classification_code),
                    format!("missing grouping dimension, expected {:?}", dims),
                )
            })?;

            let group = groups.entry(key).or_default();
            match resolved.value() {
                Some(value) => {
                    let label = self.labels.label_for(resolved.rate);
                    *group.buckets.entry(label).or_insert(0.0) += value;
                }
                None => group.null_count += 1,
            }
        }

        Ok(RateBucketTable {
            dimensions: dims.to_vec(),
            groups,
        })
    }

    /// Wide form with a fixed column set taken from the label configuration
    pub fn pivot(&self, table: &RateBucketTable) -> Vec<PivotRow> {
        let columns = self.labels.columns();

        table
            .groups
            .iter()
            .map(|(key, group)| {
                let values: Vec<(String, f64)> = columns
                    .iter()
                    .map(|c| (c.clone(), group.buckets.get(c).copied().unwrap_or(0.0)))
                    .collect();
                let total = values.iter().map(|(_, v)| v).sum();

                PivotRow {
                    key: key.clone(),
                    values,
                    total,
                    null_count: group.null_count,
                }
            })
            .collect()
    }

    pub fn aggregate(&self, records: &[ResolvedRecord], dims: &[String]) -> Result<Vec<PivotRow>> {
        let table = self.sum_by_group_and_rate(records, dims)?;
        Ok(self.pivot(&table))
    }
}

fn group_key(resolved: &ResolvedRecord, dims: &[String]) -> Option<GroupKey> {
    dims.iter()
        .map(|d| {
            resolved
                .dimensions()
                .get(d)
                .map(|v| v.map(|s| s.to_string()))
        })
        .collect()
}
