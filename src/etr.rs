// 📈 ETR Calculator - value-weighted effective tariff rate per group
//
//   etr = Σ value[label] * rate(label) / total
//
// A group with no value has no defined rate: it yields None, never NaN/inf.

use crate::aggregate::{GroupKey, PivotRow};
use crate::labels::RateLabels;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

// ============================================================================
// OUTPUT UNIT
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EtrUnit {
    /// Plain fraction in [0, 1]
    #[default]
    Ratio,

    /// Whole-number percentage: round(ratio * 100)
    Percent,
}

impl EtrUnit {
    pub fn apply(&self, ratio: f64) -> f64 {
        match self {
            EtrUnit::Ratio => ratio,
            EtrUnit::Percent => (ratio * 100.0).round(),
        }
    }
}

impl FromStr for EtrUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ratio" => Ok(EtrUnit::Ratio),
            "percent" | "percentage" => Ok(EtrUnit::Percent),
            other => Err(format!("unknown ETR unit '{}'", other)),
        }
    }
}

impl fmt::Display for EtrUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtrUnit::Ratio => write!(f, "ratio"),
            EtrUnit::Percent => write!(f, "percent"),
        }
    }
}

/// What a null record value does to its group's result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullPolicy {
    /// Nulls add nothing to sums; the group keeps a defined total
    #[default]
    Skip,

    /// Any null in a group makes its total and ETR null
    Propagate,
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtrResult {
    pub key: GroupKey,

    /// None only under `NullPolicy::Propagate` when the group held a null value
    pub total_value: Option<f64>,

    /// None when the group's total is zero or null
    pub etr: Option<f64>,
}

impl EtrResult {
    pub fn is_undefined(&self) -> bool {
        self.etr.is_none()
    }
}

// ============================================================================
// CALCULATOR
// ============================================================================

pub struct EtrCalculator<'a> {
    labels: &'a RateLabels,
    unit: EtrUnit,
    null_policy: NullPolicy,
}

impl<'a> EtrCalculator<'a> {
    pub fn new(labels: &'a RateLabels, unit: EtrUnit) -> Self {
        EtrCalculator {
            labels,
            unit,
            null_policy: NullPolicy::Skip,
        }
    }

    pub fn with_null_policy(mut self, null_policy: NullPolicy) -> Self {
        self.null_policy = null_policy;
        self
    }

    /// Values in the unknown bucket count toward the total but add no duty
    pub fn etr(&self, row: &PivotRow) -> Option<f64> {
        if row.total == 0.0 {
            return None;
        }

        let numerator: f64 = row
            .values
            .iter()
            .filter_map(|(label, value)| self.labels.rate_of(label).map(|rate| value * rate))
            .sum();

        let ratio = numerator / row.total;
        if !ratio.is_finite() {
            return None;
        }
        Some(self.unit.apply(ratio))
    }

    pub fn compute(&self, rows: &[PivotRow]) -> Vec<EtrResult> {
        rows.iter()
            .map(|row| {
                if self.null_policy == NullPolicy::Propagate && row.null_count > 0 {
                    debug!(group = ?row.key, nulls = row.null_count, "null value in group");
                    return EtrResult {
                        key: row.key.clone(),
                        total_value: None,
                        etr: None,
                    };
                }

                let etr = self.etr(row);
                if etr.is_none() {
                    debug!(group = ?row.key, total = row.total, "undefined ETR for group");
                }
                EtrResult {
                    key: row.key.clone(),
                    total_value: Some(row.total),
                    etr,
                }
            })
            .collect()
    }
}
