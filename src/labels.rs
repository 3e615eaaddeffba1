// 🏷️ Rate Labels - stable column names for tariff-rate buckets
// Injected into the aggregator and calculator instead of living as global maps

use crate::error::{EtrError, Result};
use serde::{Deserialize, Serialize};

/// Prefix shared by every bucket column
pub const LABEL_PREFIX: &str = "value_";

/// Bucket for rates that have no configured label
pub const UNKNOWN_LABEL: &str = "value_unknown";

/// Two rates closer than this share a label
const RATE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLabel {
    /// Tariff rate as a fraction (0.25 = 25%)
    pub rate: f64,

    /// Column suffix, e.g. "025" for 0.25
    pub suffix: String,
}

impl RateLabel {
    pub fn new(rate: f64, suffix: impl Into<String>) -> Self {
        RateLabel {
            rate,
            suffix: suffix.into(),
        }
    }

    pub fn column(&self) -> String {
        format!("{}{}", LABEL_PREFIX, self.suffix)
    }
}

// ============================================================================
// LABEL SET
// ============================================================================

/// Ordered set of known rates and their bucket labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateLabels {
    entries: Vec<RateLabel>,
}

impl RateLabels {
    pub fn new(entries: Vec<RateLabel>) -> Result<Self> {
        let labels = RateLabels { entries };
        labels.validate()?;
        Ok(labels)
    }

    /// Check rates are fractions and that no rate or suffix appears twice
    pub fn validate(&self) -> Result<()> {
        for (i, entry) in self.entries.iter().enumerate() {
            if !entry.rate.is_finite() || !(0.0..=1.0).contains(&entry.rate) {
                return Err(EtrError::Config(format!(
                    "rate label '{}' has rate {} outside [0, 1]",
                    entry.suffix, entry.rate
                )));
            }
            if entry.suffix.is_empty() || entry.suffix == "unknown" {
                return Err(EtrError::Config(format!(
                    "rate {} has reserved or empty suffix '{}'",
                    entry.rate, entry.suffix
                )));
            }
            for other in &self.entries[i + 1..] {
                if other.suffix == entry.suffix || (other.rate - entry.rate).abs() < RATE_EPSILON {
                    return Err(EtrError::Config(format!(
                        "duplicate rate label: {} ({}) and {} ({})",
                        entry.suffix, entry.rate, other.suffix, other.rate
                    )));
                }
            }
        }
        Ok(())
    }

    /// Column label for a resolved rate
    pub fn label_for(&self, rate: f64) -> String {
        self.entries
            .iter()
            .find(|e| (e.rate - rate).abs() < RATE_EPSILON)
            .map(|e| e.column())
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
    }

    pub fn has_label(&self, rate: f64) -> bool {
        self.entries.iter().any(|e| (e.rate - rate).abs() < RATE_EPSILON)
    }

    /// Rate behind a column label; `None` for the unknown bucket
    pub fn rate_of(&self, label: &str) -> Option<f64> {
        let suffix = label.strip_prefix(LABEL_PREFIX)?;
        self.entries
            .iter()
            .find(|e| e.suffix == suffix)
            .map(|e| e.rate)
    }

    /// Every pivot column in configured order, unknown bucket last
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.entries.iter().map(|e| e.column()).collect();
        columns.push(UNKNOWN_LABEL.to_string());
        columns
    }

    pub fn entries(&self) -> &[RateLabel] {
        &self.entries
    }
}

impl Default for RateLabels {
    fn default() -> Self {
        RateLabels {
            entries: vec![
                RateLabel::new(0.00, "00"),
                RateLabel::new(0.10, "01"),
                RateLabel::new(0.25, "025"),
                RateLabel::new(0.50, "05"),
            ],
        }
    }
}
