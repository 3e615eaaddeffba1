// 📜 Rate Schedules - tariff policy documents merged into one prefix table
// Last-write-wins: a later document overrides an earlier one on the same prefix

use crate::error::{EtrError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

// ============================================================================
// SCHEDULE DOCUMENT
// ============================================================================

/// Raw shape of a schedule file, before `rate` is known to be present
#[derive(Debug, Clone, Deserialize)]
struct ScheduleDocument {
    rate: Option<f64>,

    #[serde(default)]
    codes: Vec<String>,

    #[serde(default)]
    exceptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Where the entry came from (file name or caller-chosen label)
    pub name: String,

    /// Rate applied to every prefix in `codes`
    pub rate: f64,

    /// Classification-code prefixes covered by this policy
    pub codes: Vec<String>,

    /// Prefixes forced to a zero rate
    pub exceptions: Vec<String>,
}

impl ScheduleEntry {
    pub fn new(name: impl Into<String>, rate: f64, codes: &[&str], exceptions: &[&str]) -> Self {
        ScheduleEntry {
            name: name.into(),
            rate,
            codes: codes.iter().map(|c| c.to_string()).collect(),
            exceptions: exceptions.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Parse one schedule document; a missing or invalid `rate` is a schema error
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let doc: ScheduleDocument =
            serde_json::from_str(json).map_err(|e| EtrError::schema(name, e.to_string()))?;

        let rate = doc
            .rate
            .ok_or_else(|| EtrError::schema(name, "document has no `rate`"))?;

        let entry = ScheduleEntry {
            name: name.to_string(),
            rate,
            codes: normalize_prefixes(name, doc.codes)?,
            exceptions: normalize_prefixes(name, doc.exceptions)?,
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        ScheduleEntry::from_json(&name, &content)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.rate.is_finite() || !(0.0..=1.0).contains(&self.rate) {
            return Err(EtrError::schema(
                &self.name,
                format!("rate {} is not a fraction in [0, 1]", self.rate),
            ));
        }
        Ok(())
    }
}

/// Strip separators ("7606.11" -> "760611") and reject anything that is not digits
fn normalize_prefixes(name: &str, prefixes: Vec<String>) -> Result<Vec<String>> {
    prefixes
        .into_iter()
        .map(|raw| {
            let prefix: String = raw.chars().filter(|c| !c.is_whitespace() && *c != '.').collect();
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_digit()) {
                return Err(EtrError::schema(name, format!("invalid code prefix '{}'", raw)));
            }
            Ok(prefix)
        })
        .collect()
}

// ============================================================================
// RATE TABLE
// ============================================================================

/// Merged prefix -> rate lookup, built once per run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateTable {
    rates: BTreeMap<String, f64>,
}

impl RateTable {
    /// Merge schedules in order: codes get the entry's rate, then exceptions get 0.0
    pub fn build(entries: &[ScheduleEntry]) -> Result<Self> {
        let mut rates = BTreeMap::new();
        let mut overridden = 0usize;

        for entry in entries {
            entry.validate()?;

            for code in &entry.codes {
                if rates.insert(code.clone(), entry.rate).is_some() {
                    overridden += 1;
                }
            }
            for code in &entry.exceptions {
                if rates.insert(code.clone(), 0.0).is_some() {
                    overridden += 1;
                }
            }

            debug!(
                schedule = %entry.name,
                rate = entry.rate,
                codes = entry.codes.len(),
                exceptions = entry.exceptions.len(),
                "merged rate schedule"
            );
        }

        debug!(prefixes = rates.len(), overridden, "rate table built");
        Ok(RateTable { rates })
    }

    /// Load and merge schedule files in the given order
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let entries = paths
            .iter()
            .map(ScheduleEntry::from_file)
            .collect::<Result<Vec<_>>>()?;
        RateTable::build(&entries)
    }

    pub fn get(&self, prefix: &str) -> Option<f64> {
        self.rates.get(prefix).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// SHA-256 over the sorted table, for run provenance
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (prefix, rate) in &self.rates {
            hasher.update(format!("{}={}\n", prefix, rate));
        }
        format!("{:x}", hasher.finalize())
    }
}
