// ⚙️ Configuration - one object per run, no process-wide rate maps
// Loaded from JSON; ETR_* environment variables override individual fields

use crate::error::{EtrError, Result};
use crate::etr::{EtrUnit, NullPolicy};
use crate::ingest::IngestConfig;
use crate::labels::RateLabels;
use crate::reference::ALL_SENTINEL;
use crate::resolver::{DEFAULT_RATE, MAX_CODE_LEN, MIN_PREFIX_LEN};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtrConfig {
    /// Grouping dimensions, in output column order
    pub dimensions: Vec<String>,

    /// Rollup value per dimension; unlisted dimensions get "All <dimension>s"
    pub sentinels: BTreeMap<String, String>,

    /// Rate for codes no schedule covers
    pub default_rate: f64,

    /// Shortest code prefix that may match a schedule
    pub min_prefix_len: usize,

    pub unit: EtrUnit,
    pub null_policy: NullPolicy,
    pub rate_labels: RateLabels,

    /// Evaluate rollup variants on the rayon pool
    pub parallel: bool,

    /// Schedule documents, merged in this order (later wins)
    pub schedules: Vec<PathBuf>,

    pub sector_map: Option<SectorMapConfig>,
    pub reference: Option<ReferenceConfig>,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorMapConfig {
    pub path: PathBuf,

    /// Dimension the mapped group is written to
    #[serde(default = "default_sector_dimension")]
    pub dimension: String,
}

fn default_sector_dimension() -> String {
    "sector".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// CSV with one row per ISO3 code
    pub path: PathBuf,

    /// Grouping dimension holding ISO3 codes
    #[serde(default = "default_code_dimension")]
    pub code_dimension: String,

    #[serde(default = "default_code_dimension")]
    pub code_column: String,

    pub value_column: String,

    #[serde(default = "default_all_sentinel")]
    pub sentinel: String,
}

fn default_code_dimension() -> String {
    "iso3".to_string()
}

fn default_all_sentinel() -> String {
    ALL_SENTINEL.to_string()
}

impl Default for EtrConfig {
    fn default() -> Self {
        EtrConfig {
            dimensions: vec!["country".to_string(), "sector".to_string()],
            sentinels: BTreeMap::new(),
            default_rate: DEFAULT_RATE,
            min_prefix_len: MIN_PREFIX_LEN,
            unit: EtrUnit::Ratio,
            null_policy: NullPolicy::Skip,
            rate_labels: RateLabels::default(),
            parallel: false,
            schedules: Vec::new(),
            sector_map: None,
            reference: None,
            ingest: IngestConfig::default(),
        }
    }
}

impl EtrConfig {
    /// Read a JSON config; relative paths inside it are taken from the file's directory
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config: EtrConfig = serde_json::from_str(&content)?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &PathBuf| if p.is_relative() { base.join(p) } else { p.clone() };

        self.schedules = self.schedules.iter().map(join).collect();
        if let Some(sector_map) = self.sector_map.as_mut() {
            sector_map.path = join(&sector_map.path);
        }
        if let Some(reference) = self.reference.as_mut() {
            reference.path = join(&reference.path);
        }
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    /// Overrides from any key lookup (the environment in production)
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("ETR_DEFAULT_RATE") {
            self.default_rate = raw
                .trim()
                .parse()
                .map_err(|_| EtrError::Config(format!("ETR_DEFAULT_RATE is not a number: {}", raw)))?;
        }
        if let Some(raw) = lookup("ETR_UNIT") {
            self.unit = raw.parse().map_err(EtrError::Config)?;
        }
        if let Some(raw) = lookup("ETR_PARALLEL") {
            self.parallel = matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimensions.is_empty() {
            return Err(EtrError::Config("at least one grouping dimension is required".to_string()));
        }

        let mut seen = HashSet::new();
        for dim in &self.dimensions {
            if !seen.insert(dim.as_str()) {
                return Err(EtrError::Config(format!("dimension '{}' listed twice", dim)));
            }
        }

        if !self.default_rate.is_finite() || !(0.0..=1.0).contains(&self.default_rate) {
            return Err(EtrError::Config(format!(
                "default_rate {} is not a fraction in [0, 1]",
                self.default_rate
            )));
        }

        if self.min_prefix_len == 0 || self.min_prefix_len > MAX_CODE_LEN {
            return Err(EtrError::Config(format!(
                "min_prefix_len must be between 1 and {}",
                MAX_CODE_LEN
            )));
        }

        if let Some(reference) = &self.reference {
            if !self.dimensions.contains(&reference.code_dimension) {
                return Err(EtrError::Config(format!(
                    "reference code dimension '{}' is not a grouping dimension",
                    reference.code_dimension
                )));
            }
        }

        self.rate_labels.validate()?;

        // An unlabelled default would land in value_unknown and drop out of the numerator
        if !self.rate_labels.has_label(self.default_rate) {
            return Err(EtrError::Config(format!(
                "default_rate {} has no entry in rate_labels",
                self.default_rate
            )));
        }
        Ok(())
    }

    /// Rollup sentinels with the reference code dimension collapsing to the merge sentinel
    pub fn effective_sentinels(&self) -> BTreeMap<String, String> {
        let mut sentinels = self.sentinels.clone();
        if let Some(reference) = &self.reference {
            sentinels
                .entry(reference.code_dimension.clone())
                .or_insert_with(|| reference.sentinel.clone());
        }
        sentinels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EtrConfig::default();

        assert_eq!(config.dimensions, vec!["country", "sector"]);
        assert_eq!(config.default_rate, 0.10);
        assert_eq!(config.min_prefix_len, 4);
        assert_eq!(config.unit, EtrUnit::Ratio);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EtrConfig =
            serde_json::from_str(r#"{"dimensions": ["country", "product"], "unit": "percent"}"#).unwrap();

        assert_eq!(config.dimensions, vec!["country", "product"]);
        assert_eq!(config.unit, EtrUnit::Percent);
        assert_eq!(config.default_rate, 0.10);
        assert_eq!(config.rate_labels, RateLabels::default());
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etr.json");
        fs::write(
            &path,
            r#"{"schedules": ["tariffs/steel.json", "/abs/autos.json"], "sector_map": {"path": "hs_groups.json"}}"#,
        )
        .unwrap();

        let config = EtrConfig::from_file(&path).unwrap();

        assert_eq!(config.schedules[0], dir.path().join("tariffs/steel.json"));
        assert_eq!(config.schedules[1], PathBuf::from("/abs/autos.json"));
        let sector_map = config.sector_map.unwrap();
        assert_eq!(sector_map.path, dir.path().join("hs_groups.json"));
        assert_eq!(sector_map.dimension, "sector");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [("ETR_DEFAULT_RATE", "0.25"), ("ETR_UNIT", "percent"), ("ETR_PARALLEL", "true")]
            .into_iter()
            .collect();
        let mut config = EtrConfig::default();

        config
            .apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.default_rate, 0.25);
        assert_eq!(config.unit, EtrUnit::Percent);
        assert!(config.parallel);
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let mut config = EtrConfig::default();
        let err = config
            .apply_overrides_from(|k| (k == "ETR_DEFAULT_RATE").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, EtrError::Config(_)));

        let err = config
            .apply_overrides_from(|k| (k == "ETR_DEFAULT_RATE").then(|| "2.0".to_string()))
            .unwrap_err();
        assert!(matches!(err, EtrError::Config(_)));
    }

    #[test]
    fn test_unlabelled_default_rate_is_rejected() {
        let mut config = EtrConfig::default();
        config.default_rate = 0.15;
        assert!(matches!(config.validate(), Err(EtrError::Config(_))));

        let mut config = EtrConfig::default();
        let err = config
            .apply_overrides_from(|k| (k == "ETR_DEFAULT_RATE").then(|| "0.15".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("rate_labels"));
    }

    #[test]
    fn test_validation() {
        let mut config = EtrConfig::default();
        config.dimensions = vec!["country".to_string(), "country".to_string()];
        assert!(config.validate().is_err());

        let mut config = EtrConfig::default();
        config.min_prefix_len = 0;
        assert!(config.validate().is_err());

        let mut config = EtrConfig::default();
        config.reference = Some(ReferenceConfig {
            path: PathBuf::from("gdp.csv"),
            code_dimension: "iso3".to_string(),
            code_column: "iso3".to_string(),
            value_column: "gdp".to_string(),
            sentinel: "ALL".to_string(),
        });
        assert!(config.validate().is_err());

        config.dimensions = vec!["iso3".to_string(), "sector".to_string()];
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_sentinels().get("iso3"), Some(&"ALL".to_string()));
    }
}
