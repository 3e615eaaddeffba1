// 🗂️ Sector Map - HS chapter (2-digit prefix) -> sector/product group
// Records whose chapter maps to no group are dropped, not rejected

use crate::error::{EtrError, Result};
use crate::record::TradeRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorMap {
    prefix_to_group: BTreeMap<String, String>,
}

impl SectorMap {
    /// Build from `{ "group": ["01", "02", ...] }`; a chapter listed under two groups is a schema error
    pub fn from_groups(name: &str, groups: BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut prefix_to_group = BTreeMap::new();

        for (group, prefixes) in groups {
            for prefix in prefixes {
                let prefix = pad_chapter(&prefix);
                if let Some(existing) = prefix_to_group.insert(prefix.clone(), group.clone()) {
                    return Err(EtrError::schema(
                        name,
                        format!("chapter {} mapped to both '{}' and '{}'", prefix, existing, group),
                    ));
                }
            }
        }

        Ok(SectorMap { prefix_to_group })
    }

    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let groups: BTreeMap<String, Vec<String>> =
            serde_json::from_str(json).map_err(|e| EtrError::schema(name, e.to_string()))?;
        SectorMap::from_groups(name, groups)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        SectorMap::from_json(&path.display().to_string(), &content)
    }

    /// Group for a classification code, looked up by its 2-digit chapter
    pub fn group_of(&self, code: &str) -> Option<&str> {
        let padded = pad_chapter(code.trim());
        let chapter = padded.get(..2)?;
        self.prefix_to_group.get(chapter).map(String::as_str)
    }

    /// Tag each record with its group under `dimension`; unmapped records are dropped.
    /// Returns the kept records and how many were dropped.
    pub fn assign(&self, records: Vec<TradeRecord>, dimension: &str) -> (Vec<TradeRecord>, usize) {
        let total = records.len();
        let mut kept = Vec::with_capacity(total);

        for mut record in records {
            match self.group_of(&record.classification_code) {
                Some(group) => {
                    record.dimensions.set(dimension, Some(group.to_string()));
                    kept.push(record);
                }
                None => debug!(code = %record.classification_code, "unmapped classification code dropped"),
            }
        }

        let dropped = total - kept.len();
        if dropped > 0 {
            info!(dropped, kept = kept.len(), dimension, "dropped records with unmapped codes");
        }
        (kept, dropped)
    }

    pub fn len(&self) -> usize {
        self.prefix_to_group.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefix_to_group.is_empty()
    }
}

fn pad_chapter(code: &str) -> String {
    format!("{:0>2}", code)
}
