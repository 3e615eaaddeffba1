// 📦 Trade Records - classification code + grouping dimensions + value
// Dimensions keep insertion order so output columns follow the caller's layout

use serde::{Deserialize, Serialize};

// ============================================================================
// DIMENSIONS
// ============================================================================

/// Ordered dimension-name -> value mapping; a `None` value is a real group, not a gap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions(Vec<(String, Option<String>)>);

impl Dimensions {
    pub fn new() -> Self {
        Dimensions(Vec::new())
    }

    /// Value of a dimension: `None` if the record does not carry it at all,
    /// `Some(None)` if it carries it as null
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_deref())
    }

    /// Replace an existing dimension value in place, or append a new one
    pub fn set(&mut self, name: &str, value: Option<String>) {
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// TRADE RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// HS/HTS classification code, digits only (up to 10)
    pub classification_code: String,

    pub dimensions: Dimensions,

    /// Trade value; `None` when the source field was missing or unparseable
    pub value: Option<f64>,
}

impl TradeRecord {
    pub fn new(classification_code: impl Into<String>, value: Option<f64>) -> Self {
        TradeRecord {
            classification_code: classification_code.into(),
            dimensions: Dimensions::new(),
            value,
        }
    }

    pub fn with_dimension(mut self, name: &str, value: impl Into<String>) -> Self {
        self.dimensions.set(name, Some(value.into()));
        self
    }

    pub fn with_null_dimension(mut self, name: &str) -> Self {
        self.dimensions.set(name, None);
        self
    }
}

/// A trade record with the single tariff rate that applies to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub record: TradeRecord,
    pub rate: f64,
}

impl ResolvedRecord {
    pub fn new(record: TradeRecord, rate: f64) -> Self {
        ResolvedRecord { record, rate }
    }

    pub fn value(&self) -> Option<f64> {
        self.record.value
    }

    pub fn dimensions(&self) -> &Dimensions {
        &self.record.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_keep_order_and_nulls() {
        let record = TradeRecord::new("7606110000", Some(10.0))
            .with_dimension("country", "Nigeria")
            .with_null_dimension("sector");

        let names: Vec<&str> = record.dimensions.names().collect();
        assert_eq!(names, vec!["country", "sector"]);
        assert_eq!(record.dimensions.get("country"), Some(Some("Nigeria")));
        assert_eq!(record.dimensions.get("sector"), Some(None));
        assert_eq!(record.dimensions.get("year"), None);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut dims = Dimensions::new();
        dims.set("country", Some("Ghana".to_string()));
        dims.set("sector", Some("Metals".to_string()));
        dims.set("country", Some("All countries".to_string()));

        let pairs: Vec<_> = dims.iter().collect();
        assert_eq!(
            pairs,
            vec![("country", Some("All countries")), ("sector", Some("Metals"))]
        );
    }
}
