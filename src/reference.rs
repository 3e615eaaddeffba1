// 🌍 Reference Merge - attach per-country reference data (GDP, population) to ETR rows
// Both sides must cover the same ISO3 codes; the "ALL" row is synthesised as the reference total

use crate::error::{EtrError, Result};
use crate::etr::EtrResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// Code used for rolled-up country rows
pub const ALL_SENTINEL: &str = "ALL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRow {
    pub iso3: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub result: EtrResult,
    pub iso3: String,
    pub reference: Option<f64>,
}

/// Fail unless both code sets match once the sentinel is removed
pub fn check_alignment<'a, T, R>(trade_codes: T, reference_codes: R, sentinel: &str) -> Result<()>
where
    T: IntoIterator<Item = &'a str>,
    R: IntoIterator<Item = &'a str>,
{
    let trade: BTreeSet<String> = trade_codes
        .into_iter()
        .filter(|c| *c != sentinel)
        .map(String::from)
        .collect();
    let reference: BTreeSet<String> = reference_codes
        .into_iter()
        .filter(|c| *c != sentinel)
        .map(String::from)
        .collect();

    if trade == reference {
        return Ok(());
    }

    Err(EtrError::Alignment {
        only_in_trade: trade.difference(&reference).cloned().collect(),
        only_in_reference: reference.difference(&trade).cloned().collect(),
    })
}

pub struct ReferenceMerge {
    sentinel: String,
}

impl ReferenceMerge {
    pub fn new(sentinel: impl Into<String>) -> Self {
        ReferenceMerge {
            sentinel: sentinel.into(),
        }
    }

    /// Left-join `reference` onto `results` by ISO3 code.
    /// `iso3_of` extracts the code from a result row (the sentinel for rolled-up rows).
    pub fn merge<F>(
        &self,
        results: Vec<EtrResult>,
        iso3_of: F,
        reference: &[ReferenceRow],
    ) -> Result<Vec<MergedRow>>
    where
        F: Fn(&EtrResult) -> String,
    {
        let codes: Vec<String> = results.iter().map(&iso3_of).collect();

        check_alignment(
            codes.iter().map(String::as_str),
            reference.iter().map(|r| r.iso3.as_str()),
            &self.sentinel,
        )?;

        let mut by_code: HashMap<&str, Option<f64>> = reference
            .iter()
            .filter(|r| r.iso3 != self.sentinel)
            .map(|r| (r.iso3.as_str(), r.value))
            .collect();

        // Missing values propagate: the total is null if any country is null
        let total: Option<f64> = by_code.values().copied().sum();
        by_code.insert(self.sentinel.as_str(), total);

        info!(rows = results.len(), countries = by_code.len() - 1, "merged reference data");

        Ok(results
            .into_iter()
            .zip(codes)
            .map(|(result, iso3)| {
                let reference = by_code.get(iso3.as_str()).copied().flatten();
                MergedRow {
                    result,
                    iso3,
                    reference,
                }
            })
            .collect())
    }
}

impl Default for ReferenceMerge {
    fn default() -> Self {
        ReferenceMerge::new(ALL_SENTINEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(code: &str, total: f64) -> EtrResult {
        EtrResult {
            key: vec![Some(code.to_string())],
            total_value: Some(total),
            etr: Some(0.1),
        }
    }

    fn reference(rows: &[(&str, f64)]) -> Vec<ReferenceRow> {
        rows.iter()
            .map(|(c, v)| ReferenceRow {
                iso3: c.to_string(),
                value: Some(*v),
            })
            .collect()
    }

    fn code_of(r: &EtrResult) -> String {
        r.key[0].clone().unwrap_or_default()
    }

    #[test]
    fn test_alignment_mismatch_reports_both_sides() {
        let err = check_alignment(["A", "B", "C"], ["A", "B", "D"], ALL_SENTINEL).unwrap_err();

        match err {
            EtrError::Alignment {
                only_in_trade,
                only_in_reference,
            } => {
                assert_eq!(only_in_trade, BTreeSet::from(["C".to_string()]));
                assert_eq!(only_in_reference, BTreeSet::from(["D".to_string()]));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_alignment_ignores_sentinel() {
        assert!(check_alignment(["A", "B", "ALL"], ["B", "A"], ALL_SENTINEL).is_ok());
    }

    #[test]
    fn test_merge_adds_sentinel_total() {
        let merge = ReferenceMerge::default();
        let results = vec![result("NGA", 10.0), result("GHA", 5.0), result("ALL", 15.0)];

        let merged = merge
            .merge(results, code_of, &reference(&[("NGA", 400.0), ("GHA", 80.0)]))
            .unwrap();

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].reference, Some(400.0));
        assert_eq!(merged[1].reference, Some(80.0));
        assert_eq!(merged[2].iso3, "ALL");
        assert_eq!(merged[2].reference, Some(480.0));
    }

    #[test]
    fn test_merge_fails_on_mismatch() {
        let merge = ReferenceMerge::default();
        let results = vec![result("NGA", 10.0), result("ZAF", 5.0)];

        let err = merge
            .merge(results, code_of, &reference(&[("NGA", 400.0)]))
            .unwrap_err();
        assert!(matches!(err, EtrError::Alignment { .. }));
    }

    #[test]
    fn test_null_reference_value_nulls_the_total() {
        let merge = ReferenceMerge::default();
        let mut rows = reference(&[("NGA", 400.0)]);
        rows.push(ReferenceRow {
            iso3: "GHA".to_string(),
            value: None,
        });

        let merged = merge
            .merge(
                vec![result("NGA", 1.0), result("GHA", 1.0), result("ALL", 2.0)],
                code_of,
                &rows,
            )
            .unwrap();
        assert_eq!(merged[1].reference, None);
        assert_eq!(merged[2].reference, None);
    }
}
