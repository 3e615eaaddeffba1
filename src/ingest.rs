// 📥 Ingest - trade records in from CSV, ETR rows out to CSV
// Unparseable values become null; they never abort a load

use crate::error::{EtrError, Result};
use crate::etr::EtrResult;
use crate::record::{Dimensions, TradeRecord};
use crate::reference::{MergedRow, ReferenceRow};
use crate::resolver::canonical_code;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use tracing::{debug, info};

// ============================================================================
// COLUMN MAPPING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Column holding the HS/HTS code
    pub code_column: String,

    /// Column holding the trade value
    pub value_column: String,

    /// Dimension name -> CSV column
    pub dimension_columns: BTreeMap<String, String>,

    /// Column identifying the period (year); when set, values are averaged across periods
    pub period_column: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let mut dimension_columns = BTreeMap::new();
        dimension_columns.insert("country".to_string(), "country".to_string());

        IngestConfig {
            code_column: "product_code".to_string(),
            value_column: "value".to_string(),
            dimension_columns,
            period_column: None,
        }
    }
}

/// Lenient numeric parse: "1,234.5" -> 1234.5; blanks, garbage and negatives -> None
pub fn parse_value(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn column_index(headers: &csv::StringRecord, column: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| EtrError::schema("records", format!("missing column '{}'", column)))
}

fn non_empty(field: Option<&str>) -> Option<String> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

// ============================================================================
// READING
// ============================================================================

/// Read trade records; the period (if configured) is kept as a dimension named after its column
pub fn read_records<R: io::Read>(reader: R, config: &IngestConfig) -> Result<Vec<TradeRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();

    let code_idx = column_index(&headers, &config.code_column)?;
    let value_idx = column_index(&headers, &config.value_column)?;
    let mut dim_idx = config
        .dimension_columns
        .iter()
        .map(|(dim, col)| Ok((dim.clone(), column_index(&headers, col)?)))
        .collect::<Result<Vec<_>>>()?;
    if let Some(period) = &config.period_column {
        dim_idx.push((period.clone(), column_index(&headers, period)?));
    }

    let mut records = Vec::new();
    let mut null_values = 0usize;

    for row in rdr.records() {
        let row = row?;
        let code = canonical_code(row.get(code_idx).unwrap_or_default());
        let value = row.get(value_idx).and_then(parse_value);
        if value.is_none() {
            null_values += 1;
            debug!(code = %code, raw = ?row.get(value_idx), "unparseable trade value");
        }

        let mut dimensions = Dimensions::new();
        for (dim, idx) in &dim_idx {
            dimensions.set(dim, non_empty(row.get(*idx)));
        }

        records.push(TradeRecord {
            classification_code: code,
            dimensions,
            value,
        });
    }

    info!(records = records.len(), null_values, "loaded trade records");
    Ok(records)
}

/// Mean value per (other dimensions, code) across periods.
/// Nulls are left out of the mean; a key with only nulls stays null.
pub fn average_by_period(records: Vec<TradeRecord>, period_dimension: &str) -> Vec<TradeRecord> {
    type Key = (String, Vec<(String, Option<String>)>);
    let mut groups: BTreeMap<Key, (f64, usize)> = BTreeMap::new();

    let input = records.len();
    for record in records {
        let dims: Vec<(String, Option<String>)> = record
            .dimensions
            .iter()
            .filter(|(name, _)| *name != period_dimension)
            .map(|(name, value)| (name.to_string(), value.map(String::from)))
            .collect();

        let entry = groups
            .entry((record.classification_code, dims))
            .or_insert((0.0, 0));
        if let Some(value) = record.value {
            entry.0 += value;
            entry.1 += 1;
        }
    }

    let averaged: Vec<TradeRecord> = groups
        .into_iter()
        .map(|((code, dims), (sum, count))| {
            let mut dimensions = Dimensions::new();
            for (name, value) in dims {
                dimensions.set(&name, value);
            }
            TradeRecord {
                classification_code: code,
                dimensions,
                value: (count > 0).then(|| sum / count as f64),
            }
        })
        .collect();

    debug!(input, output = averaged.len(), "averaged records across periods");
    averaged
}

pub fn read_reference<R: io::Read>(
    reader: R,
    code_column: &str,
    value_column: &str,
) -> Result<Vec<ReferenceRow>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let code_idx = column_index(&headers, code_column)?;
    let value_idx = column_index(&headers, value_column)?;

    let mut rows = Vec::new();
    for row in rdr.records() {
        let row = row?;
        if let Some(iso3) = non_empty(row.get(code_idx)) {
            rows.push(ReferenceRow {
                iso3,
                value: row.get(value_idx).and_then(parse_value),
            });
        }
    }
    Ok(rows)
}

// ============================================================================
// WRITING
// ============================================================================

fn format_opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn key_fields(result: &EtrResult) -> Vec<String> {
    result.key.iter().map(|v| v.clone().unwrap_or_default()).collect()
}

/// Columns: ...dims, total_value, etr
pub fn write_results<W: io::Write>(writer: W, results: &[EtrResult], dims: &[String]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = dims.iter().map(String::as_str).collect();
    header.extend(["total_value", "etr"]);
    wtr.write_record(&header)?;

    for result in results {
        let mut fields = key_fields(result);
        fields.push(format_opt(result.total_value));
        fields.push(format_opt(result.etr));
        wtr.write_record(&fields)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Columns: ...dims, total_value, etr, <reference_column>
pub fn write_merged<W: io::Write>(
    writer: W,
    rows: &[MergedRow],
    dims: &[String],
    reference_column: &str,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = dims.iter().map(String::as_str).collect();
    header.extend(["total_value", "etr", reference_column]);
    wtr.write_record(&header)?;

    for row in rows {
        let mut fields = key_fields(&row.result);
        fields.push(format_opt(row.result.total_value));
        fields.push(format_opt(row.result.etr));
        fields.push(format_opt(row.reference));
        wtr.write_record(&fields)?;
    }

    wtr.flush()?;
    Ok(())
}
