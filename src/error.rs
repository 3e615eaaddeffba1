// ⚠️ Errors - fatal failures of an ETR run
// Non-fatal conditions (unmapped codes, undefined rates) are counted, not raised

use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtrError {
    /// A schedule document or record does not have the shape the engine needs
    #[error("Schema error in {source_name}: {message}")]
    Schema {
        source_name: String,
        message: String,
    },

    /// Two per-country datasets cannot be merged on their ISO3 codes
    #[error(
        "ISO3 code mismatch: only in trade {only_in_trade:?}, only in reference {only_in_reference:?}"
    )]
    Alignment {
        only_in_trade: BTreeSet<String>,
        only_in_reference: BTreeSet<String>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtrError {
    pub fn schema(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        EtrError::Schema {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn is_fatal_validation(&self) -> bool {
        matches!(self, EtrError::Schema { .. } | EtrError::Alignment { .. })
    }
}

pub type Result<T> = std::result::Result<T, EtrError>;
