//! Decoding backend rows into models.

use serde::de::DeserializeOwned;
use serde_json::Value;
use sow_core::{Error, Result};

pub(crate) fn decode<T: DeserializeOwned>(row: Value) -> Result<T> {
    serde_json::from_value(row)
        .map_err(|e| Error::backend("Unexpected row shape from backend").with_source(e))
}

/// Decode every row, skipping (and logging) the ones that do not fit.
pub(crate) fn decode_all<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(table, error = %e, "Skipping undecodable row");
                None
            }
        })
        .collect()
}
