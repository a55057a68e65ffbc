//! CSV output.
//!
//! Records are heterogeneous (degraded records carry `error`, listing-only
//! records may lack `publishedAt`), so the header is the sorted union of
//! every key that appears in any record. Cells are always double-quoted:
//!
//! - missing key: empty cell
//! - array: elements joined with `"; "`
//! - object: compact JSON
//!
//! An optional UTF-8 byte order mark lets spreadsheet tools detect the
//! encoding of Cyrillic text.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

use super::WriteOutcome;
use crate::error::HarvestError;
use crate::utils::ensure_parent_dir;

pub const BOM: &str = "\u{FEFF}";
const ARRAY_SEPARATOR: &str = "; ";

/// Text form of one JSON value inside a cell.
fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Array(_) | Value::Object(_) => item.to_string(),
                scalar => cell(scalar),
            })
            .collect::<Vec<_>>()
            .join(ARRAY_SEPARATOR),
        Value::Object(_) => value.to_string(),
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn to_rows<T: Serialize>(records: &[T]) -> Result<Vec<Map<String, Value>>, HarvestError> {
    records
        .iter()
        .map(|record| {
            Ok(match serde_json::to_value(record)? {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other);
                    map
                }
            })
        })
        .collect()
}

/// Render records as CSV text. Returns `None` when there are no records.
pub fn to_csv<T: Serialize>(records: &[T], bom: bool) -> Result<Option<String>, HarvestError> {
    if records.is_empty() {
        return Ok(None);
    }
    let rows = to_rows(records)?;
    let header: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let mut out = String::new();
    if bom {
        out.push_str(BOM);
    }
    out.push_str(&header.iter().map(|key| quote(key)).collect::<Vec<_>>().join(","));
    out.push('\n');
    for row in &rows {
        let line = header
            .iter()
            .map(|key| quote(&row.get(*key).map(cell).unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    Ok(Some(out))
}

/// Write records as CSV. An empty slice writes nothing.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = records.len()))]
pub async fn write_csv<T: Serialize>(
    records: &[T],
    path: &Path,
    bom: bool,
) -> Result<WriteOutcome, HarvestError> {
    let Some(csv) = to_csv(records, bom)? else {
        warn!("No records; nothing to serialize as CSV");
        return Ok(WriteOutcome::Skipped);
    };
    ensure_parent_dir(path).await?;
    fs::write(path, csv.as_bytes()).await?;
    info!(bytes = csv.len(), bom, "Wrote CSV file");
    Ok(WriteOutcome::Written(path.to_path_buf()))
}
