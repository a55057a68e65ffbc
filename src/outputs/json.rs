//! JSON output.
//!
//! Records are written as one pretty-printed array (two-space indent, UTF-8,
//! fields in declaration order), so serializing the same records twice gives
//! byte-identical files.

use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

use super::WriteOutcome;
use crate::error::HarvestError;
use crate::models::ArticleRecord;
use crate::utils::ensure_parent_dir;

/// Render any serializable value as pretty JSON.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, HarvestError> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}

/// Write `value` to `path` as pretty JSON, creating parent directories.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_json<T: Serialize + ?Sized>(
    value: &T,
    path: &Path,
) -> Result<WriteOutcome, HarvestError> {
    let json = to_pretty_json(value)?;
    ensure_parent_dir(path).await?;
    fs::write(path, json.as_bytes()).await?;
    info!(bytes = json.len(), "Wrote JSON file");
    Ok(WriteOutcome::Written(path.to_path_buf()))
}

/// Write the record array. An empty slice writes nothing.
pub async fn write_records(
    records: &[ArticleRecord],
    path: &Path,
) -> Result<WriteOutcome, HarvestError> {
    if records.is_empty() {
        warn!(path = %path.display(), "No records; nothing to serialize as JSON");
        return Ok(WriteOutcome::Skipped);
    }
    write_json(records, path).await
}
