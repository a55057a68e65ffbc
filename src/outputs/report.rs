//! Run reporting: statistics, the degraded-record side file, and the error
//! log.
//!
//! The error log is append-only JSON lines, one [`ErrorLogEntry`] per line,
//! so consecutive runs accumulate in one file.

use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use super::WriteOutcome;
use super::json::write_json;
use crate::error::HarvestError;
use crate::models::{ArticleRecord, ErrorLogEntry, HarvestStats};
use crate::utils::ensure_parent_dir;

/// Write the statistics summary.
pub async fn write_stats(stats: &HarvestStats, path: &Path) -> Result<WriteOutcome, HarvestError> {
    write_json(stats, path).await
}

/// Write only the degraded records, so failed URLs can be retried later.
/// Nothing is written when every record succeeded.
pub async fn write_failed(
    records: &[ArticleRecord],
    path: &Path,
) -> Result<WriteOutcome, HarvestError> {
    let failed: Vec<&ArticleRecord> = records.iter().filter(|r| r.is_degraded()).collect();
    if failed.is_empty() {
        debug!(path = %path.display(), "No degraded records; skipping side file");
        return Ok(WriteOutcome::Skipped);
    }
    write_json(&failed, path).await
}

/// Append entries to the error log, creating it on first use.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = entries.len()))]
pub async fn append_error_log(
    entries: &[ErrorLogEntry],
    path: &Path,
) -> Result<WriteOutcome, HarvestError> {
    if entries.is_empty() {
        return Ok(WriteOutcome::Skipped);
    }
    let mut lines = String::new();
    for entry in entries {
        lines.push_str(&serde_json::to_string(entry)?);
        lines.push('\n');
    }

    ensure_parent_dir(path).await?;
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(lines.as_bytes()).await?;
    file.flush().await?;
    info!("Appended to error log");
    Ok(WriteOutcome::Written(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleStub;

    #[tokio::test]
    async fn test_error_log_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/errors.log");

        let first =
            ErrorLogEntry::new("Listing unavailable", "https://news.example.com/", "HTTP 503");
        let second = ErrorLogEntry::new(
            "Failed to fetch article details",
            "https://news.example.com/1",
            "a\nb",
        );
        append_error_log(&[first.clone()], &path).await.unwrap();
        append_error_log(&[second.clone()], &path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<ErrorLogEntry> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(entries, vec![first, second]);
    }

    #[tokio::test]
    async fn test_empty_error_log_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.log");
        assert_eq!(append_error_log(&[], &path).await.unwrap(), WriteOutcome::Skipped);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failed_side_file_holds_only_degraded_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.json");
        let ok_stub = ArticleStub::new("Ok", "https://e.com/1");
        let bad_stub = ArticleStub::new("Bad", "https://e.com/2");
        let ok = ArticleRecord::from_stub(&ok_stub, "general".into(), "Site");
        let bad = ArticleRecord::degraded(&bad_stub, "general".into(), "Site", "HTTP 500");

        assert_eq!(write_failed(&[ok.clone()], &path).await.unwrap(), WriteOutcome::Skipped);
        write_failed(&[ok, bad.clone()], &path).await.unwrap();
        let written: Vec<ArticleRecord> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, vec![bad]);
    }

    #[tokio::test]
    async fn test_stats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let stats = HarvestStats {
            total_articles: 2,
            degraded_articles: 1,
            categories_count: vec![("economics".into(), 2)],
            ..Default::default()
        };
        write_stats(&stats, &path).await.unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["totalArticles"], 2);
        assert_eq!(value["degradedArticles"], 1);
        assert_eq!(value["categoriesCount"][0][0], "economics");
    }
}
