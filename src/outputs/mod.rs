//! Run artifacts.
//!
//! # Submodules
//!
//! - [`json`]: pretty-printed JSON for records and statistics
//! - [`csv`]: union-header CSV for spreadsheet consumers
//! - [`report`]: statistics summary, degraded-record side file, and the
//!   append-only error log
//!
//! Writers never create an empty artifact: with nothing to write they return
//! [`WriteOutcome::Skipped`] and log why.

pub mod csv;
pub mod json;
pub mod report;

use std::path::PathBuf;

/// What a writer did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(PathBuf),
    /// Nothing to serialize; no file was touched.
    Skipped,
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written(_))
    }
}
