//! JSON output structures for the ferrosync CLI

use ferrosync_sync::{Report, ReportEntry, Stats, SyncOptions};
use ferrosync_types::Error;
use serde::Serialize;
use std::path::Path;

/// Complete JSON output for a sync run
#[derive(Debug, Serialize)]
pub struct SyncResultJson<'a> {
    /// Operation metadata
    pub metadata: OperationMetadata,
    /// Policy the run used
    pub policy: PolicyJson,
    /// Aggregate counters
    pub stats: Stats,
    /// Entries that changed or failed, sorted by path
    pub entries: Vec<&'a ReportEntry>,
    /// Failure that aborted the run
    pub global_error: Option<&'a Error>,
    /// Overall result
    pub result: OperationResult,
}

/// Operation metadata
#[derive(Debug, Serialize)]
pub struct OperationMetadata {
    /// ferrosync version
    pub version: String,
    /// Run identifier
    pub run_id: String,
    /// Timestamp when the run started
    pub timestamp: String,
    /// Left directory
    pub left_path: String,
    /// Right directory
    pub right_path: String,
    /// Duration in milliseconds
    pub duration_ms: u128,
}

/// Policy flags of the run
#[derive(Debug, Serialize)]
pub struct PolicyJson {
    /// Two-way reconciliation
    pub bidirectional: bool,
    /// Nothing was written
    pub dry_run: bool,
    /// Right-only entries were kept
    pub retain_orphans: bool,
    /// Exclusion patterns
    pub exclude: Vec<String>,
}

/// Overall result
#[derive(Debug, Serialize)]
pub struct OperationResult {
    /// Whether the run finished without errors
    pub success: bool,
    /// Number of entries with errors
    pub error_count: u64,
}

impl<'a> SyncResultJson<'a> {
    /// Build the JSON view of a report
    pub fn new(report: &'a Report, left: &Path, right: &Path, options: &SyncOptions) -> Self {
        let stats = report.stats();
        Self {
            metadata: OperationMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                run_id: report.run_id.to_string(),
                timestamp: report.started_at.to_rfc3339(),
                left_path: left.display().to_string(),
                right_path: right.display().to_string(),
                duration_ms: report.duration.as_millis(),
            },
            policy: PolicyJson {
                bidirectional: options.bidirectional,
                dry_run: options.dry_run,
                retain_orphans: options.retain_orphans,
                exclude: options.exclude_patterns().to_vec(),
            },
            stats,
            entries: report
                .sorted()
                .into_iter()
                .filter(|entry| entry.is_noteworthy())
                .collect(),
            global_error: report.global_error.as_ref(),
            result: OperationResult {
                success: !report.has_errors(),
                error_count: stats.errors,
            },
        }
    }
}
