//! Report model: per-entry outcomes and run-level aggregates

use chrono::{DateTime, Utc};
use ferrosync_types::Error;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Which side is authoritative for an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Left is copied onto right
    #[default]
    LeftToRight,
    /// Right is copied onto left (bidirectional mode only)
    RightToLeft,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeftToRight => write!(f, "->"),
            Self::RightToLeft => write!(f, "<-"),
        }
    }
}

/// What synchronization decided for one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Both sides already agree
    #[default]
    Unchanged,
    /// Present on one side only and copied to the other
    Created,
    /// Size or checksum differ
    ContentUpdated,
    /// Content agrees but mtime or ACL differ
    MetadataUpdated,
    /// Right-only entry removed during one-way sync
    Removed,
    /// Right-only entry left in place by the retain-orphans policy
    Kept,
}

impl Outcome {
    /// Whether a leaf with this outcome has its content copied
    pub fn copies_content(self) -> bool {
        matches!(
            self,
            Self::Created | Self::ContentUpdated | Self::MetadataUpdated
        )
    }

    /// Short label used in text output
    pub fn label(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Created => "created",
            Self::ContentUpdated => "updated",
            Self::MetadataUpdated => "metadata",
            Self::Removed => "removed",
            Self::Kept => "kept",
        }
    }
}

/// Outcome record for one tree position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Path on the left store
    pub left_path: String,
    /// Path on the right store
    pub right_path: String,
    /// Whether the entry is a namespace
    pub is_namespace: bool,
    /// Authoritative side; meaningful in bidirectional mode
    pub direction: Direction,
    /// Decided outcome
    pub outcome: Outcome,
    /// Bytes copied (or that a real run would copy)
    pub bytes: u64,
    /// Failure attached to this entry
    pub error: Option<Error>,
}

impl ReportEntry {
    /// An unchanged entry with no error
    pub fn new<L: Into<String>, R: Into<String>>(left_path: L, right_path: R, is_namespace: bool) -> Self {
        Self {
            left_path: left_path.into(),
            right_path: right_path.into(),
            is_namespace,
            direction: Direction::LeftToRight,
            outcome: Outcome::Unchanged,
            bytes: 0,
            error: None,
        }
    }

    /// Whether anything changed or failed
    pub fn is_noteworthy(&self) -> bool {
        self.outcome != Outcome::Unchanged || self.error.is_some()
    }

    /// Path on the side the entry was taken from
    pub fn source_path(&self) -> &str {
        match self.direction {
            Direction::LeftToRight => &self.left_path,
            Direction::RightToLeft => &self.right_path,
        }
    }
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.left_path == self.right_path {
            self.left_path.clone()
        } else {
            format!("{} {} {}", self.left_path, self.direction, self.right_path)
        };
        let path = if path.is_empty() { "/" } else { path.as_str() };
        match &self.error {
            Some(error) => write!(f, "{:<9} {}: {}", "error", path, error),
            None if self.bytes > 0 => {
                write!(f, "{:<9} {} ({} bytes)", self.outcome.label(), path, self.bytes)
            }
            None => write!(f, "{:<9} {}", self.outcome.label(), path),
        }
    }
}

/// Counters derived from a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Stats {
    /// Entries created on one side
    pub created: u64,
    /// Entries whose content was updated
    pub content_updated: u64,
    /// Entries whose metadata alone was updated
    pub metadata_updated: u64,
    /// Entries removed
    pub removed: u64,
    /// Entries kept by the retain-orphans policy
    pub kept: u64,
    /// Entries carrying an error
    pub errors: u64,
    /// Bytes copied
    pub bytes: u64,
}

impl Stats {
    /// No changes and no errors; kept entries do not count
    pub fn is_zero(&self) -> bool {
        self.changes() == 0 && self.errors == 0 && self.bytes == 0
    }

    /// Entries with any change
    pub fn changes(&self) -> u64 {
        self.created + self.content_updated + self.metadata_updated + self.removed
    }
}

/// Result of one `synchronize` call
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Identifier of the run
    pub run_id: Uuid,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Every entry visited, children before their namespace
    pub entries: Vec<ReportEntry>,
    /// Failure that prevented the traversal from starting
    pub global_error: Option<Error>,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl Report {
    /// An empty report for a new run
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            entries: Vec::new(),
            global_error: None,
            duration: Duration::default(),
        }
    }

    /// Recompute counters from the entries
    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        for entry in &self.entries {
            match entry.outcome {
                Outcome::Unchanged => {}
                Outcome::Created => stats.created += 1,
                Outcome::ContentUpdated => stats.content_updated += 1,
                Outcome::MetadataUpdated => stats.metadata_updated += 1,
                Outcome::Removed => stats.removed += 1,
                Outcome::Kept => stats.kept += 1,
            }
            if entry.error.is_some() {
                stats.errors += 1;
            }
            stats.bytes += entry.bytes;
        }
        stats
    }

    /// Whether the run or any entry failed
    pub fn has_errors(&self) -> bool {
        self.global_error.is_some() || self.entries.iter().any(|e| e.error.is_some())
    }

    /// Errors indexed by the entry's left path (right path when left is empty)
    pub fn errors_by_path(&self) -> BTreeMap<String, &Error> {
        self.entries
            .iter()
            .filter_map(|entry| {
                entry.error.as_ref().map(|error| {
                    let path = if entry.left_path.is_empty() {
                        entry.right_path.clone()
                    } else {
                        entry.left_path.clone()
                    };
                    (path, error)
                })
            })
            .collect()
    }

    /// Entries sorted by left path, then right path
    pub fn sorted(&self) -> Vec<&ReportEntry> {
        let mut entries: Vec<&ReportEntry> = self.entries.iter().collect();
        entries.sort_by(|a, b| {
            a.left_path
                .cmp(&b.left_path)
                .then_with(|| a.right_path.cmp(&b.right_path))
        });
        entries
    }

    /// Find the entry for a left path
    pub fn entry(&self, left_path: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.left_path == left_path)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(error) = &self.global_error {
            writeln!(f, "sync aborted: {}", error)?;
        }
        for entry in self.sorted() {
            if entry.is_noteworthy() {
                writeln!(f, "{}", entry)?;
            }
        }
        let stats = self.stats();
        write!(
            f,
            "{} created, {} updated, {} metadata, {} removed, {} kept, {} errors, {} bytes in {:.2?}",
            stats.created,
            stats.content_updated,
            stats.metadata_updated,
            stats.removed,
            stats.kept,
            stats.errors,
            stats.bytes,
            self.duration
        )
    }
}
