//! Bidirectional tree synchronization for ferrosync
//!
//! This crate reconciles two namespace trees held in any pair of stores that
//! implement [`ferrosync_types::Store`]:
//!
//! - **Decision function**: per-entry outcome from both sides' metadata
//! - **Merge planning**: which children to recurse into and which listings to write before and after descent
//! - **Bidirectional resolution**: the newer side wins, ties go left
//! - **Retention policies**: remove or keep right-only entries during one-way sync
//! - **Dry runs**: the same plan and statistics without a single write
//! - **Bounded concurrency**: capped fetch and copy groups, per-namespace fan-out width
//!
//! # Examples
//!
//! ```rust
//! use ferrosync_store::MemoryStore;
//! use ferrosync_sync::{synchronize, SyncOptions};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let left = Arc::new(MemoryStore::new("left"));
//! left.put_file("a.txt", b"hello".to_vec(), 1);
//! let right = Arc::new(MemoryStore::new("right"));
//!
//! let report = synchronize(left, "", right.clone(), "", &SyncOptions::mirror()).await;
//! assert_eq!(report.stats().created, 1);
//! assert_eq!(right.read_file("a.txt"), Some(b"hello".to_vec()));
//! # });
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod merge;
pub mod options;
pub mod pair;
pub mod pool;
pub mod report;
pub mod side;
pub mod traversal;

pub use engine::synchronize;
pub use merge::{MergePlan, MergePolicy};
pub use options::{AclMap, ConcurrencyLimits, Observer, SyncOptions};
pub use pair::{decide, Decision, PairContext};
pub use pool::{TaskGroup, TaskPool};
pub use report::{Direction, Outcome, Report, ReportEntry, Stats};
pub use side::SideContext;
