//! Storage backends for ferrosync
//!
//! Two implementations of the [`ferrosync_types::Store`] contract:
//!
//! - [`MemoryStore`]: an in-process tree with explicit namespace listings,
//!   caller-controlled mtimes and fault injection, used by tests and benchmarks
//! - [`LocalStore`]: a directory tree on the local filesystem
//!
//! # Examples
//!
//! ```rust
//! use ferrosync_store::MemoryStore;
//!
//! let store = MemoryStore::new("left");
//! store.put_file("docs/readme.md", "hello", 1_700_000_000);
//! assert!(store.contains("docs/"));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod local;
pub mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;
