//! Core types and storage contract for ferrosync
//!
//! This crate provides the foundational pieces shared by every ferrosync crate:
//!
//! - **Error handling**: a cloneable error taxonomy tagged with side and path
//! - **Metadata**: entry snapshots, ACL entries and path helpers
//! - **Storage contract**: the async [`Store`] capability set every backend implements
//! - **Configuration**: validated concurrency caps
//!
//! # Features
//!
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use ferrosync_types::{join_path, EntryMeta};
//!
//! let meta = EntryMeta::leaf(join_path("docs/", "a.txt"), 41, 1_700_000_000);
//! assert_eq!(meta.path, "docs/a.txt");
//! assert!(!meta.is_namespace);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::Concurrency;
pub use error::{Error, ErrorKind};
pub use result::Result;
pub use traits::*;
pub use types::*;
