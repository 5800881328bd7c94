//! Configuration management system for ferrosync
//!
//! This crate loads synchronization settings from YAML, TOML or JSON files with
//! environment variable overrides, validates them, and hands them to the
//! synchronizer, which turns them into its immutable per-run options.
//!
//! # Examples
//!
//! ```rust
//! use ferrosync_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("ferrosync.yaml")
//!     .add_env_prefix("FERROSYNC")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! assert!(config.sync.recursive);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use ferrosync_types::Concurrency;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Main configuration structure for ferrosync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Synchronization policy
    #[serde(default)]
    pub sync: SyncConfig,
    /// Per-group concurrency caps
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    /// Exclusion filters
    #[serde(default)]
    pub filters: FilterConfig,
    /// ACL handling
    #[serde(default)]
    pub acl: AclConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Synchronization policy flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Reconcile in both directions, newest mtime wins
    pub bidirectional: bool,
    /// Plan and report without writing
    pub dry_run: bool,
    /// Leave right-only entries in place during one-way sync
    pub retain_orphans: bool,
    /// Compare by size and mtime only
    pub skip_checksum: bool,
    /// Neither compare nor remap ACLs
    pub ignore_acl: bool,
    /// Descend into sub-namespaces
    pub recursive: bool,
    /// Run every fan-out sequentially
    pub serial: bool,
    /// Log full decision inputs for this path
    pub trace_path: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bidirectional: false,
            dry_run: false,
            retain_orphans: false,
            skip_checksum: false,
            ignore_acl: false,
            recursive: true,
            serial: false,
            trace_path: None,
        }
    }
}

/// Concurrency caps per task group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Concurrent metadata fetches
    pub fetch: Concurrency,
    /// Concurrent content copies
    pub copy: Concurrency,
    /// Children visited at once by one namespace
    pub descend: Concurrency,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        let optimal = Concurrency::optimal();
        Self {
            fetch: optimal,
            copy: optimal,
            descend: optimal,
        }
    }
}

/// Exclusion filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Glob patterns matched against root-relative paths
    pub exclude: Vec<String>,
}

/// ACL user-id remapping tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    /// User ids rewritten when copying left to right
    pub left_to_right: BTreeMap<String, String>,
    /// User ids rewritten when copying right to left
    pub right_to_left: BTreeMap<String, String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
        }
    }
}
