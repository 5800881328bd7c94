//! Per-run synchronization options

use crate::report::{Direction, ReportEntry};
use ferrosync_config::Config;
use ferrosync_types::{AclEntry, Concurrency, Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Callback invoked once for every produced report entry
pub type Observer = Arc<dyn Fn(&ReportEntry) + Send + Sync>;

/// Concurrency caps for the task pool groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConcurrencyLimits {
    /// Metadata fetches in flight across the whole run
    pub fetch: Concurrency,
    /// Content copies and namespace writes in flight across the whole run
    pub copy: Concurrency,
    /// Children visited at once by a single namespace
    pub descend: Concurrency,
}

impl ConcurrencyLimits {
    /// The same cap for every group
    pub fn uniform(cap: Concurrency) -> Self {
        Self {
            fetch: cap,
            copy: cap,
            descend: cap,
        }
    }
}

/// User-id remapping tables applied to ACLs crossing sides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclMap {
    /// Applied when copying left to right
    pub left_to_right: HashMap<String, String>,
    /// Applied when copying right to left
    pub right_to_left: HashMap<String, String>,
}

impl AclMap {
    /// Table used for copies in `direction`
    pub fn table(&self, direction: Direction) -> &HashMap<String, String> {
        match direction {
            Direction::LeftToRight => &self.left_to_right,
            Direction::RightToLeft => &self.right_to_left,
        }
    }

    /// Substitute mapped user ids; unmapped entries pass through
    pub fn remap(&self, acl: &[AclEntry], direction: Direction) -> Vec<AclEntry> {
        let table = self.table(direction);
        acl.iter()
            .map(|entry| match table.get(&entry.user) {
                Some(user) => AclEntry {
                    user: user.clone(),
                    ..entry.clone()
                },
                None => entry.clone(),
            })
            .collect()
    }
}

/// Immutable options for one `synchronize` call
///
/// Built once with the consuming builder methods and then shared by
/// reference with every entry of the traversal.
#[derive(Clone)]
pub struct SyncOptions {
    /// Run every fan-out sequentially
    pub serial: bool,
    /// Per-group concurrency caps (ignored when `serial`)
    pub concurrency: ConcurrencyLimits,
    /// Descend into sub-namespaces
    pub recursive: bool,
    /// Plan and report without writing
    pub dry_run: bool,
    /// Reconcile in both directions, newest mtime wins
    pub bidirectional: bool,
    /// Leave right-only entries in place during one-way sync
    pub retain_orphans: bool,
    /// Fetch metadata without checksums and compare by size and mtime
    pub skip_checksum: bool,
    /// Neither compare nor remap ACLs
    pub ignore_acl: bool,
    /// User-id remapping tables
    pub acl_map: AclMap,
    /// Called with every report entry as it is produced
    pub observer: Option<Observer>,
    /// Log full decision inputs for the entry with this path
    pub trace_path: Option<String>,
    exclude_patterns: Vec<String>,
    exclude: GlobSet,
}

impl SyncOptions {
    /// One-way mirror with default caps
    pub fn new() -> Self {
        Self::default()
    }

    /// One-way sync that keeps right-only entries
    pub fn one_way() -> Self {
        Self::new().retain_orphans(true)
    }

    /// One-way sync that removes right-only entries
    pub fn mirror() -> Self {
        Self::new()
    }

    /// Two-way sync where the newer side wins
    pub fn bidirectional() -> Self {
        Self::new().with_bidirectional(true)
    }

    /// Build options from a loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let sync = &config.sync;
        let acl_map = AclMap {
            left_to_right: config.acl.left_to_right.clone().into_iter().collect(),
            right_to_left: config.acl.right_to_left.clone().into_iter().collect(),
        };

        let options = Self::new()
            .serial(sync.serial)
            .concurrency(ConcurrencyLimits {
                fetch: config.concurrency.fetch,
                copy: config.concurrency.copy,
                descend: config.concurrency.descend,
            })
            .recursive(sync.recursive)
            .dry_run(sync.dry_run)
            .with_bidirectional(sync.bidirectional)
            .retain_orphans(sync.retain_orphans)
            .skip_checksum(sync.skip_checksum)
            .ignore_acl(sync.ignore_acl)
            .acl_map(acl_map)
            .exclude(&config.filters.exclude)?;

        Ok(match &sync.trace_path {
            Some(path) => options.trace_path(path.clone()),
            None => options,
        })
    }

    /// Set serial mode
    pub fn serial(mut self, serial: bool) -> Self {
        self.serial = serial;
        self
    }

    /// Set per-group concurrency caps
    pub fn concurrency(mut self, limits: ConcurrencyLimits) -> Self {
        self.concurrency = limits;
        self
    }

    /// Set deep recursion
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set dry-run mode
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set bidirectional mode
    pub fn with_bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }

    /// Set the retain-orphans policy
    pub fn retain_orphans(mut self, retain: bool) -> Self {
        self.retain_orphans = retain;
        self
    }

    /// Compare without checksums
    pub fn skip_checksum(mut self, skip: bool) -> Self {
        self.skip_checksum = skip;
        self
    }

    /// Ignore ACLs entirely
    pub fn ignore_acl(mut self, ignore: bool) -> Self {
        self.ignore_acl = ignore;
        self
    }

    /// Replace the ACL remapping tables
    pub fn acl_map(mut self, acl_map: AclMap) -> Self {
        self.acl_map = acl_map;
        self
    }

    /// Add one user-id mapping for copies in `direction`
    pub fn map_user<S: Into<String>>(mut self, direction: Direction, from: S, to: S) -> Self {
        let table = match direction {
            Direction::LeftToRight => &mut self.acl_map.left_to_right,
            Direction::RightToLeft => &mut self.acl_map.right_to_left,
        };
        table.insert(from.into(), to.into());
        self
    }

    /// Add exclusion globs, matched against root-relative paths
    pub fn exclude<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclude_patterns
            .extend(patterns.into_iter().map(|p| p.as_ref().to_string()));

        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                Error::config(format!("Invalid exclude pattern '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }
        self.exclude = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to compile exclude patterns: {}", e)))?;
        Ok(self)
    }

    /// Install the per-entry observer
    pub fn observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ReportEntry) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Trace decisions for one path
    pub fn trace_path<S: Into<String>>(mut self, path: S) -> Self {
        self.trace_path = Some(path.into());
        self
    }

    /// Exclusion patterns as given
    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    /// Whether a root-relative path is excluded; a trailing `/` is ignored
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        if self.exclude_patterns.is_empty() {
            return false;
        }
        let path = relative_path.trim_end_matches('/');
        !path.is_empty() && self.exclude.is_match(path)
    }

    /// Effective cap for the fetch group
    pub fn fetch_limit(&self) -> usize {
        if self.serial {
            1
        } else {
            self.concurrency.fetch.get()
        }
    }

    /// Effective cap for the copy group
    pub fn copy_limit(&self) -> usize {
        if self.serial {
            1
        } else {
            self.concurrency.copy.get()
        }
    }

    /// Effective fan-out width for descent
    pub fn descend_limit(&self) -> usize {
        if self.serial {
            1
        } else {
            self.concurrency.descend.get()
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            serial: false,
            concurrency: ConcurrencyLimits::default(),
            recursive: true,
            dry_run: false,
            bidirectional: false,
            retain_orphans: false,
            skip_checksum: false,
            ignore_acl: false,
            acl_map: AclMap::default(),
            observer: None,
            trace_path: None,
            exclude_patterns: Vec::new(),
            exclude: GlobSet::empty(),
        }
    }
}

impl fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("serial", &self.serial)
            .field("concurrency", &self.concurrency)
            .field("recursive", &self.recursive)
            .field("dry_run", &self.dry_run)
            .field("bidirectional", &self.bidirectional)
            .field("retain_orphans", &self.retain_orphans)
            .field("skip_checksum", &self.skip_checksum)
            .field("ignore_acl", &self.ignore_acl)
            .field("acl_map", &self.acl_map)
            .field("observer", &self.observer.as_ref().map(|_| "<fn>"))
            .field("trace_path", &self.trace_path)
            .field("exclude", &self.exclude_patterns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let one_way = SyncOptions::one_way();
        assert!(one_way.retain_orphans);
        assert!(!one_way.bidirectional);

        let mirror = SyncOptions::mirror();
        assert!(!mirror.retain_orphans);
        assert!(mirror.recursive);

        assert!(SyncOptions::bidirectional().bidirectional);
    }

    #[test]
    fn test_serial_collapses_limits() {
        let options = SyncOptions::new()
            .concurrency(ConcurrencyLimits::uniform(Concurrency::new(8).unwrap()))
            .serial(true);
        assert_eq!(options.fetch_limit(), 1);
        assert_eq!(options.copy_limit(), 1);
        assert_eq!(options.descend_limit(), 1);
    }

    #[test]
    fn test_exclusion_matches_relative_paths() {
        let options = SyncOptions::new()
            .exclude(["*.tmp", "cache", "**/node_modules"])
            .unwrap();
        assert!(options.is_excluded("a.tmp"));
        assert!(options.is_excluded("cache/"));
        assert!(options.is_excluded("web/node_modules/"));
        assert!(!options.is_excluded("a.txt"));
        assert!(!options.is_excluded(""));
    }

    #[test]
    fn test_invalid_exclusion_is_config_error() {
        let err = SyncOptions::new().exclude(["a[b"]).unwrap_err();
        assert_eq!(err.kind(), ferrosync_types::ErrorKind::Config);
    }

    #[test]
    fn test_acl_remap() {
        let options = SyncOptions::new().map_user(Direction::LeftToRight, "alice", "alice@remote");
        let acl = vec![AclEntry::read_write("alice"), AclEntry::read_only("bob")];

        let remapped = options.acl_map.remap(&acl, Direction::LeftToRight);
        assert_eq!(remapped[0].user, "alice@remote");
        assert!(remapped[0].write);
        assert_eq!(remapped[1].user, "bob");

        let untouched = options.acl_map.remap(&acl, Direction::RightToLeft);
        assert_eq!(untouched, acl);
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.sync.bidirectional = true;
        config.sync.serial = true;
        config.filters.exclude = vec!["*.bak".to_string()];
        config
            .acl
            .right_to_left
            .insert("svc".to_string(), "root".to_string());

        let options = SyncOptions::from_config(&config).unwrap();
        assert!(options.bidirectional);
        assert_eq!(options.descend_limit(), 1);
        assert!(options.is_excluded("old.bak"));
        assert_eq!(
            options.acl_map.right_to_left.get("svc").map(String::as_str),
            Some("root")
        );
    }
}
