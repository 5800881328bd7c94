//! Core data types for ferrosync
//!
//! Metadata snapshots as reported by a [`Store`](crate::Store), access-control
//! entries, side tags and the `/`-separated path helpers shared by every crate.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Modification time in whole seconds since the Unix epoch
pub type Mtime = i64;

/// Path separator used by every store
pub const SEPARATOR: char = '/';

/// One of the two trees being reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Side {
    /// The left tree, authoritative in one-way mode
    Left,
    /// The right tree
    Right,
}

impl Side {
    /// The other side
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// A single access-control entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AclEntry {
    /// User (or principal) identifier
    pub user: String,
    /// Read permission
    pub read: bool,
    /// Write permission
    pub write: bool,
    /// Execute permission
    pub execute: bool,
}

impl AclEntry {
    /// Create a new ACL entry
    pub fn new<S: Into<String>>(user: S, read: bool, write: bool, execute: bool) -> Self {
        Self {
            user: user.into(),
            read,
            write,
            execute,
        }
    }

    /// Read-write entry for a user
    pub fn read_write<S: Into<String>>(user: S) -> Self {
        Self::new(user, true, true, false)
    }

    /// Read-only entry for a user
    pub fn read_only<S: Into<String>>(user: S) -> Self {
        Self::new(user, true, false, false)
    }

    /// Encode the permission bits as `rwx` with dashes for missing bits
    pub fn mode_string(&self) -> String {
        let mut mode = String::with_capacity(3);
        mode.push(if self.read { 'r' } else { '-' });
        mode.push(if self.write { 'w' } else { '-' });
        mode.push(if self.execute { 'x' } else { '-' });
        mode
    }
}

/// Metadata snapshot of one entry, as returned by `get_meta`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntryMeta {
    /// Store-relative path (namespaces end with `/`)
    pub path: String,
    /// Modification time in seconds
    pub mtime: Mtime,
    /// Content size in bytes (0 for namespaces)
    pub size: u64,
    /// BLAKE3 hex checksum, when requested and available
    pub checksum: Option<String>,
    /// Whether this entry is a namespace
    pub is_namespace: bool,
    /// Sorted child names (namespaces only)
    pub children: Vec<String>,
    /// Access-control entries
    pub acl: Vec<AclEntry>,
    /// Link target, for symlink leaves
    pub symlink: Option<String>,
}

impl EntryMeta {
    /// Metadata for a content leaf
    pub fn leaf<S: Into<String>>(path: S, size: u64, mtime: Mtime) -> Self {
        Self {
            path: path.into(),
            mtime,
            size,
            checksum: None,
            is_namespace: false,
            children: Vec::new(),
            acl: Vec::new(),
            symlink: None,
        }
    }

    /// Metadata for a namespace; children are sorted
    pub fn namespace<S: Into<String>>(path: S, mtime: Mtime, mut children: Vec<String>) -> Self {
        children.sort();
        Self {
            path: path.into(),
            mtime,
            size: 0,
            checksum: None,
            is_namespace: true,
            children,
            acl: Vec::new(),
            symlink: None,
        }
    }

    /// Metadata for a symlink leaf
    pub fn symlink<S: Into<String>, T: Into<String>>(path: S, target: T, mtime: Mtime) -> Self {
        let target = target.into();
        Self {
            path: path.into(),
            mtime,
            size: target.len() as u64,
            checksum: None,
            is_namespace: false,
            children: Vec::new(),
            acl: Vec::new(),
            symlink: Some(target),
        }
    }

    /// Set the checksum
    pub fn with_checksum<S: Into<String>>(mut self, checksum: S) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Set the ACL
    pub fn with_acl(mut self, acl: Vec<AclEntry>) -> Self {
        self.acl = acl;
        self
    }

    /// Whether this is a symlink leaf
    pub fn is_symlink(&self) -> bool {
        self.symlink.is_some()
    }

    /// Size and, when both sides carry one, checksum agree
    pub fn same_content(&self, other: &Self) -> bool {
        if self.size != other.size {
            return false;
        }
        match (&self.checksum, &other.checksum) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Snapshot equality: size, mtime and checksum-if-both-available
    pub fn same_snapshot(&self, other: &Self) -> bool {
        self.same_content(other) && self.mtime == other.mtime
    }
}

/// Order-insensitive ACL equality
pub fn acl_eq(a: &[AclEntry], b: &[AclEntry]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

/// What a destination reports once a content write is closed
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WriteSummary {
    /// Bytes persisted
    pub size: u64,
    /// Checksum of the persisted bytes, when the store computes one
    pub checksum: Option<String>,
}

/// BLAKE3 hex checksum of a byte slice
pub fn content_checksum(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Checksum of a namespace: BLAKE3 over its sorted child names
pub fn namespace_checksum(children: &[String]) -> String {
    let mut sorted: Vec<&str> = children.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    content_checksum(sorted.join("\n").as_bytes())
}

/// Whether a path names a namespace (`""` is the store root)
pub fn is_namespace_path(path: &str) -> bool {
    path.is_empty() || path.ends_with(SEPARATOR)
}

/// Append a child name to a namespace path
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() || parent.ends_with(SEPARATOR) {
        format!("{parent}{name}")
    } else {
        format!("{parent}{SEPARATOR}{name}")
    }
}

/// Parent namespace path of an entry (`""` for top-level entries)
pub fn parent_path(path: &str) -> &str {
    let trimmed = path.strip_suffix(SEPARATOR).unwrap_or(path);
    match trimmed.rfind(SEPARATOR) {
        Some(index) => &path[..=index],
        None => "",
    }
}

/// Last component of a path, keeping a namespace's trailing separator
pub fn entry_name(path: &str) -> &str {
    &path[parent_path(path).len()..]
}

/// Strip a root prefix, returning the path relative to that root
pub fn relative_to<'a>(root: &str, path: &'a str) -> &'a str {
    path.strip_prefix(root).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_helpers() {
        assert!(is_namespace_path(""));
        assert!(is_namespace_path("docs/"));
        assert!(!is_namespace_path("docs/a.txt"));

        assert_eq!(join_path("", "a.txt"), "a.txt");
        assert_eq!(join_path("docs/", "sub/"), "docs/sub/");
        assert_eq!(join_path("docs", "a.txt"), "docs/a.txt");

        assert_eq!(parent_path("docs/sub/a.txt"), "docs/sub/");
        assert_eq!(parent_path("docs/sub/"), "docs/");
        assert_eq!(parent_path("a.txt"), "");
        assert_eq!(entry_name("docs/sub/"), "sub/");
        assert_eq!(entry_name("docs/a.txt"), "a.txt");
        assert_eq!(relative_to("backup/", "backup/docs/a.txt"), "docs/a.txt");
    }

    #[test]
    fn test_snapshot_equality() {
        let a = EntryMeta::leaf("f", 10, 100).with_checksum("aa");
        let same = EntryMeta::leaf("f", 10, 100).with_checksum("aa");
        let touched = EntryMeta::leaf("f", 10, 200).with_checksum("aa");
        let edited = EntryMeta::leaf("f", 10, 100).with_checksum("bb");
        let unhashed = EntryMeta::leaf("f", 10, 100);

        assert!(a.same_snapshot(&same));
        assert!(a.same_content(&touched));
        assert!(!a.same_snapshot(&touched));
        assert!(!a.same_content(&edited));
        assert!(a.same_snapshot(&unhashed));
    }

    #[test]
    fn test_acl_eq_ignores_order() {
        let a = vec![AclEntry::read_write("alice"), AclEntry::read_only("bob")];
        let b = vec![AclEntry::read_only("bob"), AclEntry::read_write("alice")];
        let c = vec![AclEntry::read_only("alice"), AclEntry::read_only("bob")];

        assert!(acl_eq(&a, &b));
        assert!(!acl_eq(&a, &c));
        assert!(!acl_eq(&a, &a[..1]));
    }

    #[test]
    fn test_namespace_checksum_is_order_independent() {
        let a = namespace_checksum(&["b".to_string(), "a/".to_string()]);
        let b = namespace_checksum(&["a/".to_string(), "b".to_string()]);
        let c = namespace_checksum(&["a/".to_string()]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(AclEntry::new("u", true, false, true).mode_string(), "r-x");
    }
}
