//! In-process store with explicit namespace listings
//!
//! Namespaces keep the child listing they were last written with, exactly like
//! a content-addressed directory object: a listing may name children that do
//! not exist (yet). Creating an entry registers its name in the parent listing
//! and removing one unregisters it.

use async_trait::async_trait;
use ferrosync_types::{
    content_checksum, entry_name, is_namespace_path, namespace_checksum, parent_path, AclEntry,
    ContentReader, ContentSink, EntryMeta, Error, Mtime, Result, Store, WriteSummary,
};
use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Clone)]
enum Node {
    Namespace { children: Vec<String> },
    File { content: Vec<u8> },
    Symlink { target: String },
}

#[derive(Debug, Clone)]
struct Record {
    node: Node,
    mtime: Mtime,
    acl: Vec<AclEntry>,
}

#[derive(Debug, Default)]
struct Faults {
    /// Every operation on these paths fails
    failing: HashSet<String>,
    /// Only metadata reads of these paths fail
    unreadable: HashSet<String>,
    /// Writes to these paths persist one byte less than was written
    corrupting: HashSet<String>,
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, Record>,
    faults: Faults,
}

impl State {
    fn check(&self, path: &str) -> Result<()> {
        if self.faults.failing.contains(path) {
            return Err(Error::io(format!("injected failure on '{path}'")));
        }
        Ok(())
    }

    fn meta(&self, path: &str, record: &Record, need_checksum: bool) -> EntryMeta {
        let meta = match &record.node {
            Node::Namespace { children } => {
                let meta = EntryMeta::namespace(path, record.mtime, children.clone());
                if need_checksum {
                    let checksum = namespace_checksum(&meta.children);
                    meta.with_checksum(checksum)
                } else {
                    meta
                }
            }
            Node::File { content } => {
                let meta = EntryMeta::leaf(path, content.len() as u64, record.mtime);
                if need_checksum {
                    meta.with_checksum(content_checksum(content))
                } else {
                    meta
                }
            }
            Node::Symlink { target } => {
                let meta = EntryMeta::symlink(path, target.clone(), record.mtime);
                if need_checksum {
                    meta.with_checksum(content_checksum(target.as_bytes()))
                } else {
                    meta
                }
            }
        };
        meta.with_acl(record.acl.clone())
    }

    /// Add `path`'s name to its parent's listing; the parent must exist
    fn register(&mut self, path: &str) -> Result<()> {
        let parent = parent_path(path);
        let name = entry_name(path).to_string();
        match self.entries.get_mut(parent) {
            Some(Record {
                node: Node::Namespace { children },
                ..
            }) => {
                if let Err(index) = children.binary_search(&name) {
                    children.insert(index, name);
                }
                Ok(())
            }
            Some(_) => Err(Error::other(format!(
                "parent of '{path}' is not a namespace"
            ))),
            None => Err(Error::not_found(parent)),
        }
    }

    fn unregister(&mut self, path: &str) {
        let name = entry_name(path);
        if let Some(Record {
            node: Node::Namespace { children },
            ..
        }) = self.entries.get_mut(parent_path(path))
        {
            children.retain(|child| child != name);
        }
    }

    fn insert(&mut self, path: &str, record: Record) -> Result<()> {
        if !path.is_empty() {
            self.register(path)?;
        }
        self.entries.insert(path.to_string(), record);
        Ok(())
    }

    /// Create every missing ancestor namespace of `path`
    fn ensure_parents(&mut self, path: &str, mtime: Mtime) {
        let parent = parent_path(path);
        if parent.is_empty() || self.entries.contains_key(parent) {
            return;
        }
        self.ensure_parents(parent, mtime);
        let record = Record {
            node: Node::Namespace {
                children: Vec::new(),
            },
            mtime,
            acl: Vec::new(),
        };
        // The grandparent was just ensured, so registration cannot fail.
        let _ = self.insert(parent, record);
    }
}

fn sorted_listing(children: &[String]) -> Vec<String> {
    let mut children = children.to_vec();
    children.sort();
    children.dedup();
    children
}

/// Store that keeps the whole tree in memory
///
/// Cloning a `MemoryStore` yields another handle onto the same tree.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    name: String,
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Create an empty store whose root namespace has mtime 0
    pub fn new<S: Into<String>>(name: S) -> Self {
        let mut state = State::default();
        state.entries.insert(
            String::new(),
            Record {
                node: Node::Namespace {
                    children: Vec::new(),
                },
                mtime: 0,
                acl: Vec::new(),
            },
        );
        Self {
            name: name.into(),
            state: Arc::new(RwLock::new(state)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn put(&self, path: &str, node: Node, mtime: Mtime, acl: Vec<AclEntry>) {
        let mut state = self.write();
        state.ensure_parents(path, mtime);
        let record = Record { node, mtime, acl };
        if path.is_empty() {
            state.entries.insert(String::new(), record);
        } else {
            // Parents were ensured above.
            let _ = state.insert(path, record);
        }
    }

    /// Seed a namespace, creating missing ancestors with the same mtime
    pub fn put_namespace(&self, path: &str, mtime: Mtime) {
        let children = match self.read().entries.get(path) {
            Some(Record {
                node: Node::Namespace { children },
                ..
            }) => children.clone(),
            _ => Vec::new(),
        };
        self.put(path, Node::Namespace { children }, mtime, Vec::new());
    }

    /// Seed a file, creating missing ancestors with the same mtime
    pub fn put_file(&self, path: &str, content: impl Into<Vec<u8>>, mtime: Mtime) {
        self.put(
            path,
            Node::File {
                content: content.into(),
            },
            mtime,
            Vec::new(),
        );
    }

    /// Seed a symlink, creating missing ancestors with the same mtime
    pub fn put_symlink(&self, path: &str, target: &str, mtime: Mtime) {
        self.put(
            path,
            Node::Symlink {
                target: target.to_string(),
            },
            mtime,
            Vec::new(),
        );
    }

    /// Replace an existing entry's ACL
    pub fn set_acl(&self, path: &str, acl: Vec<AclEntry>) -> Result<()> {
        let mut state = self.write();
        let record = state
            .entries
            .get_mut(path)
            .ok_or_else(|| Error::not_found(path))?;
        record.acl = acl;
        Ok(())
    }

    /// Replace an existing entry's mtime
    pub fn set_mtime(&self, path: &str, mtime: Mtime) -> Result<()> {
        let mut state = self.write();
        let record = state
            .entries
            .get_mut(path)
            .ok_or_else(|| Error::not_found(path))?;
        record.mtime = mtime;
        Ok(())
    }

    /// Content of a file, if present
    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        match self.read().entries.get(path) {
            Some(Record {
                node: Node::File { content },
                ..
            }) => Some(content.clone()),
            _ => None,
        }
    }

    /// Whether an entry exists at `path`
    pub fn contains(&self, path: &str) -> bool {
        self.read().entries.contains_key(path)
    }

    /// Every stored path except the root, sorted
    pub fn paths(&self) -> Vec<String> {
        self.read()
            .entries
            .keys()
            .filter(|path| !path.is_empty())
            .cloned()
            .collect()
    }

    /// Make every operation on `path` fail
    pub fn fail_on(&self, path: &str) {
        self.write().faults.failing.insert(path.to_string());
    }

    /// Make metadata reads of `path` fail while writes still succeed
    pub fn fail_meta_on(&self, path: &str) {
        self.write().faults.unreadable.insert(path.to_string());
    }

    /// Make writes to `path` persist a truncated payload
    pub fn corrupt_on(&self, path: &str) {
        self.write().faults.corrupting.insert(path.to_string());
    }

    /// Drop all injected faults
    pub fn clear_faults(&self) {
        let mut state = self.write();
        state.faults.failing.clear();
        state.faults.unreadable.clear();
        state.faults.corrupting.clear();
    }
}

struct MemorySink {
    state: Arc<RwLock<State>>,
    path: String,
    mtime: Mtime,
    acl: Vec<AclEntry>,
    buffer: Vec<u8>,
}

#[async_trait]
impl ContentSink for MemorySink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<WriteSummary> {
        let Self {
            state,
            path,
            mtime,
            acl,
            mut buffer,
        } = *self;
        let mut state = state.write().unwrap_or_else(PoisonError::into_inner);
        state.check(&path)?;
        if state.faults.corrupting.contains(&path) {
            buffer.pop();
        }
        let summary = WriteSummary {
            size: buffer.len() as u64,
            checksum: Some(content_checksum(&buffer)),
        };
        state.insert(
            &path,
            Record {
                node: Node::File { content: buffer },
                mtime,
                acl,
            },
        )?;
        debug!("memory store wrote {} ({} bytes)", path, summary.size);
        Ok(summary)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_meta(&self, path: &str, need_checksum: bool) -> Result<Option<EntryMeta>> {
        let state = self.read();
        state.check(path)?;
        if state.faults.unreadable.contains(path) {
            return Err(Error::io(format!("injected metadata failure on '{path}'")));
        }
        Ok(state
            .entries
            .get(path)
            .map(|record| state.meta(path, record, need_checksum)))
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>> {
        let state = self.read();
        state.check(path)?;
        match state.entries.get(path) {
            Some(Record {
                node: Node::Namespace { children },
                ..
            }) => Ok(children.clone()),
            Some(_) => Err(Error::other(format!("'{path}' is not a namespace"))),
            None => Err(Error::not_found(path)),
        }
    }

    async fn create_namespace(
        &self,
        path: &str,
        mtime: Mtime,
        children: &[String],
        acl: &[AclEntry],
    ) -> Result<()> {
        if !is_namespace_path(path) {
            return Err(Error::other(format!("'{path}' is not a namespace path")));
        }
        let mut state = self.write();
        state.check(path)?;
        if state.entries.contains_key(path) {
            return Err(Error::other(format!("'{path}' already exists")));
        }
        state.insert(
            path,
            Record {
                node: Node::Namespace {
                    children: sorted_listing(children),
                },
                mtime,
                acl: acl.to_vec(),
            },
        )
    }

    async fn update_namespace(
        &self,
        path: &str,
        mtime: Mtime,
        children: &[String],
        acl: &[AclEntry],
    ) -> Result<()> {
        let mut state = self.write();
        state.check(path)?;
        match state.entries.get_mut(path) {
            Some(record) if matches!(record.node, Node::Namespace { .. }) => {
                record.node = Node::Namespace {
                    children: sorted_listing(children),
                };
                record.mtime = mtime;
                record.acl = acl.to_vec();
                Ok(())
            }
            Some(_) => Err(Error::other(format!("'{path}' is not a namespace"))),
            None => Err(Error::not_found(path)),
        }
    }

    async fn open_reader(&self, path: &str) -> Result<ContentReader> {
        let state = self.read();
        state.check(path)?;
        match state.entries.get(path) {
            Some(Record {
                node: Node::File { content },
                ..
            }) => Ok(Box::pin(Cursor::new(content.clone()))),
            Some(_) => Err(Error::other(format!("'{path}' has no content stream"))),
            None => Err(Error::not_found(path)),
        }
    }

    async fn open_writer(
        &self,
        path: &str,
        mtime: Mtime,
        acl: &[AclEntry],
    ) -> Result<Box<dyn ContentSink>> {
        let state = self.read();
        state.check(path)?;
        if !state.entries.contains_key(parent_path(path)) {
            return Err(Error::not_found(parent_path(path)));
        }
        Ok(Box::new(MemorySink {
            state: Arc::clone(&self.state),
            path: path.to_string(),
            mtime,
            acl: acl.to_vec(),
            buffer: Vec::new(),
        }))
    }

    async fn write_symlink(
        &self,
        path: &str,
        target: &str,
        mtime: Mtime,
        acl: &[AclEntry],
    ) -> Result<()> {
        let mut state = self.write();
        state.check(path)?;
        state.insert(
            path,
            Record {
                node: Node::Symlink {
                    target: target.to_string(),
                },
                mtime,
                acl: acl.to_vec(),
            },
        )
    }

    async fn remove(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(Error::other("refusing to remove the store root"));
        }
        let mut state = self.write();
        state.check(path)?;
        if state.entries.remove(path).is_none() {
            return Err(Error::not_found(path));
        }
        if is_namespace_path(path) {
            state.entries.retain(|key, _| !key.starts_with(path));
        }
        state.unregister(path);
        debug!("memory store removed {}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_seeded_tree_is_listed() {
        let store = MemoryStore::new("mem");
        store.put_file("docs/a.txt", "hello", 10);
        store.put_namespace("docs/empty/", 20);

        assert_eq!(
            store.list_children("").await.unwrap(),
            vec!["docs/".to_string()]
        );
        assert_eq!(
            store.list_children("docs/").await.unwrap(),
            vec!["a.txt".to_string(), "empty/".to_string()]
        );

        let meta = store.get_meta("docs/a.txt", true).await.unwrap().unwrap();
        assert_eq!(meta.size, 5);
        assert_eq!(meta.mtime, 10);
        assert_eq!(meta.checksum, Some(content_checksum(b"hello")));
        assert!(store.get_meta("docs/missing", true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_writer_registers_and_reports() {
        let store = MemoryStore::new("mem");
        let mut sink = store
            .open_writer("f", 42, &[AclEntry::read_only("bob")])
            .await
            .unwrap();
        sink.write_chunk(b"abc").await.unwrap();
        sink.write_chunk(b"def").await.unwrap();
        let summary = sink.close().await.unwrap();

        assert_eq!(summary.size, 6);
        assert_eq!(summary.checksum, Some(content_checksum(b"abcdef")));
        assert_eq!(store.list_children("").await.unwrap(), vec!["f".to_string()]);

        let mut reader = store.open_reader("f").await.unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "abcdef");

        let meta = store.get_meta("f", false).await.unwrap().unwrap();
        assert_eq!(meta.acl, vec![AclEntry::read_only("bob")]);
        assert!(meta.checksum.is_none());
    }

    #[tokio::test]
    async fn test_namespace_listing_is_explicit() {
        let store = MemoryStore::new("mem");
        store
            .create_namespace("d/", 5, &["ghost".to_string()], &[])
            .await
            .unwrap();

        let meta = store.get_meta("d/", true).await.unwrap().unwrap();
        assert_eq!(meta.children, vec!["ghost".to_string()]);
        assert_eq!(meta.checksum, Some(namespace_checksum(&["ghost".to_string()])));
        assert!(store.get_meta("d/ghost", true).await.unwrap().is_none());

        store.update_namespace("d/", 6, &[], &[]).await.unwrap();
        assert!(store.list_children("d/").await.unwrap().is_empty());
        assert!(store.create_namespace("d/", 7, &[], &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_namespace_recursively() {
        let store = MemoryStore::new("mem");
        store.put_file("d/x/y.txt", "y", 1);
        store.put_file("keep.txt", "k", 1);

        store.remove("d/").await.unwrap();

        assert_eq!(store.paths(), vec!["keep.txt".to_string()]);
        assert_eq!(
            store.list_children("").await.unwrap(),
            vec!["keep.txt".to_string()]
        );
        assert!(store.remove("d/").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = MemoryStore::new("mem");
        store.put_file("f", "data", 1);
        store.fail_on("f");
        assert!(store.get_meta("f", true).await.is_err());

        store.clear_faults();
        store.put_namespace("d/", 1);
        store.fail_meta_on("d/");
        assert!(store.get_meta("d/", false).await.is_err());
        store.update_namespace("d/", 2, &[], &[]).await.unwrap();

        store.clear_faults();
        store.corrupt_on("g");
        let mut sink = store.open_writer("g", 1, &[]).await.unwrap();
        sink.write_chunk(b"data").await.unwrap();
        assert_eq!(sink.close().await.unwrap().size, 3);
    }
}
