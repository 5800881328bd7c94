//! Storage-backend contract
//!
//! The synchronizer never touches a backend directly; it only speaks the
//! capability set below. A local directory tree, an in-memory tree, an object
//! store or a remote proxy are all just implementations of [`Store`].

use crate::{AclEntry, EntryMeta, Mtime, Result, WriteSummary};
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Byte stream returned by [`Store::open_reader`]
pub type ContentReader = Pin<Box<dyn AsyncRead + Send>>;

/// Byte sink returned by [`Store::open_writer`]
///
/// Nothing is guaranteed to be visible until [`ContentSink::close`] returns;
/// the returned summary is what the destination actually persisted.
#[async_trait]
pub trait ContentSink: Send {
    /// Append a chunk of content
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;

    /// Finish the write, reporting persisted size and checksum
    async fn close(self: Box<Self>) -> Result<WriteSummary>;
}

/// Hierarchical store consumed by the synchronizer
///
/// Paths are `/`-separated and relative to the store root (`""`); namespace
/// paths end with `/`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short human-readable name for logs and reports
    fn name(&self) -> &str;

    /// Fetch metadata; `Ok(None)` when the entry does not exist
    async fn get_meta(&self, path: &str, need_checksum: bool) -> Result<Option<EntryMeta>>;

    /// Ordered child names of a namespace; sub-namespaces end with `/`
    async fn list_children(&self, path: &str) -> Result<Vec<String>>;

    /// Create a namespace with the given listing
    async fn create_namespace(
        &self,
        path: &str,
        mtime: Mtime,
        children: &[String],
        acl: &[AclEntry],
    ) -> Result<()>;

    /// Update an existing namespace's mtime, listing and ACL
    async fn update_namespace(
        &self,
        path: &str,
        mtime: Mtime,
        children: &[String],
        acl: &[AclEntry],
    ) -> Result<()>;

    /// Open a content leaf for reading
    async fn open_reader(&self, path: &str) -> Result<ContentReader>;

    /// Open a content leaf for writing; mtime and ACL apply on close
    async fn open_writer(
        &self,
        path: &str,
        mtime: Mtime,
        acl: &[AclEntry],
    ) -> Result<Box<dyn ContentSink>>;

    /// Create or replace a symlink leaf
    async fn write_symlink(
        &self,
        path: &str,
        target: &str,
        mtime: Mtime,
        acl: &[AclEntry],
    ) -> Result<()>;

    /// Remove an entry; namespaces are removed with everything below them
    async fn remove(&self, path: &str) -> Result<()>;
}
