//! Per-side state of one tree position

use crate::pool::{TaskGroup, TaskPool};
use ferrosync_types::{
    is_namespace_path, join_path, AclEntry, EntryMeta, Error, Mtime, Result, Side, Store,
};
use tracing::debug;

/// One side of a tree position: existence, fetched metadata and applied writes
///
/// Created by the parent when deriving a child and dropped once the entry
/// returns. It only executes what its pair context decides.
#[derive(Debug, Clone)]
pub struct SideContext {
    side: Side,
    path: String,
    exists: bool,
    unreadable: bool,
    meta: Option<EntryMeta>,
    created: bool,
    applied_mtime: Option<Mtime>,
}

impl SideContext {
    /// Context for a position believed to exist (or not)
    pub fn new<S: Into<String>>(side: Side, path: S, exists: bool) -> Self {
        Self {
            side,
            path: path.into(),
            exists,
            unreadable: false,
            meta: None,
            created: false,
            applied_mtime: None,
        }
    }

    /// Which side this is
    pub fn side(&self) -> Side {
        self.side
    }

    /// Store-relative path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the entry exists (after fetch: whether it was found)
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Whether the position is a namespace
    pub fn is_namespace(&self) -> bool {
        is_namespace_path(&self.path)
    }

    /// Fetched metadata; `None` before fetch or when missing
    pub fn meta(&self) -> Option<&EntryMeta> {
        if self.exists {
            self.meta.as_ref()
        } else {
            None
        }
    }

    /// Existing children of a fetched namespace
    pub fn children(&self) -> &[String] {
        match self.meta() {
            Some(meta) => &meta.children,
            None => &[],
        }
    }

    /// Whether this side created the namespace during the run
    pub fn created(&self) -> bool {
        self.created
    }

    /// Mtime of the last namespace write
    pub fn applied_mtime(&self) -> Option<Mtime> {
        self.applied_mtime
    }

    /// Derive the context of a child; it exists only if listed here
    pub fn child(&self, name: &str) -> Self {
        let exists = self.children().binary_search_by(|c| c.as_str().cmp(name)).is_ok();
        Self::new(self.side, join_path(&self.path, name), exists)
    }

    /// Treat the entry as missing from now on
    pub fn mark_missing(&mut self) {
        self.exists = false;
        self.meta = None;
    }

    /// Retrieve metadata if the entry is believed to exist
    ///
    /// A missing entry is not an error. On failure the side is marked missing
    /// and a side/path-tagged fetch error is returned.
    pub async fn fetch(&mut self, store: &dyn Store, pool: &TaskPool, need_checksum: bool) -> Result<()> {
        if !self.exists {
            return Ok(());
        }
        let result = pool
            .run(TaskGroup::Fetch, store.get_meta(&self.path, need_checksum))
            .await;
        match result {
            Ok(Some(meta)) => {
                debug!(
                    "fetched {} '{}' size={} mtime={}",
                    self.side, self.path, meta.size, meta.mtime
                );
                self.meta = Some(meta);
                Ok(())
            }
            Ok(None) => {
                debug!("{} '{}' disappeared before fetch", self.side, self.path);
                self.mark_missing();
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                self.mark_missing();
                Ok(())
            }
            Err(e) => {
                self.mark_missing();
                self.unreadable = true;
                Err(Error::fetch(self.side, self.path.clone(), e))
            }
        }
    }

    /// Write namespace metadata: update when it exists, create otherwise
    ///
    /// A namespace whose fetch failed may still exist, so it is updated first
    /// and only created when the update finds nothing there.
    pub async fn apply_namespace(
        &mut self,
        store: &dyn Store,
        pool: &TaskPool,
        mtime: Mtime,
        children: &[String],
        acl: &[AclEntry],
    ) -> Result<()> {
        let create = !self.exists && !self.unreadable;
        let mut result = if create {
            pool.run(
                TaskGroup::Copy,
                store.create_namespace(&self.path, mtime, children, acl),
            )
            .await
        } else {
            pool.run(
                TaskGroup::Copy,
                store.update_namespace(&self.path, mtime, children, acl),
            )
            .await
        };
        let mut created = create;
        if !self.exists && self.unreadable && result.as_ref().is_err_and(Error::is_not_found) {
            debug!("{} '{}' not found on update, creating", self.side, self.path);
            result = pool
                .run(
                    TaskGroup::Copy,
                    store.create_namespace(&self.path, mtime, children, acl),
                )
                .await;
            created = true;
        }
        result.map_err(|e| Error::write(self.side, self.path.clone(), e))?;

        if created {
            debug!("created namespace {} '{}'", self.side, self.path);
            self.created = true;
        }
        self.exists = true;
        self.unreadable = false;
        self.applied_mtime = Some(mtime);
        Ok(())
    }
}
