//! Store backed by a directory on the local filesystem
//!
//! Listings come from the directory itself, so the children argument of the
//! namespace writes is advisory. Content is written to a hidden temporary
//! sibling and renamed into place on close.

use async_trait::async_trait;
use ferrosync_types::{
    namespace_checksum, AclEntry, ContentReader, ContentSink, EntryMeta, Error, Mtime, Result,
    Store, WriteSummary, SEPARATOR,
};
use filetime::FileTime;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

const TEMP_SUFFIX: &str = ".ferrosync-tmp";
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    name: String,
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root`; the directory is not touched until used
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            name: root.display().to_string(),
            root,
        }
    }

    /// Filesystem root of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_end_matches(SEPARATOR));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::other(format!("path '{path}' escapes the store root")));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(action: &str, path: &Path, e: &std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        return Error::not_found(path.display().to_string());
    }
    Error::io(format!("Failed to {} '{}': {}", action, path.display(), e))
}

fn mtime_of(metadata: &std::fs::Metadata) -> Mtime {
    FileTime::from_last_modification_time(metadata).unix_seconds()
}

#[cfg(unix)]
fn acl_from_metadata(metadata: &std::fs::Metadata) -> Vec<AclEntry> {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode();
    ["owner", "group", "other"]
        .iter()
        .enumerate()
        .map(|(index, user)| {
            let bits = (mode >> (6 - index * 3)) & 0o7;
            AclEntry::new(*user, bits & 0o4 != 0, bits & 0o2 != 0, bits & 0o1 != 0)
        })
        .collect()
}

#[cfg(not(unix))]
fn acl_from_metadata(_metadata: &std::fs::Metadata) -> Vec<AclEntry> {
    Vec::new()
}

#[cfg(unix)]
async fn apply_acl(path: &Path, acl: &[AclEntry]) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if acl.is_empty() {
        return Ok(());
    }
    let mut mode = 0u32;
    for entry in acl {
        let shift = match entry.user.as_str() {
            "owner" => 6,
            "group" => 3,
            "other" => 0,
            // Principals without a mode-bit slot cannot be represented here.
            _ => continue,
        };
        let bits = (u32::from(entry.read) << 2)
            | (u32::from(entry.write) << 1)
            | u32::from(entry.execute);
        mode |= bits << shift;
    }
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| io_error("set permissions on", path, &e))
}

#[cfg(not(unix))]
async fn apply_acl(_path: &Path, _acl: &[AclEntry]) -> Result<()> {
    Ok(())
}

fn apply_mtime(path: &Path, mtime: Mtime) -> Result<()> {
    filetime::set_file_mtime(path, FileTime::from_unix_time(mtime, 0))
        .map_err(|e| io_error("set modification time for", path, &e))
}

async fn file_checksum(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .await
        .map_err(|e| io_error("open", path, &e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| io_error("read", path, &e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

async fn read_listing(dir: &Path) -> Result<Vec<String>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| io_error("read directory", dir, &e))?;
    let mut children = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| io_error("read directory entry in", dir, &e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(TEMP_SUFFIX) {
            continue;
        }
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| io_error("stat", &entry.path(), &e))?;
        if file_type.is_dir() {
            children.push(format!("{name}{SEPARATOR}"));
        } else {
            children.push(name);
        }
    }
    children.sort();
    Ok(children)
}

#[async_trait]
impl Store for LocalStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_meta(&self, path: &str, need_checksum: bool) -> Result<Option<EntryMeta>> {
        let full = self.resolve(path)?;
        let metadata = match fs::symlink_metadata(&full).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("stat", &full, &e)),
        };
        let mtime = mtime_of(&metadata);
        let acl = acl_from_metadata(&metadata);

        let wants_namespace = path.is_empty() || path.ends_with(SEPARATOR);
        if metadata.is_dir() != wants_namespace {
            // `x/` asked for but `x` is a file (or the reverse): a different entry.
            return Ok(None);
        }

        let meta = if metadata.is_dir() {
            let children = read_listing(&full).await?;
            let meta = EntryMeta::namespace(path, mtime, children);
            if need_checksum {
                let checksum = namespace_checksum(&meta.children);
                meta.with_checksum(checksum)
            } else {
                meta
            }
        } else if metadata.file_type().is_symlink() {
            let target = fs::read_link(&full)
                .await
                .map_err(|e| io_error("read link", &full, &e))?;
            let target = target.to_string_lossy().into_owned();
            let checksum = ferrosync_types::content_checksum(target.as_bytes());
            let meta = EntryMeta::symlink(path, target, mtime);
            if need_checksum {
                meta.with_checksum(checksum)
            } else {
                meta
            }
        } else {
            let meta = EntryMeta::leaf(path, metadata.len(), mtime);
            if need_checksum {
                meta.with_checksum(file_checksum(&full).await?)
            } else {
                meta
            }
        };
        Ok(Some(meta.with_acl(acl)))
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>> {
        let full = self.resolve(path)?;
        read_listing(&full).await
    }

    async fn create_namespace(
        &self,
        path: &str,
        mtime: Mtime,
        _children: &[String],
        acl: &[AclEntry],
    ) -> Result<()> {
        let full = self.resolve(path)?;
        fs::create_dir(&full)
            .await
            .map_err(|e| io_error("create directory", &full, &e))?;
        apply_acl(&full, acl).await?;
        apply_mtime(&full, mtime)?;
        debug!("Created directory {}", full.display());
        Ok(())
    }

    async fn update_namespace(
        &self,
        path: &str,
        mtime: Mtime,
        _children: &[String],
        acl: &[AclEntry],
    ) -> Result<()> {
        let full = self.resolve(path)?;
        let metadata = fs::metadata(&full)
            .await
            .map_err(|e| io_error("stat", &full, &e))?;
        if !metadata.is_dir() {
            return Err(Error::other(format!("'{}' is not a directory", full.display())));
        }
        apply_acl(&full, acl).await?;
        apply_mtime(&full, mtime)
    }

    async fn open_reader(&self, path: &str) -> Result<ContentReader> {
        let full = self.resolve(path)?;
        let file = fs::File::open(&full)
            .await
            .map_err(|e| io_error("open", &full, &e))?;
        Ok(Box::pin(file))
    }

    async fn open_writer(
        &self,
        path: &str,
        mtime: Mtime,
        acl: &[AclEntry],
    ) -> Result<Box<dyn ContentSink>> {
        let target = self.resolve(path)?;
        let file_name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::other(format!("'{path}' has no file name")))?;
        let temp = target.with_file_name(format!(".{file_name}{TEMP_SUFFIX}"));
        let file = fs::File::create(&temp)
            .await
            .map_err(|e| io_error("create", &temp, &e))?;
        Ok(Box::new(LocalSink {
            file,
            temp,
            target,
            hasher: blake3::Hasher::new(),
            size: 0,
            mtime,
            acl: acl.to_vec(),
        }))
    }

    async fn write_symlink(
        &self,
        path: &str,
        target: &str,
        mtime: Mtime,
        _acl: &[AclEntry],
    ) -> Result<()> {
        let full = self.resolve(path)?;
        if fs::symlink_metadata(&full).await.is_ok() {
            fs::remove_file(&full)
                .await
                .map_err(|e| io_error("replace", &full, &e))?;
        }
        create_symlink(target, &full).await?;
        let time = FileTime::from_unix_time(mtime, 0);
        filetime::set_symlink_file_times(&full, time, time)
            .map_err(|e| io_error("set modification time for", &full, &e))
    }

    async fn remove(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(Error::other("refusing to remove the store root"));
        }
        let full = self.resolve(path)?;
        let metadata = fs::symlink_metadata(&full)
            .await
            .map_err(|e| io_error("stat", &full, &e))?;
        if metadata.is_dir() {
            fs::remove_dir_all(&full)
                .await
                .map_err(|e| io_error("remove directory", &full, &e))?;
        } else {
            fs::remove_file(&full)
                .await
                .map_err(|e| io_error("remove file", &full, &e))?;
        }
        debug!("Removed {}", full.display());
        Ok(())
    }
}

#[cfg(unix)]
async fn create_symlink(target: &str, link: &Path) -> Result<()> {
    fs::symlink(target, link)
        .await
        .map_err(|e| io_error("create symlink", link, &e))
}

#[cfg(not(unix))]
async fn create_symlink(_target: &str, link: &Path) -> Result<()> {
    Err(Error::other(format!(
        "symlinks are not supported here: '{}'",
        link.display()
    )))
}

struct LocalSink {
    file: fs::File,
    temp: PathBuf,
    target: PathBuf,
    hasher: blake3::Hasher,
    size: u64,
    mtime: Mtime,
    acl: Vec<AclEntry>,
}

#[async_trait]
impl ContentSink for LocalSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| io_error("write", &self.temp, &e))?;
        self.hasher.update(chunk);
        self.size += chunk.len() as u64;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<WriteSummary> {
        let Self {
            mut file,
            temp,
            target,
            hasher,
            size,
            mtime,
            acl,
        } = *self;
        file.flush()
            .await
            .map_err(|e| io_error("flush", &temp, &e))?;
        file.sync_all()
            .await
            .map_err(|e| io_error("sync", &temp, &e))?;
        drop(file);

        fs::rename(&temp, &target)
            .await
            .map_err(|e| io_error("rename into", &target, &e))?;
        apply_acl(&target, &acl).await?;
        apply_mtime(&target, mtime)?;

        Ok(WriteSummary {
            size,
            checksum: Some(hasher.finalize().to_hex().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_meta_and_listing() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), b"test content").unwrap();
        let store = LocalStore::new(temp_dir.path());

        assert_eq!(
            store.list_children("").await.unwrap(),
            vec!["a.txt".to_string(), "sub/".to_string()]
        );

        let meta = store.get_meta("a.txt", true).await.unwrap().unwrap();
        assert_eq!(meta.size, 12);
        assert_eq!(
            meta.checksum,
            Some(ferrosync_types::content_checksum(b"test content"))
        );
        assert!(store.get_meta("a.txt/", true).await.unwrap().is_none());
        assert!(store.get_meta("missing", true).await.unwrap().is_none());

        let root = store.get_meta("", true).await.unwrap().unwrap();
        assert!(root.is_namespace);
        assert_eq!(root.children.len(), 2);
    }

    #[tokio::test]
    async fn test_local_write_sets_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path());

        let mut sink = store.open_writer("f.bin", 1_600_000_000, &[]).await.unwrap();
        sink.write_chunk(b"0123456789").await.unwrap();
        let summary = sink.close().await.unwrap();

        assert_eq!(summary.size, 10);
        let meta = store.get_meta("f.bin", true).await.unwrap().unwrap();
        assert_eq!(meta.mtime, 1_600_000_000);
        assert_eq!(meta.checksum, summary.checksum);
        assert_eq!(store.list_children("").await.unwrap(), vec!["f.bin".to_string()]);
    }

    #[tokio::test]
    async fn test_local_namespace_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path());

        store.create_namespace("d/", 1_500_000_000, &[], &[]).await.unwrap();
        std::fs::write(temp_dir.path().join("d").join("x"), b"x").unwrap();
        store.update_namespace("d/", 1_500_000_100, &[], &[]).await.unwrap();

        let meta = store.get_meta("d/", false).await.unwrap().unwrap();
        assert_eq!(meta.mtime, 1_500_000_100);
        assert_eq!(meta.children, vec!["x".to_string()]);

        store.remove("d/").await.unwrap();
        assert!(store.get_meta("d/", false).await.unwrap().is_none());
        assert!(store.resolve("../etc").is_err());
    }
}
