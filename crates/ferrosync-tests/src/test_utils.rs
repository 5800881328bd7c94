//! Fixtures shared by the integration tests and benchmarks

use ferrosync_store::MemoryStore;
use ferrosync_sync::{synchronize, Report, SyncOptions};
use ferrosync_types::Mtime;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Deterministic content with some structure
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| ((i * 7 + 13) % 256) as u8).collect()
}

/// Two empty in-memory stores named `left` and `right`
pub fn memory_pair() -> (Arc<MemoryStore>, Arc<MemoryStore>) {
    (
        Arc::new(MemoryStore::new("left")),
        Arc::new(MemoryStore::new("right")),
    )
}

/// Synchronize two in-memory stores from their roots
pub async fn sync_memory(left: &Arc<MemoryStore>, right: &Arc<MemoryStore>, options: &SyncOptions) -> Report {
    synchronize(left.clone(), "", right.clone(), "", options).await
}

/// Fill `store` with a tree of `depth` levels, `width` sub-namespaces and
/// `files` leaves of `file_size` bytes per namespace
pub fn populate_tree(
    store: &MemoryStore,
    prefix: &str,
    depth: usize,
    width: usize,
    files: usize,
    file_size: usize,
    mtime: Mtime,
) {
    for f in 0..files {
        store.put_file(
            &format!("{}file{}.bin", prefix, f),
            generate_test_data(file_size + f),
            mtime,
        );
    }
    if depth == 0 {
        return;
    }
    for w in 0..width {
        let namespace = format!("{}dir{}/", prefix, w);
        store.put_namespace(&namespace, mtime);
        populate_tree(store, &namespace, depth - 1, width, files, file_size, mtime);
    }
}

/// Number of entries a full tree from [`populate_tree`] contains, root included
pub fn tree_entry_count(depth: usize, width: usize, files: usize) -> usize {
    let mut namespaces = 0;
    let mut level = 1;
    for _ in 0..=depth {
        namespaces += level;
        level *= width;
    }
    namespaces + namespaces * files
}

/// Write `files` (relative path, content) under `root`, creating directories
pub fn create_local_tree(root: &Path, files: &[(&str, &[u8])]) -> std::io::Result<()> {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}
