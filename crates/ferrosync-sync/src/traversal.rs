//! Recursive traversal engine
//!
//! Each call owns the pair context of one tree position and the contexts it
//! derives for its children; only the run context is shared, by reference.
//! Every call returns the report entries of its subtree, own entry last.

use crate::options::SyncOptions;
use crate::pair::PairContext;
use crate::pool::TaskPool;
use crate::report::ReportEntry;
use ferrosync_types::{Error, Store};
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

/// Read-only state shared by every entry of one run
pub struct RunContext<'a> {
    /// Left store
    pub left: &'a dyn Store,
    /// Right store
    pub right: &'a dyn Store,
    /// Run options
    pub options: &'a SyncOptions,
    /// Task pool bounding store calls and fan-out
    pub pool: TaskPool,
}

impl<'a> RunContext<'a> {
    /// Bundle the stores and options of a run
    pub fn new(left: &'a dyn Store, right: &'a dyn Store, options: &'a SyncOptions) -> Self {
        Self {
            left,
            right,
            options,
            pool: TaskPool::from_options(options),
        }
    }

    fn emit(&self, entry: &ReportEntry) {
        if let Some(observer) = &self.options.observer {
            observer(entry);
        }
    }
}

/// Synchronize one tree position and everything below it
pub fn sync_entry<'a>(run: &'a RunContext<'a>, mut pair: PairContext) -> BoxFuture<'a, Vec<ReportEntry>> {
    async move {
        let options = run.options;
        let mut entry = pair.blank_entry();

        if let Some(parent_error) = pair.inherited.take() {
            entry.error = Some(Error::inherited(pair.relative.clone(), &parent_error));
            run.emit(&entry);
            return vec![entry];
        }

        let need_checksum = !options.skip_checksum;
        let (left_fetch, right_fetch) = futures::join!(
            pair.left.fetch(run.left, &run.pool, need_checksum),
            pair.right.fetch(run.right, &run.pool, need_checksum),
        );
        match (left_fetch, right_fetch) {
            (Ok(()), Ok(())) => {}
            (Err(e), Ok(())) | (Ok(()), Err(e)) if options.bidirectional => {
                warn!("{}; continuing with the other side", e);
            }
            (Err(e), _) | (_, Err(e)) => {
                debug!("fetch of '{}' failed: {}", pair.relative, e);
                entry.error = Some(e);
                run.emit(&entry);
                return vec![entry];
            }
        }

        pair.decide(options, &mut entry);

        if !pair.is_namespace() {
            if entry.outcome.copies_content() && !options.dry_run {
                if let Err(e) = pair.copy_leaf(run).await {
                    debug!("copy of '{}' failed: {}", pair.relative, e);
                    entry.error = Some(e);
                }
            }
            run.emit(&entry);
            return vec![entry];
        }

        if !pair.left.exists() && !pair.right.exists() {
            run.emit(&entry);
            return vec![entry];
        }

        let plan = pair.plan(options);
        let (displaced, rest): (Vec<String>, Vec<String>) = plan
            .union
            .iter()
            .cloned()
            .partition(|name| plan.displaced.contains(name));

        if let Err(e) = pair.write_before(run).await {
            debug!("namespace write of '{}' failed: {}", pair.relative, e);
            entry.error = Some(e);
        }

        let mut entries: Vec<ReportEntry> = run
            .pool
            .join(children(run, &pair, &displaced, &entry.error))
            .await
            .into_iter()
            .flatten()
            .collect();

        if entry.error.is_none() {
            if let Err(e) = pair.remove_displaced(run).await {
                debug!("removal under '{}' failed: {}", pair.relative, e);
                entry.error = Some(e);
            }
        }

        entries.extend(
            run.pool
                .join(children(run, &pair, &rest, &entry.error))
                .await
                .into_iter()
                .flatten(),
        );

        if entry.error.is_none() {
            if let Err(e) = pair.write_after(run).await {
                debug!("namespace rewrite of '{}' failed: {}", pair.relative, e);
                entry.error = Some(e);
            }
        }

        run.emit(&entry);
        entries.push(entry);
        entries
    }
    .boxed()
}

fn children<'a>(
    run: &'a RunContext<'a>,
    pair: &PairContext,
    names: &[String],
    inherited: &Option<Error>,
) -> Vec<BoxFuture<'a, Vec<ReportEntry>>> {
    names
        .iter()
        .map(|name| sync_entry(run, pair.child(name, inherited.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Outcome;
    use ferrosync_store::MemoryStore;

    #[tokio::test]
    async fn test_children_before_parent() {
        let left = MemoryStore::new("left");
        left.put_file("d/x", b"1", 1);
        let right = MemoryStore::new("right");
        let options = SyncOptions::new();
        let run = RunContext::new(&left, &right, &options);

        let entries = sync_entry(&run, PairContext::root("", "")).await;
        let paths: Vec<&str> = entries.iter().map(|e| e.left_path.as_str()).collect();
        assert_eq!(paths, vec!["d/x", "d/", ""]);
        assert_eq!(entries[0].outcome, Outcome::Created);
        assert_eq!(right.read_file("d/x"), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_retained_orphan_leaves_parent_unchanged() {
        let left = MemoryStore::new("left");
        left.put_file("d/x", b"1", 1);
        let right = MemoryStore::new("right");
        right.put_file("d/x", b"1", 1);
        right.put_file("d/orphan", b"2", 1);
        let options = SyncOptions::one_way();
        let run = RunContext::new(&left, &right, &options);

        let entries = sync_entry(&run, PairContext::root("", "")).await;
        let namespace = entries.iter().find(|e| e.left_path == "d/").unwrap();
        assert_eq!(namespace.outcome, Outcome::Unchanged);
        let orphan = entries.iter().find(|e| e.right_path == "d/orphan").unwrap();
        assert_eq!(orphan.outcome, Outcome::Kept);
        assert!(right.contains("d/orphan"));
    }

    #[tokio::test]
    async fn test_failed_namespace_write_is_inherited() {
        let left = MemoryStore::new("left");
        left.put_file("d/x", b"1", 1);
        left.put_file("d/y", b"2", 1);
        let right = MemoryStore::new("right");
        right.fail_on("d/");
        let options = SyncOptions::new();
        let run = RunContext::new(&left, &right, &options);

        let entries = sync_entry(&run, PairContext::root("", "")).await;
        let namespace = entries.iter().find(|e| e.left_path == "d/").unwrap();
        assert!(matches!(namespace.error, Some(Error::Write { .. })));

        let children: Vec<&ReportEntry> = entries
            .iter()
            .filter(|e| e.left_path.starts_with("d/") && e.left_path != "d/")
            .collect();
        assert_eq!(children.len(), 2);
        assert!(children
            .iter()
            .all(|e| matches!(e.error, Some(Error::Inherited { .. }))));
        assert!(!right.contains("d/x"));
    }
}
