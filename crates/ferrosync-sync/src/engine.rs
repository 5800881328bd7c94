//! Top-level synchronization entry point

use crate::options::SyncOptions;
use crate::pair::PairContext;
use crate::report::Report;
use crate::traversal::{sync_entry, RunContext};
use ferrosync_types::{Error, Result, Side, Store};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Synchronize the tree under `right_root` with the tree under `left_root`
///
/// Both roots must name existing namespaces; otherwise the report carries a
/// global error and no entries. Every other failure is attached to the entry
/// it happened on and the rest of the tree is still synchronized.
pub async fn synchronize(
    left: Arc<dyn Store>,
    left_root: &str,
    right: Arc<dyn Store>,
    right_root: &str,
    options: &SyncOptions,
) -> Report {
    let started = Instant::now();
    let mut report = Report::new();
    let left_root = normalize_root(left_root);
    let right_root = normalize_root(right_root);

    info!(
        "Starting sync {}:'{}' {} {}:'{}' (run {}, bidirectional={}, dry_run={})",
        left.name(),
        left_root,
        if options.bidirectional { "<->" } else { "->" },
        right.name(),
        right_root,
        report.run_id,
        options.bidirectional,
        options.dry_run
    );
    debug!("Sync options: {:?}", options);

    let roots = futures::join!(
        validate_root(left.as_ref(), Side::Left, &left_root),
        validate_root(right.as_ref(), Side::Right, &right_root),
    );
    if let (Err(e), _) | (_, Err(e)) = roots {
        info!("Sync aborted: {}", e);
        report.global_error = Some(e);
        report.duration = started.elapsed();
        return report;
    }

    let run = RunContext::new(left.as_ref(), right.as_ref(), options);
    report.entries = sync_entry(&run, PairContext::root(left_root, right_root)).await;
    report.duration = started.elapsed();

    let stats = report.stats();
    info!(
        "Sync completed in {:?}: {} created, {} updated, {} metadata, {} removed, {} kept, {} errors, {} bytes",
        report.duration,
        stats.created,
        stats.content_updated,
        stats.metadata_updated,
        stats.removed,
        stats.kept,
        stats.errors,
        stats.bytes
    );
    report
}

/// Roots are namespace paths without a leading separator
fn normalize_root(root: &str) -> String {
    let root = root.trim().trim_start_matches('/');
    if root.is_empty() || root.ends_with('/') {
        root.to_string()
    } else {
        format!("{}/", root)
    }
}

async fn validate_root(store: &dyn Store, side: Side, root: &str) -> Result<()> {
    match store.get_meta(root, false).await {
        Ok(Some(meta)) if meta.is_namespace => Ok(()),
        Ok(Some(_)) => Err(Error::invalid_root(side, root, "not a namespace")),
        Ok(None) => Err(Error::invalid_root(side, root, "does not exist")),
        Err(e) => Err(Error::invalid_root(side, root, e.to_string())),
    }
}
