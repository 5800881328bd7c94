//! Pair context: decision function, child derivation and writes

use crate::merge::{MergePlan, MergePolicy};
use crate::options::SyncOptions;
use crate::pool::TaskGroup;
use crate::report::{Direction, Outcome, ReportEntry};
use crate::side::SideContext;
use crate::traversal::RunContext;
use ferrosync_types::{
    acl_eq, is_namespace_path, join_path, namespace_checksum, AclEntry, EntryMeta, Error, Result,
    Side, Store,
};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Outcome and direction chosen for one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Decision {
    /// What happens to the entry
    pub outcome: Outcome,
    /// Which side is authoritative
    pub direction: Direction,
}

/// Decide an entry's fate from the metadata already fetched for both sides
///
/// Performs no I/O. In bidirectional mode the direction flips to right-to-left
/// only when right's mtime is strictly greater.
pub fn decide(left: Option<&EntryMeta>, right: Option<&EntryMeta>, options: &SyncOptions) -> Decision {
    match (left, right) {
        (Some(left), Some(right)) => {
            let direction = if options.bidirectional && right.mtime > left.mtime {
                Direction::RightToLeft
            } else {
                Direction::LeftToRight
            };
            let content_differs = !left.same_content(right) || left.symlink != right.symlink;
            let outcome = if content_differs {
                Outcome::ContentUpdated
            } else if left.mtime != right.mtime || !same_acl(left, right, options) {
                Outcome::MetadataUpdated
            } else {
                Outcome::Unchanged
            };
            Decision { outcome, direction }
        }
        (None, Some(_)) if options.bidirectional => Decision {
            outcome: Outcome::Created,
            direction: Direction::RightToLeft,
        },
        (None, Some(_)) if options.retain_orphans => Decision {
            outcome: Outcome::Kept,
            direction: Direction::LeftToRight,
        },
        (None, Some(_)) => Decision {
            outcome: Outcome::Removed,
            direction: Direction::LeftToRight,
        },
        (Some(_), None) => Decision {
            outcome: Outcome::Created,
            direction: Direction::LeftToRight,
        },
        (None, None) => Decision::default(),
    }
}

fn same_acl(left: &EntryMeta, right: &EntryMeta, options: &SyncOptions) -> bool {
    if options.ignore_acl {
        return true;
    }
    let mapped = options.acl_map.remap(&left.acl, Direction::LeftToRight);
    acl_eq(&mapped, &right.acl)
}

/// Both sides of one tree position plus the scratch data computed for it
#[derive(Debug, Clone)]
pub struct PairContext {
    /// Left side
    pub left: SideContext,
    /// Right side
    pub right: SideContext,
    /// Path relative to both roots
    pub relative: String,
    /// Failure of an ancestor that short-circuits this entry
    pub inherited: Option<Error>,
    decision: Decision,
    plan: Option<MergePlan>,
}

impl PairContext {
    /// Context for the two roots, both known to exist
    pub fn root<L: Into<String>, R: Into<String>>(left_root: L, right_root: R) -> Self {
        Self::new(
            SideContext::new(Side::Left, left_root, true),
            SideContext::new(Side::Right, right_root, true),
            String::new(),
        )
    }

    fn new(left: SideContext, right: SideContext, relative: String) -> Self {
        Self {
            left,
            right,
            relative,
            inherited: None,
            decision: Decision::default(),
            plan: None,
        }
    }

    /// Derive the context of the child `name`
    pub fn child(&self, name: &str, inherited: Option<Error>) -> Self {
        let mut child = Self::new(
            self.left.child(name),
            self.right.child(name),
            join_path(&self.relative, name),
        );
        child.inherited = inherited;
        child
    }

    /// Whether the position is a namespace
    pub fn is_namespace(&self) -> bool {
        is_namespace_path(&self.relative)
    }

    /// Decision recorded by [`PairContext::decide`]
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// Merge plan recorded by [`PairContext::plan`]
    pub fn merge_plan(&self) -> Option<&MergePlan> {
        self.plan.as_ref()
    }

    /// Report entry with paths filled in and nothing decided yet
    pub fn blank_entry(&self) -> ReportEntry {
        ReportEntry::new(self.left.path(), self.right.path(), self.is_namespace())
    }

    /// Whether a child name takes part in merging and recursion
    pub fn propagates(&self, name: &str, options: &SyncOptions) -> bool {
        if !options.recursive && is_namespace_path(name) {
            return false;
        }
        !options.is_excluded(&join_path(&self.relative, name))
    }

    /// Run the decision function and fill in `entry`
    pub fn decide(&mut self, options: &SyncOptions, entry: &mut ReportEntry) {
        let left = self.left.meta().map(|meta| self.effective(Side::Left, meta, options));
        let right = self.right.meta().map(|meta| self.effective(Side::Right, meta, options));
        let decision = decide(left.as_ref(), right.as_ref(), options);

        if options.bidirectional {
            if let (Some(l), Some(r)) = (&left, &right) {
                if l.mtime == r.mtime && decision.outcome == Outcome::ContentUpdated {
                    warn!(
                        "'{}' differs on both sides with equal mtime {}; keeping left",
                        self.relative, l.mtime
                    );
                }
            }
        }

        if options.trace_path.as_deref().is_some_and(|p| {
            p == self.left.path() || p == self.right.path() || p == self.relative
        }) {
            info!(
                "trace '{}': left={:?} right={:?} outcome={:?} direction={:?}",
                self.relative, left, right, decision.outcome, decision.direction
            );
        }

        debug!(
            "decided '{}': {:?} {}",
            self.relative, decision.outcome, decision.direction
        );

        self.decision = decision;
        entry.outcome = decision.outcome;
        entry.direction = decision.direction;
        entry.bytes = match self.source() {
            Some((_, meta)) if !self.is_namespace() && decision.outcome.copies_content() => meta.size,
            _ => 0,
        };
    }

    /// Namespace checksums cover only the children that propagate
    ///
    /// Right-only children kept by one-way retention are left out of the
    /// right checksum, so a retained orphan never makes its parent differ.
    fn effective(&self, side: Side, meta: &EntryMeta, options: &SyncOptions) -> EntryMeta {
        let mut meta = meta.clone();
        if meta.is_namespace {
            let visible: Vec<String> = meta
                .children
                .iter()
                .filter(|name| self.propagates(name, options))
                .filter(|name| !self.retains_orphan(side, name, options))
                .cloned()
                .collect();
            meta.checksum = Some(namespace_checksum(&visible));
        }
        meta
    }

    fn retains_orphan(&self, side: Side, name: &str, options: &SyncOptions) -> bool {
        side == Side::Right
            && options.retain_orphans
            && !options.bidirectional
            && self.left.children().binary_search_by(|c| c.as_str().cmp(name)).is_err()
    }

    /// Compute and record the child merge of a namespace entry
    pub fn plan(&mut self, options: &SyncOptions) -> &MergePlan {
        let policy = MergePolicy {
            bidirectional: options.bidirectional,
            retain_orphans: options.retain_orphans,
        };
        let plan = MergePlan::compute(
            self.left.children(),
            self.right.children(),
            policy,
            |name| self.propagates(name, options),
        );
        self.plan.insert(plan)
    }

    /// Authoritative side and its metadata
    fn source(&self) -> Option<(Side, &EntryMeta)> {
        let prefer_right = self.decision.direction == Direction::RightToLeft;
        match (self.left.meta(), self.right.meta()) {
            (Some(left), _) if !prefer_right => Some((Side::Left, left)),
            (_, Some(right)) => Some((Side::Right, right)),
            (Some(left), None) => Some((Side::Left, left)),
            (None, None) => None,
        }
    }

    /// ACL to write on `target` given the authoritative side's ACL
    fn acl_for(&self, target: Side, source: Side, acl: &[AclEntry], options: &SyncOptions) -> Vec<AclEntry> {
        if target == source || options.ignore_acl {
            return acl.to_vec();
        }
        let direction = match source {
            Side::Left => Direction::LeftToRight,
            Side::Right => Direction::RightToLeft,
        };
        options.acl_map.remap(acl, direction)
    }

    /// Whether namespace writes apply to this entry at all
    fn writes_namespace(&self, options: &SyncOptions) -> bool {
        !options.dry_run
            && self.is_namespace()
            && !matches!(self.decision.outcome, Outcome::Removed | Outcome::Kept)
            && (self.left.exists() || self.right.exists())
    }

    /// Write namespace metadata before descending
    pub async fn write_before(&mut self, run: &RunContext<'_>) -> Result<()> {
        if !self.writes_namespace(run.options) {
            return Ok(());
        }
        let Some(plan) = self.plan.take() else {
            return Ok(());
        };
        let result = self
            .write_namespaces(run, &plan.left_target, &plan.right_target_before)
            .await;
        self.plan = Some(plan);
        result
    }

    /// Prune and rewrite namespace metadata after every child has returned
    pub async fn write_after(&mut self, run: &RunContext<'_>) -> Result<()> {
        if !self.writes_namespace(run.options) {
            return Ok(());
        }
        let Some(plan) = self.plan.take() else {
            return Ok(());
        };
        let result = self.prune_and_rewrite(run, &plan).await;
        self.plan = Some(plan);
        result
    }

    /// Remove right entries whose name the left uses for the other kind
    ///
    /// Runs once the displaced children have been reported and before the
    /// rest of the namespace is descended into.
    pub async fn remove_displaced(&self, run: &RunContext<'_>) -> Result<()> {
        if !self.writes_namespace(run.options) {
            return Ok(());
        }
        match &self.plan {
            Some(plan) => self.remove_right(run, &plan.displaced).await,
            None => Ok(()),
        }
    }

    async fn prune_and_rewrite(&mut self, run: &RunContext<'_>, plan: &MergePlan) -> Result<()> {
        self.remove_right(run, &plan.prune).await?;
        self.write_namespaces(run, &plan.left_target_after, &plan.right_target_after)
            .await
    }

    async fn remove_right(&self, run: &RunContext<'_>, names: &[String]) -> Result<()> {
        for name in names {
            let path = join_path(self.right.path(), name);
            debug!("removing right '{}'", path);
            run.pool
                .run(TaskGroup::Copy, run.right.remove(&path))
                .await
                .map_err(|e| Error::write(Side::Right, path.clone(), e))?;
        }
        Ok(())
    }

    async fn write_namespaces(
        &mut self,
        run: &RunContext<'_>,
        left_children: &[String],
        right_children: &[String],
    ) -> Result<()> {
        let options = run.options;
        let Some((source, meta)) = self.source() else {
            return Ok(());
        };
        let mtime = meta.mtime;
        let right_acl = self.acl_for(Side::Right, source, &meta.acl, options);
        let left_acl = self.acl_for(Side::Left, source, &meta.acl, options);

        self.right
            .apply_namespace(run.right, &run.pool, mtime, right_children, &right_acl)
            .await?;
        if options.bidirectional {
            self.left
                .apply_namespace(run.left, &run.pool, mtime, left_children, &left_acl)
                .await?;
        }
        Ok(())
    }

    /// Copy a leaf from the authoritative side to the other
    ///
    /// The destination's reported size and checksum are checked against the
    /// source metadata; a mismatch is an integrity error for this entry.
    pub async fn copy_leaf(&self, run: &RunContext<'_>) -> Result<u64> {
        let Some((source, meta)) = self.source() else {
            return Ok(0);
        };
        let (from, to, destination): (&dyn Store, &dyn Store, &SideContext) = match source {
            Side::Left => (run.left, run.right, &self.right),
            Side::Right => (run.right, run.left, &self.left),
        };
        let target = destination.side();
        let dest_path = destination.path().to_string();
        let acl = self.acl_for(target, source, &meta.acl, run.options);
        let source_path = match source {
            Side::Left => self.left.path(),
            Side::Right => self.right.path(),
        };

        if let Some(link) = &meta.symlink {
            debug!("linking {} '{}' -> '{}'", target, dest_path, link);
            run.pool
                .run(
                    TaskGroup::Copy,
                    to.write_symlink(&dest_path, link, meta.mtime, &acl),
                )
                .await
                .map_err(|e| Error::write(target, dest_path.clone(), e))?;
            return Ok(meta.size);
        }

        debug!(
            "copying {} '{}' to {} '{}' ({} bytes)",
            source, source_path, target, dest_path, meta.size
        );
        let summary = run
            .pool
            .run(TaskGroup::Copy, async {
                let mut reader = from.open_reader(source_path).await?;
                let mut sink = to.open_writer(&dest_path, meta.mtime, &acl).await?;
                let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
                loop {
                    let read = reader.read(&mut buffer).await?;
                    if read == 0 {
                        break;
                    }
                    sink.write_chunk(&buffer[..read]).await?;
                }
                sink.close().await
            })
            .await
            .map_err(|e| Error::write(target, dest_path.clone(), e))?;

        let checksum_mismatch = match (&meta.checksum, &summary.checksum) {
            (Some(expected), Some(actual)) => expected != actual,
            _ => false,
        };
        if summary.size != meta.size || checksum_mismatch {
            return Err(Error::Integrity {
                path: dest_path,
                expected_size: meta.size,
                actual_size: summary.size,
                expected_checksum: meta.checksum.clone(),
                actual_checksum: summary.checksum,
            });
        }
        Ok(summary.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn leaf(size: u64, mtime: i64, checksum: &str) -> EntryMeta {
        EntryMeta::leaf("f", size, mtime).with_checksum(checksum)
    }

    #[derive(Clone, Copy)]
    enum Mode {
        OneWay,
        Retain,
        Bidirectional,
    }

    fn options(mode: Mode) -> SyncOptions {
        match mode {
            Mode::OneWay => SyncOptions::mirror(),
            Mode::Retain => SyncOptions::one_way(),
            Mode::Bidirectional => SyncOptions::bidirectional(),
        }
    }

    #[rstest]
    #[case::identical(Some(leaf(3, 10, "aa")), Some(leaf(3, 10, "aa")), Mode::OneWay, Outcome::Unchanged, Direction::LeftToRight)]
    #[case::size_differs(Some(leaf(3, 10, "aa")), Some(leaf(4, 10, "aa")), Mode::OneWay, Outcome::ContentUpdated, Direction::LeftToRight)]
    #[case::checksum_differs(Some(leaf(3, 10, "aa")), Some(leaf(3, 10, "bb")), Mode::OneWay, Outcome::ContentUpdated, Direction::LeftToRight)]
    #[case::mtime_only(Some(leaf(3, 10, "aa")), Some(leaf(3, 20, "aa")), Mode::OneWay, Outcome::MetadataUpdated, Direction::LeftToRight)]
    #[case::right_newer_bidi(Some(leaf(3, 10, "aa")), Some(leaf(3, 20, "bb")), Mode::Bidirectional, Outcome::ContentUpdated, Direction::RightToLeft)]
    #[case::left_newer_bidi(Some(leaf(3, 30, "aa")), Some(leaf(3, 20, "bb")), Mode::Bidirectional, Outcome::ContentUpdated, Direction::LeftToRight)]
    #[case::equal_mtime_bidi(Some(leaf(3, 20, "aa")), Some(leaf(3, 20, "bb")), Mode::Bidirectional, Outcome::ContentUpdated, Direction::LeftToRight)]
    #[case::right_only_removed(None, Some(leaf(3, 10, "aa")), Mode::OneWay, Outcome::Removed, Direction::LeftToRight)]
    #[case::right_only_kept(None, Some(leaf(3, 10, "aa")), Mode::Retain, Outcome::Kept, Direction::LeftToRight)]
    #[case::right_only_bidi(None, Some(leaf(3, 10, "aa")), Mode::Bidirectional, Outcome::Created, Direction::RightToLeft)]
    #[case::left_only(Some(leaf(3, 10, "aa")), None, Mode::OneWay, Outcome::Created, Direction::LeftToRight)]
    #[case::left_only_bidi(Some(leaf(3, 10, "aa")), None, Mode::Bidirectional, Outcome::Created, Direction::LeftToRight)]
    #[case::neither(None, None, Mode::Bidirectional, Outcome::Unchanged, Direction::LeftToRight)]
    fn test_decision_table(
        #[case] left: Option<EntryMeta>,
        #[case] right: Option<EntryMeta>,
        #[case] mode: Mode,
        #[case] outcome: Outcome,
        #[case] direction: Direction,
    ) {
        let decision = decide(left.as_ref(), right.as_ref(), &options(mode));
        assert_eq!(decision.outcome, outcome);
        assert_eq!(decision.direction, direction);
    }

    #[test]
    fn test_checksum_skipped_compares_size_only() {
        let left = EntryMeta::leaf("f", 3, 10);
        let right = EntryMeta::leaf("f", 3, 10);
        let decision = decide(Some(&left), Some(&right), &SyncOptions::new().skip_checksum(true));
        assert_eq!(decision.outcome, Outcome::Unchanged);
    }

    #[test]
    fn test_acl_difference_is_metadata_update() {
        let left = leaf(3, 10, "aa").with_acl(vec![AclEntry::read_write("alice")]);
        let right = leaf(3, 10, "aa").with_acl(vec![AclEntry::read_only("alice")]);

        let decision = decide(Some(&left), Some(&right), &SyncOptions::new());
        assert_eq!(decision.outcome, Outcome::MetadataUpdated);

        let ignored = decide(Some(&left), Some(&right), &SyncOptions::new().ignore_acl(true));
        assert_eq!(ignored.outcome, Outcome::Unchanged);
    }

    #[test]
    fn test_acl_comparison_applies_remap() {
        let left = leaf(3, 10, "aa").with_acl(vec![
            AclEntry::read_write("alice"),
            AclEntry::read_only("bob"),
        ]);
        let right = leaf(3, 10, "aa").with_acl(vec![
            AclEntry::read_only("bob"),
            AclEntry::read_write("alice@remote"),
        ]);
        let options = SyncOptions::new().map_user(Direction::LeftToRight, "alice", "alice@remote");

        assert_eq!(
            decide(Some(&left), Some(&right), &options).outcome,
            Outcome::Unchanged
        );
    }

    #[test]
    fn test_child_paths_and_existence() {
        let pair = PairContext::root("", "backup/");
        let child = pair.child("a.txt", None);
        assert_eq!(child.left.path(), "a.txt");
        assert_eq!(child.right.path(), "backup/a.txt");
        assert_eq!(child.relative, "a.txt");
        assert!(!child.left.exists());
        assert!(!child.right.exists());
    }

    #[test]
    fn test_excluded_and_shallow_names_do_not_propagate() {
        let pair = PairContext::root("", "");
        let options = SyncOptions::new()
            .recursive(false)
            .exclude(["*.tmp"])
            .unwrap();
        assert!(pair.propagates("a.txt", &options));
        assert!(!pair.propagates("b.tmp", &options));
        assert!(!pair.propagates("sub/", &options));
    }
}
