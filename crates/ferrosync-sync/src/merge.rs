//! Namespace child merge planning
//!
//! Children are split into names that propagate between sides and names that
//! stay where they are (excluded, or sub-namespaces when not recursing). The
//! latter are never copied or pruned, only preserved in their own side's
//! listing.

use std::collections::BTreeSet;

/// Policy flags that shape a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergePolicy {
    /// Both sides receive each other's children
    pub bidirectional: bool,
    /// Right-only children survive one-way sync
    pub retain_orphans: bool,
}

/// Child name sets computed once per namespace entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergePlan {
    /// Names to recurse into
    pub union: Vec<String>,
    /// Left listing written before descent
    pub left_target: Vec<String>,
    /// Right listing written before descent
    pub right_target_before: Vec<String>,
    /// Right listing written after descent
    pub right_target_after: Vec<String>,
    /// Left listing written after descent (bidirectional only)
    pub left_target_after: Vec<String>,
    /// Right-only names removed after descent
    pub prune: Vec<String>,
    /// Right-only names removed before their left twin of the other kind
    /// (`x` against `x/`) is written
    pub displaced: Vec<String>,
}

impl MergePlan {
    /// Plan the merge of two existing-children listings
    ///
    /// `propagates` decides which names take part in the merge.
    pub fn compute<F>(left: &[String], right: &[String], policy: MergePolicy, propagates: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let (left_moving, left_staying) = split(left, &propagates);
        let (right_moving, right_staying) = split(right, &propagates);

        let left_only: BTreeSet<&str> = left_moving.difference(&right_moving).copied().collect();
        let right_only: BTreeSet<&str> = right_moving.difference(&left_moving).copied().collect();
        let union: BTreeSet<&str> = left_moving.union(&right_moving).copied().collect();

        let mut left_target = left_staying.clone();
        left_target.extend(&left_moving);
        if policy.bidirectional && !policy.retain_orphans {
            left_target.extend(&right_only);
        }

        let mut right_target_before = right_staying.clone();
        right_target_before.extend(&right_moving);
        right_target_before.extend(&left_only);

        let mut right_target_after = right_staying.clone();
        right_target_after.extend(&left_moving);
        let (displaced, prune) = if policy.retain_orphans || policy.bidirectional {
            right_target_after.extend(&right_only);
            (BTreeSet::new(), BTreeSet::new())
        } else {
            right_only
                .into_iter()
                .partition(|name| left_moving.contains(twin(name).as_str()))
        };

        let left_target_after = if policy.bidirectional {
            let mut after = left_staying;
            after.extend(&union);
            after
        } else {
            BTreeSet::new()
        };

        Self {
            union: owned(union),
            left_target: owned(left_target),
            right_target_before: owned(right_target_before),
            right_target_after: owned(right_target_after),
            left_target_after: owned(left_target_after),
            prune: owned(prune),
            displaced: owned(displaced),
        }
    }
}

/// The same name as the other kind of entry
fn twin(name: &str) -> String {
    match name.strip_suffix('/') {
        Some(leaf) => leaf.to_string(),
        None => format!("{name}/"),
    }
}

fn split<'a, F>(names: &'a [String], propagates: &F) -> (BTreeSet<&'a str>, BTreeSet<&'a str>)
where
    F: Fn(&str) -> bool,
{
    names
        .iter()
        .map(String::as_str)
        .partition(|name| propagates(name))
}

fn owned(names: BTreeSet<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    const ONE_WAY: MergePolicy = MergePolicy {
        bidirectional: false,
        retain_orphans: false,
    };

    #[test]
    fn test_one_way_prunes_right_only() {
        let plan = MergePlan::compute(
            &names(&["a", "both"]),
            &names(&["both", "orphan"]),
            ONE_WAY,
            |_| true,
        );
        assert_eq!(plan.union, names(&["a", "both", "orphan"]));
        assert_eq!(plan.right_target_before, names(&["a", "both", "orphan"]));
        assert_eq!(plan.right_target_after, names(&["a", "both"]));
        assert_eq!(plan.prune, names(&["orphan"]));
        assert!(plan.left_target_after.is_empty());
    }

    #[test]
    fn test_retain_keeps_right_only() {
        let policy = MergePolicy {
            bidirectional: false,
            retain_orphans: true,
        };
        let plan = MergePlan::compute(&names(&["a"]), &names(&["orphan"]), policy, |_| true);
        assert_eq!(plan.right_target_after, names(&["a", "orphan"]));
        assert!(plan.prune.is_empty());
        assert_eq!(plan.left_target, names(&["a"]));
    }

    #[test]
    fn test_bidirectional_materializes_right_only_on_left() {
        let policy = MergePolicy {
            bidirectional: true,
            retain_orphans: false,
        };
        let plan = MergePlan::compute(&names(&["a"]), &names(&["b"]), policy, |_| true);
        assert_eq!(plan.left_target, names(&["a", "b"]));
        assert_eq!(plan.left_target_after, names(&["a", "b"]));
        assert_eq!(plan.right_target_after, names(&["a", "b"]));
        assert!(plan.prune.is_empty());
    }

    #[test]
    fn test_staying_names_are_preserved_not_propagated() {
        let plan = MergePlan::compute(
            &names(&["a", "skip.tmp"]),
            &names(&["other.tmp"]),
            ONE_WAY,
            |name| !name.ends_with(".tmp"),
        );
        assert_eq!(plan.union, names(&["a"]));
        assert_eq!(plan.right_target_after, names(&["a", "other.tmp"]));
        assert!(plan.prune.is_empty());
        assert!(!plan.right_target_before.contains(&"skip.tmp".to_string()));
    }

    #[test]
    fn test_type_twin_is_displaced_not_pruned() {
        let plan = MergePlan::compute(
            &names(&["x", "y/"]),
            &names(&["x/", "y", "z"]),
            ONE_WAY,
            |_| true,
        );
        assert_eq!(plan.displaced, names(&["x/", "y"]));
        assert_eq!(plan.prune, names(&["z"]));
        assert_eq!(plan.right_target_after, names(&["x", "y/"]));
        assert_eq!(plan.union, names(&["x", "x/", "y", "y/", "z"]));
    }

    #[test]
    fn test_retain_never_displaces() {
        let policy = MergePolicy {
            bidirectional: false,
            retain_orphans: true,
        };
        let plan = MergePlan::compute(&names(&["x"]), &names(&["x/"]), policy, |_| true);
        assert!(plan.displaced.is_empty());
        assert_eq!(plan.right_target_after, names(&["x", "x/"]));
    }

    fn listing() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::btree_set("[a-e]{1,2}/?", 0..8)
            .prop_map(|set| set.into_iter().collect())
    }

    fn policy() -> impl Strategy<Value = MergePolicy> {
        (any::<bool>(), any::<bool>()).prop_map(|(bidirectional, retain_orphans)| MergePolicy {
            bidirectional,
            retain_orphans,
        })
    }

    proptest! {
        #[test]
        fn prop_union_is_complete(left in listing(), right in listing(), policy in policy()) {
            let plan = MergePlan::compute(&left, &right, policy, |_| true);
            let expected: BTreeSet<&String> = left.iter().chain(right.iter()).collect();
            let actual: BTreeSet<&String> = plan.union.iter().collect();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn prop_right_after_and_prune_partition_union(left in listing(), right in listing(), policy in policy()) {
            let plan = MergePlan::compute(&left, &right, policy, |_| true);
            let after: BTreeSet<&String> = plan.right_target_after.iter().collect();
            let prune: BTreeSet<&String> = plan.prune.iter().chain(plan.displaced.iter()).collect();
            prop_assert!(after.is_disjoint(&prune));
            let covered: BTreeSet<&String> = after.union(&prune).copied().collect();
            let union: BTreeSet<&String> = plan.union.iter().collect();
            prop_assert_eq!(covered, union);
            if policy.retain_orphans || policy.bidirectional {
                prop_assert!(plan.prune.is_empty());
                prop_assert!(plan.displaced.is_empty());
            }
            for name in &plan.displaced {
                prop_assert!(!plan.prune.contains(name));
            }
        }

        #[test]
        fn prop_right_before_covers_both_sides(left in listing(), right in listing(), policy in policy()) {
            let plan = MergePlan::compute(&left, &right, policy, |_| true);
            for name in left.iter().chain(right.iter()) {
                prop_assert!(plan.right_target_before.contains(name));
            }
        }
    }
}
