//! Diff engine: the minimal membership changes between two id sets.

use std::collections::BTreeSet;

/// `to_add = desired - current`, `to_remove = current - desired`.
///
/// Callers apply additions before removals, so an interrupted diff never
/// leaves the entity with fewer members than either endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDiff<T: Ord> {
    pub to_add: BTreeSet<T>,
    pub to_remove: BTreeSet<T>,
}

impl<T: Ord + Copy> RelationDiff<T> {
    pub fn between(current: &BTreeSet<T>, desired: &BTreeSet<T>) -> Self {
        Self {
            to_add: desired.difference(current).copied().collect(),
            to_remove: current.difference(desired).copied().collect(),
        }
    }

    /// Only the additions needed to reach `current ∪ wanted`.
    pub fn additions(current: &BTreeSet<T>, wanted: &BTreeSet<T>) -> Self {
        Self {
            to_add: wanted.difference(current).copied().collect(),
            to_remove: BTreeSet::new(),
        }
    }

    /// Only the removals needed to reach `current - unwanted`.
    pub fn removals(current: &BTreeSet<T>, unwanted: &BTreeSet<T>) -> Self {
        Self {
            to_add: BTreeSet::new(),
            to_remove: current.intersection(unwanted).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// The set after applying this diff to `current`.
    pub fn apply(&self, current: &BTreeSet<T>) -> BTreeSet<T> {
        current
            .iter()
            .chain(self.to_add.iter())
            .filter(|id| !self.to_remove.contains(id))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn set(ids: &[u64]) -> BTreeSet<u64> {
        ids.iter().copied().collect()
    }

    #[rstest]
    #[case(&[], &[])]
    #[case(&[1, 2, 3], &[])]
    #[case(&[], &[4, 5])]
    #[case(&[1, 2, 3], &[2, 3, 4])]
    #[case(&[1, 2], &[1, 2])]
    #[case(&[7], &[8, 9, 10])]
    fn applying_the_diff_reaches_desired(#[case] current: &[u64], #[case] desired: &[u64]) {
        let (current, desired) = (set(current), set(desired));
        let diff = RelationDiff::between(&current, &desired);

        assert_eq!(diff.apply(&current), desired);
        assert!(diff.to_add.is_disjoint(&diff.to_remove));
        assert!(diff.to_add.is_disjoint(&current));
        assert!(diff.to_remove.is_subset(&current));
    }

    #[test]
    fn identical_sets_produce_no_operations() {
        let s = set(&[3, 1, 2]);
        assert!(RelationDiff::between(&s, &s).is_empty());
    }

    #[test]
    fn add_and_remove_are_computed_independently() {
        let diff = RelationDiff::between(&set(&[1, 2, 3]), &set(&[2, 3, 4]));
        assert_eq!(diff.to_add, set(&[4]));
        assert_eq!(diff.to_remove, set(&[1]));
    }

    #[test]
    fn one_sided_diffs_skip_noops() {
        let current = set(&[1, 2]);
        assert_eq!(RelationDiff::additions(&current, &set(&[2, 3])).to_add, set(&[3]));
        let removals = RelationDiff::removals(&current, &set(&[2, 9]));
        assert_eq!(removals.to_remove, set(&[2]));
        assert!(removals.to_add.is_empty());
    }
}
