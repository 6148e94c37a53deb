//! Dependency closure over a set of rules.

use std::collections::BTreeSet;

use kiln_store::EntryKey;

use crate::rule::BuildRule;

/// Returns `seed` plus every entry transitively stale because of it.
///
/// Terminates because rules only map an id to the same id in a finite set
/// of roots and content types.
pub fn dependency_closure(
    rules: &[BuildRule],
    seed: impl IntoIterator<Item = EntryKey>,
) -> BTreeSet<EntryKey> {
    let mut affected: BTreeSet<EntryKey> = seed.into_iter().collect();
    let mut work: Vec<EntryKey> = affected.iter().cloned().collect();
    while let Some(key) = work.pop() {
        for rule in rules {
            if let Some(dependent) = rule.dependents_of(&key) {
                if affected.insert(dependent.clone()) {
                    work.push(dependent);
                }
            }
        }
    }
    affected
}

/// Returns the entries in `affected` that some rule produces from another
/// entry of `affected`.
pub(crate) fn produced(rules: &[BuildRule], affected: &BTreeSet<EntryKey>) -> BTreeSet<EntryKey> {
    affected
        .iter()
        .flat_map(|key| rules.iter().filter_map(move |r| r.dependents_of(key)))
        .collect()
}
