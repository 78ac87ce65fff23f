//! Minimal write/delete set between the marshalled state of an object and
//! the last state known to be persisted.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use super::kv::is_dir;
use super::kv::KvPair;

/// Serialized form of an absent value; never written as a file.
pub(crate) const NULL_VALUE: &str = "null";

/// Mapping from storage path to the value last known to be durably stored.
pub type PersistedKeys = BTreeMap<String, String>;

/// Pending backend mutations. A delete is carried as a pair with an empty
/// value, matching the backend's "empty payload removes" contract.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub writes: Vec<KvPair>,
    pub deletes: Vec<KvPair>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len() + self.deletes.len()
    }

    /// Writes first, then deletes.
    pub fn into_pairs(self) -> impl Iterator<Item = KvPair> {
        self.writes.into_iter().chain(self.deletes)
    }
}

/// Computes the change set taking `cache` to `current`.
///
/// Directory keys are structural and never scheduled. A current value of
/// `null` counts as absent: it deletes a cached key and writes nothing.
pub fn diff(
    current: &[KvPair],
    cache: &PersistedKeys,
) -> ChangeSet {
    let mut changes = ChangeSet::default();
    let mut present = BTreeSet::new();

    for pair in current {
        if is_dir(&pair.key) || pair.is_empty() || pair.value == NULL_VALUE {
            continue;
        }
        present.insert(pair.key.as_str());
        if cache.get(&pair.key) != Some(&pair.value) {
            changes.writes.push(pair.clone());
        }
    }

    for key in cache.keys() {
        if !is_dir(key) && !present.contains(key.as_str()) {
            changes.deletes.push(KvPair::new(key.as_str(), ""));
        }
    }

    changes
}

/// Records one successfully applied mutation.
pub(crate) fn apply_to_cache(
    cache: &mut PersistedKeys,
    pair: &KvPair,
) {
    if pair.is_empty() {
        cache.remove(&pair.key);
    } else {
        cache.insert(pair.key.clone(), pair.value.clone());
    }
}
