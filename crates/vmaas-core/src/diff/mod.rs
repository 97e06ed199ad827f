//! Change-set computation between two versions of a map or named collection
//!
//! Both functions are pure: no I/O, no errors. Malformed input (a collection
//! entry without a `name`) must already have been reported through the
//! deferred errors of [`ResourceData`](crate::data::ResourceData).

use serde_json::Value;
use std::collections::BTreeMap;

use crate::data::Entry;

/// Identity given to a collection entry that has no previous counterpart.
///
/// Remote identities are positive, so this never collides with a real one.
pub const NEW_ENTITY_ID: i64 = -1;

/// Fields copied from the matching previous entry of a named collection
pub const CARRIED_FIELDS: &[&str] = &["id", "size"];

/// Additions and removals needed to move a map from one version to the next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapChanges<V> {
    /// Every entry of the new map. The remote API treats each one as an
    /// add-or-overwrite, so unchanged entries are included.
    pub additions: BTreeMap<String, V>,
    /// Entries whose name is in the previous map but not in the new one
    pub removals: BTreeMap<String, V>,
}

impl<V> MapChanges<V> {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// Diff two maps by name.
///
/// Removals are decided by key membership only; values are not compared.
pub fn compare_maps<V: Clone>(
    previous: &BTreeMap<String, V>,
    new: &BTreeMap<String, V>,
) -> MapChanges<V> {
    let removals = previous
        .iter()
        .filter(|(name, _)| !new.contains_key(*name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    MapChanges {
        additions: new.clone(),
        removals,
    }
}

/// Annotate each entry of `new` with the identity of its previous version.
///
/// For every new entry, by position, the first previous entry with the same
/// `name` donates its [`CARRIED_FIELDS`]; an entry with no match gets
/// `id = NEW_ENTITY_ID`. Names are expected to be unique within each
/// version: with duplicates the first match wins. An entry without a string
/// `name` never matches.
///
/// The carried `size` overrides a newly declared size. Callers that need the
/// declared size read it from the declaration, not from this result.
pub fn compare_named_collections(previous: &[Entry], new: Vec<Entry>) -> Vec<Entry> {
    new.into_iter()
        .map(|mut entry| {
            let matched = entry_name(&entry)
                .and_then(|name| previous.iter().find(|p| entry_name(p) == Some(name)));

            match matched {
                Some(prev) => {
                    for field in CARRIED_FIELDS {
                        if let Some(value) = prev.get(*field) {
                            entry.insert((*field).to_owned(), value.clone());
                        }
                    }
                }
                None => {
                    entry.insert("id".to_owned(), Value::from(NEW_ENTITY_ID));
                }
            }
            entry
        })
        .collect()
}

fn entry_name(entry: &Entry) -> Option<&str> {
    entry.get("name").and_then(Value::as_str)
}
