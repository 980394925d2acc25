//! Key-path difference between two trees.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::tree::{deep_copy, Tree};

/// Per-key differences of two containers.
pub type DeltaMap = IndexMap<String, Delta>;

/// What changed at one position of the tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Delta {
    /// Present in the original, gone from the update.
    Removed,
    /// Replaced outright: the two sides are not both containers, or one of
    /// them is a date. Carries the updated value.
    Value(Tree),
    /// Both sides are containers; only the differing keys are listed.
    Nested(DeltaMap),
}

impl Delta {
    pub fn as_value(&self) -> Option<&Tree> {
        match self {
            Delta::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&DeltaMap> {
        match self {
            Delta::Nested(map) => Some(map),
            _ => None,
        }
    }

    /// Copy with every carried value deep-copied, so the delta no longer
    /// shares containers with the trees it was computed from.
    pub fn detach(&self) -> Delta {
        match self {
            Delta::Removed => Delta::Removed,
            Delta::Value(v) => Delta::Value(deep_copy(v)),
            Delta::Nested(map) => Delta::Nested(
                map.iter()
                    .map(|(k, d)| (k.clone(), d.detach()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Delta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Delta::Removed => serializer.serialize_unit(),
            Delta::Value(v) => v.serialize(serializer),
            Delta::Nested(map) => serializer.collect_map(map.iter()),
        }
    }
}

/// Capability: minimal key-path difference between two trees.
pub trait StructuralDiffer {
    /// `None` iff the two trees are structurally equal.
    fn diff(&self, original: &Tree, updated: &Tree) -> Option<Delta>;
}

/// Recursive object differ.
///
/// Arrays are compared as objects keyed by index. Keys only in the
/// original become [`Delta::Removed`]; keys only in the update carry the
/// updated value; dates compare by instant.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectDiffer;

impl StructuralDiffer for ObjectDiffer {
    fn diff(&self, original: &Tree, updated: &Tree) -> Option<Delta> {
        diff_at(original, updated)
    }
}

fn diff_at(lhs: &Tree, rhs: &Tree) -> Option<Delta> {
    if lhs.shares_container(rhs) {
        return None;
    }

    match (lhs, rhs) {
        (Tree::Date(a), Tree::Date(b)) => (a != b).then(|| Delta::Value(rhs.clone())),
        (Tree::Date(_), _) | (_, Tree::Date(_)) => Some(Delta::Value(rhs.clone())),
        _ if lhs.is_container() && rhs.is_container() => {
            let delta = diff_containers(lhs, rhs);
            (!delta.is_empty()).then_some(Delta::Nested(delta))
        }
        _ => (lhs != rhs).then(|| Delta::Value(rhs.clone())),
    }
}

fn diff_containers(lhs: &Tree, rhs: &Tree) -> DeltaMap {
    let mut delta = DeltaMap::new();

    for (key, _) in entries(lhs) {
        if child(rhs, &key).is_none() {
            delta.insert(key, Delta::Removed);
        }
    }

    for (key, right) in entries(rhs) {
        match child(lhs, &key) {
            None => {
                delta.insert(key, Delta::Value(right.clone()));
            }
            Some(left) => {
                if let Some(d) = diff_at(left, right) {
                    delta.insert(key, d);
                }
            }
        }
    }

    delta
}

fn entries(tree: &Tree) -> Vec<(String, &Tree)> {
    match tree {
        Tree::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Tree::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}

fn child<'a>(tree: &'a Tree, key: &str) -> Option<&'a Tree> {
    match tree {
        Tree::Object(map) => map.get(key),
        Tree::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}
