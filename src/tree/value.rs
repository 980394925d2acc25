//! The JSON-compatible value tree that forms are snapshotted into.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use super::dates::format_iso_date_time;

/// Ordered mapping from field name to subtree.
pub type TreeMap = IndexMap<String, Tree>;

static NULL: Tree = Tree::Null;

/// A JSON-compatible value with an opaque date leaf.
///
/// Containers are reference counted so that copies can share (or refuse to
/// share) their allocation; see [`deep_copy`](super::deep_copy). Writes go
/// through copy-on-write accessors, so a shared container is never mutated
/// behind another tree's back.
#[derive(Clone)]
pub enum Tree {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// Date-like leaf. Never decomposed into a mapping.
    Date(DateTime<Utc>),
    Array(Arc<Vec<Tree>>),
    Object(Arc<TreeMap>),
}

impl Tree {
    /// An empty mapping.
    pub fn object() -> Self {
        Tree::Object(Arc::new(TreeMap::new()))
    }

    /// An empty sequence.
    pub fn array() -> Self {
        Tree::Array(Arc::new(Vec::new()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Tree::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Tree::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Tree::Array(_))
    }

    /// True for objects and arrays (JavaScript's `typeof x === "object"`
    /// minus null and dates).
    pub fn is_container(&self) -> bool {
        matches!(self, Tree::Object(_) | Tree::Array(_))
    }

    /// True for an object with at least one key or a non-empty array.
    pub fn is_non_empty_container(&self) -> bool {
        match self {
            Tree::Object(map) => !map.is_empty(),
            Tree::Array(items) => !items.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tree::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Tree::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&TreeMap> {
        match self {
            Tree::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Tree]> {
        match self {
            Tree::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Mutable access to a mapping, cloning it first if it is shared.
    pub fn as_object_mut(&mut self) -> Option<&mut TreeMap> {
        match self {
            Tree::Object(map) => Some(Arc::make_mut(map)),
            _ => None,
        }
    }

    /// Mutable access to a sequence, cloning it first if it is shared.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Tree>> {
        match self {
            Tree::Array(items) => Some(Arc::make_mut(items)),
            _ => None,
        }
    }

    /// Look up a key of a mapping.
    pub fn get(&self, key: &str) -> Option<&Tree> {
        self.as_object().and_then(|map| map.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert into a mapping. No-op on non-objects.
    pub fn insert(&mut self, key: impl Into<String>, value: Tree) {
        if let Some(map) = self.as_object_mut() {
            map.insert(key.into(), value);
        }
    }

    /// Remove a key from a mapping, keeping the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<Tree> {
        self.as_object_mut().and_then(|map| map.shift_remove(key))
    }

    /// Whether both values point at the same container allocation.
    pub fn shares_container(&self, other: &Tree) -> bool {
        match (self, other) {
            (Tree::Object(a), Tree::Object(b)) => Arc::ptr_eq(a, b),
            (Tree::Array(a), Tree::Array(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Whether JavaScript would consider this value falsy.
    pub fn is_falsy(&self) -> bool {
        match self {
            Tree::Null => true,
            Tree::Bool(b) => !b,
            Tree::Number(n) => n.as_f64().map_or(false, |f| f == 0.0 || f.is_nan()),
            Tree::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Convert into a `serde_json::Value`. Dates become ISO-8601 strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Tree::Null => serde_json::Value::Null,
            Tree::Bool(b) => serde_json::Value::Bool(*b),
            Tree::Number(n) => serde_json::Value::Number(n.clone()),
            Tree::String(s) => serde_json::Value::String(s.clone()),
            Tree::Date(d) => serde_json::Value::String(format_iso_date_time(d)),
            Tree::Array(items) => {
                serde_json::Value::Array(items.iter().map(Tree::to_json).collect())
            }
            Tree::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Tree::Null
    }
}

/// Numeric equality across integer and float representations.
pub(crate) fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    a.as_f64() == b.as_f64()
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Tree::Null, Tree::Null) => true,
            (Tree::Bool(a), Tree::Bool(b)) => a == b,
            (Tree::Number(a), Tree::Number(b)) => numbers_equal(a, b),
            (Tree::String(a), Tree::String(b)) => a == b,
            (Tree::Date(a), Tree::Date(b)) => a == b,
            (Tree::Array(a), Tree::Array(b)) => Arc::ptr_eq(a, b) || a == b,
            (Tree::Object(a), Tree::Object(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tree::Null => write!(f, "null"),
            Tree::Bool(b) => write!(f, "{}", b),
            Tree::Number(n) => write!(f, "{}", n),
            Tree::String(s) => write!(f, "{:?}", s),
            Tree::Date(d) => write!(f, "Date({})", format_iso_date_time(d)),
            Tree::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Tree::Object(map) => f.debug_map().entries(map.iter()).finish(),
        }
    }
}

impl Index<&str> for Tree {
    type Output = Tree;

    fn index(&self, key: &str) -> &Tree {
        self.get(key).unwrap_or(&NULL)
    }
}

impl Index<usize> for Tree {
    type Output = Tree;

    fn index(&self, index: usize) -> &Tree {
        self.as_array()
            .and_then(|items| items.get(index))
            .unwrap_or(&NULL)
    }
}

impl From<serde_json::Value> for Tree {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Tree::Null,
            serde_json::Value::Bool(b) => Tree::Bool(b),
            serde_json::Value::Number(n) => Tree::Number(n),
            serde_json::Value::String(s) => Tree::String(s),
            serde_json::Value::Array(items) => {
                Tree::Array(Arc::new(items.into_iter().map(Tree::from).collect()))
            }
            serde_json::Value::Object(map) => Tree::Object(Arc::new(
                map.into_iter().map(|(k, v)| (k, Tree::from(v))).collect(),
            )),
        }
    }
}

impl From<&str> for Tree {
    fn from(s: &str) -> Self {
        Tree::String(s.to_string())
    }
}

impl From<String> for Tree {
    fn from(s: String) -> Self {
        Tree::String(s)
    }
}

impl From<bool> for Tree {
    fn from(b: bool) -> Self {
        Tree::Bool(b)
    }
}

impl From<i64> for Tree {
    fn from(n: i64) -> Self {
        Tree::Number(n.into())
    }
}

impl From<i32> for Tree {
    fn from(n: i32) -> Self {
        Tree::Number(n.into())
    }
}

impl From<DateTime<Utc>> for Tree {
    fn from(d: DateTime<Utc>) -> Self {
        Tree::Date(d)
    }
}

impl From<Vec<Tree>> for Tree {
    fn from(items: Vec<Tree>) -> Self {
        Tree::Array(Arc::new(items))
    }
}

impl From<TreeMap> for Tree {
    fn from(map: TreeMap) -> Self {
        Tree::Object(Arc::new(map))
    }
}

impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Tree::Null => serializer.serialize_unit(),
            Tree::Bool(b) => serializer.serialize_bool(*b),
            Tree::Number(n) => n.serialize(serializer),
            Tree::String(s) => serializer.serialize_str(s),
            Tree::Date(d) => serializer.serialize_str(&format_iso_date_time(d)),
            Tree::Array(items) => serializer.collect_seq(items.iter()),
            Tree::Object(map) => serializer.collect_map(map.iter()),
        }
    }
}

impl<'de> Deserialize<'de> for Tree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Tree::from)
    }
}
