//! Core types for persisted backups.

use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::BTreeMap;
use std::fmt;

use crate::tree::{numbers_equal, Tree};

/// Identity of a backup within its group.
///
/// Text and numeric ids never match each other: `"1"` and `1` are
/// different backups. Numeric ids keep whatever JSON number was stored,
/// fractional or wide, and compare by value (`1` equals `1.0`).
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackupId {
    Number(Number),
    Text(String),
}

impl BackupId {
    /// Whether a field value of a form row names this id.
    pub fn matches(&self, value: &Tree) -> bool {
        match (self, value) {
            (BackupId::Text(s), Tree::String(v)) => s == v,
            (BackupId::Number(n), Tree::Number(v)) => numbers_equal(n, v),
            _ => false,
        }
    }

    /// Read an id out of a form field value.
    pub fn from_tree(value: &Tree) -> Option<Self> {
        match value {
            Tree::String(s) => Some(BackupId::Text(s.clone())),
            Tree::Number(n) => Some(BackupId::Number(n.clone())),
            _ => None,
        }
    }

    /// Numeric zero, in any representation.
    pub fn is_zero(&self) -> bool {
        matches!(self, BackupId::Number(n) if n.as_f64() == Some(0.0))
    }
}

impl PartialEq for BackupId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BackupId::Number(a), BackupId::Number(b)) => numbers_equal(a, b),
            (BackupId::Text(a), BackupId::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for BackupId {}

impl fmt::Debug for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupId::Number(n) => write!(f, "BackupId({})", n),
            BackupId::Text(s) => write!(f, "BackupId({:?})", s),
        }
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupId::Number(n) => write!(f, "{}", n),
            BackupId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for BackupId {
    fn from(s: &str) -> Self {
        BackupId::Text(s.to_string())
    }
}

impl From<String> for BackupId {
    fn from(s: String) -> Self {
        BackupId::Text(s)
    }
}

impl From<i64> for BackupId {
    fn from(n: i64) -> Self {
        BackupId::Number(n.into())
    }
}

impl From<i32> for BackupId {
    fn from(n: i32) -> Self {
        BackupId::Number(n.into())
    }
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        Timestamp(chrono::Utc::now().timestamp_millis())
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// One persisted backup: `{"data": .., "id": .., "createdAt": ..}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub data: Tree,
    pub id: BackupId,
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
}

/// Derived per-row state of a repeating form section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormArrayState {
    pub exists_backup: bool,
    pub can_save_form: bool,
}

impl FormArrayState {
    pub fn new(exists_backup: bool, can_save_form: bool) -> Self {
        Self {
            exists_backup,
            can_save_form,
        }
    }
}

/// Row index -> state, recomputed on every reconciliation pass.
pub type FormArrayStates = BTreeMap<usize, FormArrayState>;
