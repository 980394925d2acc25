//! Backup groups persisted as JSON entry lists.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BackupError, Result};
use crate::storage::Storage;
use crate::tree::Tree;
use crate::types::{BackupEntry, BackupId, Timestamp};

/// One element of a stored group list.
///
/// Elements that do not have the entry shape are carried through
/// rewrites untouched and never match an id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Entry(BackupEntry),
    Unreadable(serde_json::Value),
}

impl StoredEntry {
    fn entry(&self) -> Option<&BackupEntry> {
        match self {
            StoredEntry::Entry(entry) => Some(entry),
            StoredEntry::Unreadable(_) => None,
        }
    }

    fn is_id(&self, id: &BackupId) -> bool {
        self.entry().is_some_and(|e| &e.id == id)
    }
}

/// Per-(id, group) backup persistence over a [`Storage`].
///
/// Each group is one storage key holding a JSON array of
/// [`BackupEntry`]. New ids are prepended; saving an existing id replaces
/// the entry where it stands. Storage and parse failures never reach the
/// caller: they are logged and read as "no backup". A single unreadable
/// element of a group is skipped on reads and kept on writes.
pub struct BackupStore<S> {
    storage: S,

    /// Serialises read-modify-write cycles on group lists.
    write_lock: Mutex<()>,
}

impl<S: Storage> BackupStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Whether a backup for `id` exists in `groupname`.
    pub fn exists(&self, id: &BackupId, groupname: &str) -> bool {
        match self.load_group(groupname) {
            Ok(Some(entries)) => entries.iter().any(|e| e.is_id(id)),
            Ok(None) => false,
            Err(err) => {
                warn!(group = groupname, %id, error = %err, "backup lookup failed");
                false
            }
        }
    }

    /// The backup for `id` in `groupname`, if readable.
    pub fn get(&self, id: &BackupId, groupname: &str) -> Option<BackupEntry> {
        match self.load_group(groupname) {
            Ok(Some(entries)) => entries.into_iter().find_map(|e| match e {
                StoredEntry::Entry(entry) if &entry.id == id => Some(entry),
                _ => None,
            }),
            Ok(None) => None,
            Err(err) => {
                warn!(group = groupname, %id, error = %err, "backup read failed");
                None
            }
        }
    }

    /// Persist `data` as the backup for `id`, stamped with the current time.
    pub fn save(&self, id: &BackupId, groupname: &str, data: &Tree) {
        let _lock = self.write_lock.lock();

        let mut entries = match self.load_group(groupname) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(err @ BackupError::MalformedPayload { .. }) => {
                warn!(group = groupname, error = %err, "discarding unreadable backup group");
                Vec::new()
            }
            Err(err) => {
                warn!(group = groupname, %id, error = %err, "backup save skipped");
                return;
            }
        };

        let entry = StoredEntry::Entry(BackupEntry {
            data: data.clone(),
            id: id.clone(),
            created_at: Timestamp::now(),
        });
        match entries.iter().position(|e| e.is_id(id)) {
            Some(index) => entries[index] = entry,
            None => entries.insert(0, entry),
        }

        match self.write_group(groupname, &entries) {
            Ok(()) => debug!(group = groupname, %id, entries = entries.len(), "backup saved"),
            Err(err) => warn!(group = groupname, %id, error = %err, "backup save failed"),
        }
    }

    /// Delete the backup for `id`. Absent groups and ids are a no-op.
    pub fn remove(&self, id: &BackupId, groupname: &str) {
        let _lock = self.write_lock.lock();

        let mut entries = match self.load_group(groupname) {
            Ok(Some(entries)) => entries,
            Ok(None) => return,
            Err(err) => {
                warn!(group = groupname, %id, error = %err, "backup removal skipped");
                return;
            }
        };

        let Some(index) = entries.iter().position(|e| e.is_id(id)) else {
            return;
        };
        entries.remove(index);

        match self.write_group(groupname, &entries) {
            Ok(()) => debug!(group = groupname, %id, "backup removed"),
            Err(err) => warn!(group = groupname, %id, error = %err, "backup removal failed"),
        }
    }

    /// All entries of a group in stored order (empty if unreadable).
    pub fn entries(&self, groupname: &str) -> Vec<BackupEntry> {
        match self.load_group(groupname) {
            Ok(entries) => entries
                .unwrap_or_default()
                .into_iter()
                .filter_map(|e| match e {
                    StoredEntry::Entry(entry) => Some(entry),
                    StoredEntry::Unreadable(_) => None,
                })
                .collect(),
            Err(err) => {
                warn!(group = groupname, error = %err, "backup group read failed");
                Vec::new()
            }
        }
    }

    /// Drop every backup of a group.
    pub fn clear_group(&self, groupname: &str) {
        let _lock = self.write_lock.lock();
        if let Err(err) = self.storage.remove_item(groupname) {
            warn!(group = groupname, error = %err, "backup group clear failed");
        }
    }

    fn load_group(&self, groupname: &str) -> Result<Option<Vec<StoredEntry>>> {
        let Some(payload) = self.storage.get_item(groupname)? else {
            return Ok(None);
        };
        let entries: Vec<StoredEntry> =
            serde_json::from_str(&payload).map_err(|e| BackupError::MalformedPayload {
                key: groupname.to_string(),
                reason: e.to_string(),
            })?;

        let unreadable = entries.iter().filter(|e| e.entry().is_none()).count();
        if unreadable > 0 {
            warn!(group = groupname, unreadable, "skipping malformed backup entries");
        }
        Ok(Some(entries))
    }

    fn write_group(&self, groupname: &str, entries: &[StoredEntry]) -> Result<()> {
        let payload = serde_json::to_string(entries)?;
        self.storage.set_item(groupname, &payload)
    }
}
