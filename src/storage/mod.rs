//! Synchronous key-value persistence backends.
//!
//! Backups are written through the [`Storage`] trait, the same
//! `getItem`/`setItem` surface a browser's local storage offers. Every call
//! may fail; callers decide whether a failure matters.

mod file;
mod memory;

use std::sync::Arc;

use crate::error::Result;

pub use file::{FileStorage, FileStorageConfig};
pub use memory::MemoryStorage;

/// Synchronous string key-value store.
pub trait Storage: Send + Sync {
    /// Value stored under `key`, or `None` if the key is absent.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Absent keys are not an error.
    fn remove_item(&self, key: &str) -> Result<()>;
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        (**self).remove_item(key)
    }
}
