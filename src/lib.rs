//! # Form Backup
//!
//! Keeps unsaved form edits in a local key-value store and reconciles them
//! against a freshly loaded baseline.
//!
//! ## Core Concepts
//!
//! - **Trees**: JSON-like values with date leaves and copy-on-write containers
//! - **Change detection**: Baseline-driven field diff with exclusions and allowlists
//! - **Backups**: Per-(id, group) entries persisted as JSON lists
//! - **Controllers**: Debounced persist/purge decisions and restore on load
//!
//! ## Example
//!
//! ```ignore
//! use form_backup::{BackupConfig, BackupOptions, BackupStateController, BackupStore, MemoryForm, MemoryStorage};
//!
//! let store = Arc::new(BackupStore::new(MemoryStorage::new()));
//! let mut controller = BackupStateController::new(
//!     store,
//!     MemoryForm::new(Tree::from(json!({"name": "Ann"}))),
//!     BackupOptions::new("users").edit(7),
//!     BackupConfig::default(),
//! );
//!
//! controller.schedule_load(Tree::from(json!({"name": "Ann"})), Instant::now());
//!
//! // Event loop
//! controller.notify_edit(Instant::now());
//! controller.tick(Instant::now());
//! ```

pub mod backups;
pub mod controller;
pub mod diff;
pub mod error;
pub mod storage;
pub mod subscriptions;
pub mod tree;
pub mod types;

// Re-exports
pub use backups::BackupStore;
pub use controller::{
    BackupConfig, BackupOptions, BackupStateController, Debouncer, FormArrayReconciliation,
    FormHandle, FormState, MemoryForm,
};
pub use diff::{
    check_differences, ChangeDetector, ChangeReport, CharDiffer, Delta, DeltaMap, DiffConfig,
    Explanation, ObjectDiffer, StructuralDiffer, TextChange, TextChangeKind, TextDiffer,
};
pub use error::{BackupError, Result};
pub use storage::{FileStorage, FileStorageConfig, MemoryStorage, Storage};
pub use subscriptions::{
    BackupChange, BackupEvent, DropReason, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
pub use tree::{deep_copy, revive_dates, try_deep_copy, Tree, TreeMap};
pub use types::*;
