//! Persisted backup groups.
//!
//! A group is one storage key, usually one form type, holding the unsaved
//! state of every form instance of that type:
//!
//! ```text
//! "users" -> [{"data": {...}, "id": 7, "createdAt": 1700000000000}, ...]
//! ```

mod store;

pub use store::BackupStore;
