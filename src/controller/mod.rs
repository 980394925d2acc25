//! Binding between a form and its backup.
//!
//! A [`BackupStateController`] owns one form through a [`FormHandle`] and
//! drives its backup through a session:
//!
//! ```text
//! schedule_load ──(load_delay)──> set baseline, restore or drop backup
//!                                          │
//! notify_edit ──(debounce)──> tick ──> diff vs baseline ──> save | purge
//!                                          │
//! save() / end_session() ─────────────────-┘
//! ```
//!
//! Form groups keep one backup per record. Array sections keep one backup
//! holding every row that differs from its baseline row, and report a
//! [`FormArrayState`](crate::FormArrayState) for each row.

mod backup;
mod config;
mod debounce;
mod form;

pub use backup::{BackupStateController, FormArrayReconciliation, FormState};
pub use config::{BackupConfig, BackupOptions};
pub use debounce::Debouncer;
pub use form::{FormHandle, MemoryForm};
