//! Subscription system for controller events.
//!
//! A [`BackupStateController`](crate::BackupStateController) reports what it
//! decided through events rather than callbacks:
//! - Restores of stored backups (form groups and array sections)
//! - Per-row states of array sections
//! - Persist and purge notifications
//!
//! Subscriptions filter by event kind and have bounded buffers; slow
//! subscribers are dropped.
//!
//! # Example
//!
//! ```ignore
//! let handle = controller.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::restores(),
//!     ..Default::default()
//! });
//!
//! controller.initialize_form();
//! while let Ok(event) = handle.try_recv() {
//!     if let BackupEvent::Restored { change } = event {
//!         println!("restored fields: {:?}", change.changes.keys());
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    BackupChange, BackupEvent, DropReason, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId,
};
