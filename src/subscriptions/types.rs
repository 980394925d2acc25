//! Subscription types for controller events.

use indexmap::IndexMap;
use serde::Serialize;

use crate::diff::{Delta, Explanation};
use crate::tree::Tree;
use crate::types::{BackupId, FormArrayStates};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Include restore events (form and array sections).
    pub include_restores: bool,

    /// Include per-row state updates of array sections.
    pub include_array_states: bool,

    /// Include persist/purge notifications.
    pub include_lifecycle: bool,
}

impl SubscriptionFilter {
    /// Subscribe to restored backups only.
    pub fn restores() -> Self {
        Self {
            include_restores: true,
            ..Default::default()
        }
    }

    /// Subscribe to array row states only.
    pub fn array_states() -> Self {
        Self {
            include_array_states: true,
            ..Default::default()
        }
    }

    /// Subscribe to persist/purge notifications only.
    pub fn lifecycle() -> Self {
        Self {
            include_lifecycle: true,
            ..Default::default()
        }
    }

    /// Subscribe to everything.
    pub fn all() -> Self {
        Self {
            include_restores: true,
            include_array_states: true,
            include_lifecycle: true,
        }
    }

    pub(crate) fn matches(&self, event: &BackupEvent) -> bool {
        match event {
            BackupEvent::Restored { .. } | BackupEvent::ArrayRestored { .. } => {
                self.include_restores
            }
            BackupEvent::ArrayStatesChanged { .. } => self.include_array_states,
            BackupEvent::Persisted { .. } | BackupEvent::Purged { .. } => self.include_lifecycle,
            BackupEvent::Dropped { .. } => true,
        }
    }
}

/// A stored backup compared against the baseline.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupChange {
    /// Material differences; empty means the backup matches the baseline.
    pub changes: IndexMap<String, Delta>,
    /// Display-oriented description of the same comparison.
    pub explain: IndexMap<String, Explanation>,
    /// The value to restore into the form.
    pub value: Option<Tree>,
    /// The value as it was stored.
    pub original_value: Option<Tree>,
}

impl BackupChange {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Events emitted by a backup controller.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackupEvent {
    // --- Restore Events ---
    /// A stored backup differs from the baseline and was patched into the form.
    Restored { change: BackupChange },

    /// Stored rows of an array section, split by whether they edit a
    /// baseline row or create a new one.
    ArrayRestored {
        changes_in_edit: Vec<BackupChange>,
        changes_in_create: Vec<BackupChange>,
    },

    // --- Array Events ---
    /// Per-row states after a reconciliation pass.
    ArrayStatesChanged { states: FormArrayStates },

    // --- Lifecycle Events ---
    /// The backup was written.
    Persisted { group: String, id: BackupId },

    /// The backup was deleted.
    Purged { group: String, id: BackupId },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// The controller emitting events went away.
    ControllerClosed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<BackupEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<BackupEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<BackupEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<BackupEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered.
    pub fn drain(&self) -> Vec<BackupEvent> {
        self.receiver.try_iter().collect()
    }
}
