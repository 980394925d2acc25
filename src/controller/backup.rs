//! Backup lifecycle of a single bound form.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::backups::BackupStore;
use crate::diff::ChangeDetector;
use crate::storage::Storage;
use crate::subscriptions::{
    BackupChange, BackupEvent, DropReason, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crate::tree::{deep_copy, revive_dates, try_deep_copy, Tree, TreeMap};
use crate::types::BackupId;

use super::config::{BackupConfig, BackupOptions};
use super::debounce::Debouncer;
use super::form::FormHandle;

mod array;

pub use array::FormArrayReconciliation;

/// Where a bound form stands relative to its baseline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormState {
    /// No backup; the form matches its baseline.
    Clean,
    /// A backup holds edits that differ from the baseline.
    Dirty,
    /// Edits are backed up but the form is not valid yet.
    Pending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionKind {
    Group,
    Array,
}

/// Edit subscription of a running session.
struct Session {
    kind: SessionKind,
    edits: Debouncer<Tree>,
}

/// A load-then-restore waiting for its delay.
struct ScheduledLoad {
    due: Instant,
    kind: SessionKind,
    baseline: Tree,
}

/// Keeps a form's unsaved edits in a [`BackupStore`] and restores them.
///
/// Each edit tick diffs the live value against the baseline: a material
/// change is persisted, a value that collapsed back to the baseline purges
/// the backup. Loading compares the stored value against a freshly set
/// baseline and either restores it into the form or drops it as stale.
///
/// Time is passed in by the caller (`notify_edit`, `tick`, `schedule_load`);
/// nothing runs in the background.
pub struct BackupStateController<S: Storage, F: FormHandle> {
    store: Arc<BackupStore<S>>,
    form: F,
    options: BackupOptions,
    config: BackupConfig,
    detector: ChangeDetector,
    backup_id: BackupId,

    /// Baseline; only ever replaced, never mutated.
    initial_state: Tree,

    exists_backup: bool,
    can_save_form: bool,

    session: Option<Session>,
    scheduled_load: Option<ScheduledLoad>,
    events: SubscriptionManager,
}

impl<S: Storage, F: FormHandle> BackupStateController<S, F> {
    pub fn new(
        store: Arc<BackupStore<S>>,
        form: F,
        options: BackupOptions,
        config: BackupConfig,
    ) -> Self {
        let backup_id = options.backup_id();
        let detector = ChangeDetector::new(options.diff_config());
        Self {
            store,
            form,
            options,
            config,
            detector,
            backup_id,
            initial_state: Tree::object(),
            exists_backup: false,
            can_save_form: false,
            session: None,
            scheduled_load: None,
            events: SubscriptionManager::new(),
        }
    }

    pub fn backup_id(&self) -> &BackupId {
        &self.backup_id
    }

    pub fn options(&self) -> &BackupOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<BackupStore<S>> {
        &self.store
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    /// Edits made through this handle are not seen until `notify_edit`.
    pub fn form_mut(&mut self) -> &mut F {
        &mut self.form
    }

    // --- Events ---

    pub fn subscribe(&self, filter: SubscriptionFilter) -> SubscriptionHandle {
        self.events.subscribe(SubscriptionConfig {
            buffer_size: self.config.event_buffer_size,
            filter,
        })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.events.unsubscribe(id);
    }

    // --- Flags ---

    /// Whether this form currently has a stored backup.
    pub fn exists_backup(&self) -> bool {
        self.exists_backup
    }

    pub fn can_save_form(&self) -> bool {
        self.can_save_form
    }

    pub fn state(&self) -> FormState {
        match (self.exists_backup, self.form.is_valid()) {
            (false, _) => FormState::Clean,
            (true, true) => FormState::Dirty,
            (true, false) => FormState::Pending,
        }
    }

    // --- Baseline ---

    /// Replace the baseline. Anything but a mapping resets it to `{}`.
    pub fn set_initial_state(&mut self, body: &Tree) {
        self.initial_state = if body.is_object() {
            deep_copy(body)
        } else {
            Tree::object()
        };
    }

    /// Copy of the baseline mapping; every field is copied on its own.
    pub fn initial_state(&self) -> Tree {
        let fields: TreeMap = self
            .initial_state
            .as_object()
            .map(|map| {
                map.iter()
                    .map(|(key, value)| (key.clone(), deep_copy(value)))
                    .collect()
            })
            .unwrap_or_default();
        Tree::from(fields)
    }

    /// Whether a backup for this form is stored right now. The
    /// `exists_backup` flag is brought in line with the answer.
    pub fn check_backup_exist(&mut self) -> bool {
        self.sync_exists_backup();
        self.exists_backup
    }

    // --- Form groups ---

    /// Compare the stored backup against the baseline.
    ///
    /// Without a backup the change is empty and carries no values.
    pub fn backup_form_changes(&self) -> BackupChange {
        if !self.options.has_group() {
            return BackupChange::default();
        }
        let Some(entry) = self.store.get(&self.backup_id, &self.options.form_name) else {
            return BackupChange::default();
        };

        let form_value = revive_dates(&entry.data);
        let mut value = deep_copy(&form_value);
        for field in &self.options.exclude_fields_on_load {
            value.remove(field);
        }

        let report = self.detector.diff(&self.initial_state(), &form_value);
        BackupChange {
            changes: report.result,
            explain: report.explain,
            value: Some(value),
            original_value: Some(deep_copy(&form_value)),
        }
    }

    /// Restore a stored backup that still differs from the baseline, or
    /// drop it as stale.
    pub fn load_backup_form(&mut self) {
        if !self.check_backup_exist() {
            return;
        }

        let change = self.backup_form_changes();
        if change.has_changes() {
            if let Some(value) = &change.value {
                self.form.patch_silently(value);
            }
            debug!(
                group = %self.options.form_name,
                id = %self.backup_id,
                fields = change.changes.len(),
                "backup restored"
            );
            self.events.broadcast(BackupEvent::Restored { change });
        } else {
            debug!(group = %self.options.form_name, id = %self.backup_id, "stale backup dropped");
            self.purge();
        }
    }

    /// Load the backup and start listening for edits.
    pub fn initialize_form(&mut self) {
        self.load_backup_form();
        self.start_session(SessionKind::Group);
    }

    /// New baseline, then reload.
    pub fn reset_backup_check(&mut self, baseline: &Tree) {
        self.set_initial_state(baseline);
        self.load_backup_form();
    }

    /// Decide for one edited value whether the backup is written or purged.
    pub fn reconcile_edit(&mut self, value: &Tree) {
        if !self.options.has_group() {
            return;
        }
        let mut snapshot = match try_deep_copy(value) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(group = %self.options.form_name, error = %err, "edit snapshot rejected");
                return;
            }
        };
        for field in self.options.exclude_fields_on_save.iter().filter(|f| !f.is_empty()) {
            snapshot.remove(field);
        }

        let report = self.detector.diff(&self.initial_state(), value);
        if report.is_materially_changed() {
            self.persist(&snapshot);
        } else {
            self.purge();
        }
    }

    /// The form was submitted: its current value becomes the baseline and
    /// the backup goes away.
    pub fn save(&mut self) {
        let current = self.form.value();
        if let Some(session) = self.session.as_mut() {
            session.edits.cancel();
        }
        if self.options.has_group() {
            self.purge();
        }
        self.reset_backup_check(&current);
    }

    pub fn remove_backup_data(&mut self) {
        if !self.options.has_group() {
            return;
        }
        self.purge();
    }

    // --- Session ---

    /// Record that the form was edited at `now`.
    pub fn notify_edit(&mut self, now: Instant) {
        let value = self.form.value();
        if let Some(session) = self.session.as_mut() {
            session.edits.push(value, now);
        }
    }

    /// Set `baseline` and initialize the form once `load_delay` has passed.
    pub fn schedule_load(&mut self, baseline: Tree, now: Instant) {
        self.schedule(SessionKind::Group, baseline, now);
    }

    /// Array-section counterpart of [`schedule_load`](Self::schedule_load).
    pub fn schedule_load_array(&mut self, rows: Tree, now: Instant) {
        self.schedule(SessionKind::Array, rows, now);
    }

    /// Run whatever is due at `now`. Returns whether anything ran.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut ran = false;

        let load_due = matches!(&self.scheduled_load, Some(load) if now >= load.due);
        if load_due {
            if let Some(load) = self.scheduled_load.take() {
                match load.kind {
                    SessionKind::Group => {
                        self.set_initial_state(&load.baseline);
                        self.initialize_form();
                    }
                    SessionKind::Array => {
                        self.set_initial_state_array(&load.baseline);
                        self.initialize_form_array_states();
                    }
                }
                ran = true;
            }
        }

        let fired = self
            .session
            .as_mut()
            .and_then(|session| session.edits.poll(now).map(|value| (session.kind, value)));
        if let Some((kind, value)) = fired {
            match kind {
                SessionKind::Group => self.reconcile_edit(&value),
                SessionKind::Array => {
                    self.apply_rows(&value);
                }
            }
            ran = true;
        }

        ran
    }

    /// Stop listening for edits and cancel a scheduled load.
    pub fn end_session(&mut self) {
        let pending = self
            .session
            .take()
            .is_some_and(|mut session| session.edits.cancel());
        let scheduled = self.scheduled_load.take().is_some();
        debug!(
            group = %self.options.form_name,
            pending_edit = pending,
            scheduled_load = scheduled,
            "backup session ended"
        );
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    fn schedule(&mut self, kind: SessionKind, baseline: Tree, now: Instant) {
        self.scheduled_load = Some(ScheduledLoad {
            due: now + self.config.load_delay,
            kind,
            baseline,
        });
    }

    fn start_session(&mut self, kind: SessionKind) {
        if !self.options.has_group() {
            return;
        }
        self.session = Some(Session {
            kind,
            edits: Debouncer::new(self.config.debounce),
        });
    }

    // --- Store access ---

    /// Saving is allowed for valid edits, and always for a new record
    /// without a backup.
    fn refresh_can_save(&mut self) {
        self.can_save_form = if self.exists_backup {
            self.form.is_valid()
        } else {
            !self.options.is_edit
        };
    }

    /// Re-read the store's exists-state into `exists_backup`.
    fn sync_exists_backup(&mut self) {
        self.exists_backup =
            self.options.has_group() && self.store.exists(&self.backup_id, &self.options.form_name);
        self.refresh_can_save();
    }

    fn persist(&mut self, data: &Tree) {
        self.store
            .save(&self.backup_id, &self.options.form_name, data);
        self.sync_exists_backup();
        if !self.exists_backup {
            debug!(group = %self.options.form_name, id = %self.backup_id, "backup not persisted");
            return;
        }
        self.events.broadcast(BackupEvent::Persisted {
            group: self.options.form_name.clone(),
            id: self.backup_id.clone(),
        });
    }

    fn purge(&mut self) {
        if self.store.exists(&self.backup_id, &self.options.form_name) {
            self.store
                .remove(&self.backup_id, &self.options.form_name);
            self.events.broadcast(BackupEvent::Purged {
                group: self.options.form_name.clone(),
                id: self.backup_id.clone(),
            });
        }
        self.sync_exists_backup();
    }
}

impl<S: Storage, F: FormHandle> Drop for BackupStateController<S, F> {
    fn drop(&mut self) {
        self.events.close_all(DropReason::ControllerClosed);
    }
}
