//! Array sections: one backup holding every unsaved row.
//!
//! Rows carrying a value in the dynamic identifier field edit a baseline
//! row with the same value; rows without one are new.

use serde::Serialize;

use crate::storage::Storage;
use crate::subscriptions::{BackupChange, BackupEvent};
use crate::tree::{deep_copy, revive_dates, Tree};
use crate::types::{FormArrayState, FormArrayStates};

use super::{BackupStateController, FormHandle, SessionKind};

/// Rows worth backing up, with the state of every row.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FormArrayReconciliation {
    pub result: Vec<Tree>,
    pub states: FormArrayStates,
}

/// The row's identifier, unless missing or null.
fn row_identifier<'a>(row: &'a Tree, field: &str) -> Option<&'a Tree> {
    row.get(field).filter(|id| !id.is_null())
}

impl<S: Storage, F: FormHandle> BackupStateController<S, F> {
    /// Replace the baseline rows. Anything but a sequence resets it to `[]`.
    pub fn set_initial_state_array(&mut self, rows: &Tree) {
        self.initial_state = if rows.is_array() {
            deep_copy(rows)
        } else {
            Tree::array()
        };
    }

    /// Copies of the baseline rows.
    pub fn initial_state_array(&self) -> Vec<Tree> {
        self.initial_state
            .as_array()
            .map(|rows| rows.iter().map(deep_copy).collect())
            .unwrap_or_default()
    }

    /// Restore backed-up rows, then start listening for edits.
    pub fn initialize_form_array_states(&mut self) {
        self.load_backup_form_array();
        self.load_initial_form_array_states();
        self.start_session(SessionKind::Array);
    }

    /// Split the stored rows into edits of baseline rows and new rows and
    /// announce them. Stored edits matching their baseline row are left
    /// out; without a readable backup both lists are announced empty.
    pub fn load_backup_form_array(&mut self) {
        let rows = self.stored_rows();
        let baseline = self.initial_state_array();
        let field = self.options.dynamic_identifier.as_str();
        let mut changes_in_edit = Vec::new();
        let mut changes_in_create = Vec::new();

        for row in &rows {
            let value = revive_dates(row);
            let Some(id) = row_identifier(&value, field) else {
                changes_in_create.push(BackupChange {
                    value: Some(value.clone()),
                    original_value: Some(value),
                    ..Default::default()
                });
                continue;
            };
            let Some(original) = baseline.iter().find(|r| row_identifier(r, field) == Some(id)) else {
                continue;
            };
            let report = self.detector.diff(original, &value);
            if report.is_materially_changed() {
                changes_in_edit.push(BackupChange {
                    changes: report.result,
                    explain: report.explain,
                    value: Some(value.clone()),
                    original_value: Some(original.clone()),
                });
            }
        }

        self.sync_exists_backup();
        tracing::debug!(
            group = %self.options.form_name,
            edited = changes_in_edit.len(),
            created = changes_in_create.len(),
            "array backup restored"
        );
        self.events.broadcast(BackupEvent::ArrayRestored {
            changes_in_edit,
            changes_in_create,
        });
    }

    /// Rows of the stored backup, empty when there is none.
    fn stored_rows(&self) -> Vec<Tree> {
        if !self.options.has_group() {
            return Vec::new();
        }
        let Some(entry) = self.store.get(&self.backup_id, &self.options.form_name) else {
            return Vec::new();
        };
        match entry.data.as_array() {
            Some(rows) => rows.to_vec(),
            None => {
                tracing::warn!(
                    group = %self.options.form_name,
                    id = %self.backup_id,
                    "array backup is not a sequence"
                );
                Vec::new()
            }
        }
    }

    /// Announce row states for the current form value without writing.
    pub fn load_initial_form_array_states(&mut self) -> FormArrayStates {
        let reconciliation = self.check_form_array_changes_and_states();
        self.events.broadcast(BackupEvent::ArrayStatesChanged {
            states: reconciliation.states.clone(),
        });
        reconciliation.states
    }

    /// Rows of the current form value that differ from the baseline.
    pub fn check_form_array_changes_and_states(&self) -> FormArrayReconciliation {
        self.reconcile_rows(&self.form.value())
    }

    /// Back up the rows that changed and announce every row's state.
    pub fn on_change_form_array(&mut self) -> FormArrayReconciliation {
        let rows = self.form.value();
        self.apply_rows(&rows)
    }

    /// Drop the backup if it holds no rows.
    pub fn remove_backup_data_empty(&mut self) {
        if !self.options.has_group() {
            return;
        }
        let empty = self
            .store
            .get(&self.backup_id, &self.options.form_name)
            .is_some_and(|entry| entry.data.as_array().is_some_and(|rows| rows.is_empty()));
        if empty {
            self.purge();
        }
    }

    /// Forget one backed-up row: in edit mode the row whose dynamic
    /// identifier is `static_identifier`, otherwise the new row whose unique
    /// identifier is `dynamic_identifier`.
    pub fn remove_backup_data_dynamic(
        &mut self,
        static_identifier: &Tree,
        dynamic_identifier: &Tree,
        is_edit: bool,
    ) -> FormArrayStates {
        if self.options.has_group() {
            if let Some(entry) = self.store.get(&self.backup_id, &self.options.form_name) {
                let (field, target) = if is_edit {
                    (&self.options.dynamic_identifier, static_identifier)
                } else {
                    (&self.options.unique_identifier, dynamic_identifier)
                };
                let kept: Vec<Tree> = entry
                    .data
                    .as_array()
                    .unwrap_or_default()
                    .iter()
                    .filter(|row| row.get(field) != Some(target))
                    .cloned()
                    .collect();

                self.persist(&Tree::from(kept));
                self.remove_backup_data_empty();
            }
        }
        self.load_initial_form_array_states()
    }

    pub(super) fn apply_rows(&mut self, rows: &Tree) -> FormArrayReconciliation {
        let reconciliation = self.reconcile_rows(rows);
        if !self.options.has_group() {
            return reconciliation;
        }

        if reconciliation.result.is_empty() {
            self.purge();
        } else {
            self.persist(&Tree::from(reconciliation.result.clone()));
        }
        self.events.broadcast(BackupEvent::ArrayStatesChanged {
            states: reconciliation.states.clone(),
        });
        reconciliation
    }

    fn reconcile_rows(&self, rows: &Tree) -> FormArrayReconciliation {
        let baseline = self.initial_state_array();
        let field = self.options.dynamic_identifier.as_str();
        let mut reconciliation = FormArrayReconciliation::default();

        for (index, row) in rows.as_array().unwrap_or_default().iter().enumerate() {
            let mut value = deep_copy(row);
            for excluded in self.options.exclude_fields_on_save.iter().filter(|f| !f.is_empty()) {
                value.remove(excluded);
            }

            let state = match row_identifier(row, field) {
                None => {
                    reconciliation.result.push(value);
                    FormArrayState::new(true, true)
                }
                Some(id) => {
                    let original = baseline.iter().find(|r| row_identifier(r, field) == Some(id));
                    match original {
                        Some(original) if self.detector.diff(original, &value).is_materially_changed() => {
                            reconciliation.result.push(value);
                            FormArrayState::new(true, self.form.is_row_valid(index))
                        }
                        _ => FormArrayState::new(false, false),
                    }
                }
            };
            reconciliation.states.insert(index, state);
        }

        reconciliation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backups::BackupStore;
    use crate::controller::{BackupConfig, BackupOptions, MemoryForm};
    use crate::storage::MemoryStorage;
    use crate::subscriptions::SubscriptionFilter;
    use crate::types::BackupId;
    use serde_json::json;
    use std::sync::Arc;

    type Controller = BackupStateController<MemoryStorage, MemoryForm>;

    fn controller(rows: serde_json::Value) -> Controller {
        let store = Arc::new(BackupStore::new(MemoryStorage::new()));
        let options = BackupOptions::new("lines").edit(9).row_identifiers("id", "key");
        let mut c = BackupStateController::new(
            store,
            MemoryForm::new(Tree::from(rows.clone())),
            options,
            BackupConfig::default(),
        );
        c.set_initial_state_array(&Tree::from(rows));
        c
    }

    #[test]
    fn test_unchanged_rows_are_not_backed_up() {
        let c = controller(json!([{"id": 1, "qty": 2}]));
        let reconciliation = c.check_form_array_changes_and_states();

        assert!(reconciliation.result.is_empty());
        assert_eq!(reconciliation.states[&0], FormArrayState::new(false, false));
    }

    #[test]
    fn test_edit_and_create_rows() {
        let mut c = controller(json!([{"id": 1, "qty": 2}, {"id": 2, "qty": 5}]));
        c.form_mut().set_row(0, Tree::from(json!({"id": 1, "qty": 3})));
        c.form_mut().set_row(2, Tree::from(json!({"id": null, "key": "k1", "qty": 1})));

        let reconciliation = c.on_change_form_array();

        assert_eq!(reconciliation.result.len(), 2);
        assert_eq!(reconciliation.states[&0], FormArrayState::new(true, true));
        assert_eq!(reconciliation.states[&1], FormArrayState::new(false, false));
        assert_eq!(reconciliation.states[&2], FormArrayState::new(true, true));
        assert!(c.exists_backup());
        assert!(c.check_backup_exist());
    }

    #[test]
    fn test_unknown_edit_row_is_ignored() {
        let mut c = controller(json!([{"id": 1}]));
        c.form_mut().set_row(1, Tree::from(json!({"id": 42})));

        let reconciliation = c.check_form_array_changes_and_states();
        assert!(reconciliation.result.is_empty());
        assert_eq!(reconciliation.states[&1], FormArrayState::new(false, false));
    }

    #[test]
    fn test_invalid_edited_row_cannot_save() {
        let mut c = controller(json!([{"id": 1, "qty": 2}]));
        c.form_mut().set_row(0, Tree::from(json!({"id": 1, "qty": 0})));
        c.form_mut().set_row_valid(0, false);

        let reconciliation = c.check_form_array_changes_and_states();
        assert_eq!(reconciliation.states[&0], FormArrayState::new(true, false));
    }

    #[test]
    fn test_rows_reverting_purge_backup() {
        let mut c = controller(json!([{"id": 1, "qty": 2}]));
        c.form_mut().set_row(0, Tree::from(json!({"id": 1, "qty": 3})));
        c.on_change_form_array();
        assert!(c.check_backup_exist());

        c.form_mut().set_row(0, Tree::from(json!({"id": 1, "qty": 2})));
        c.on_change_form_array();
        assert!(!c.check_backup_exist());
        assert!(!c.exists_backup());
    }

    #[test]
    fn test_load_splits_edit_and_create() {
        let mut c = controller(json!([{"id": 1, "qty": 2}, {"id": 2, "qty": 5}]));
        c.store().save(
            &BackupId::from("9"),
            "lines",
            &Tree::from(json!([
                {"id": 1, "qty": 3},
                {"id": 2, "qty": 5},
                {"key": "k1", "qty": 1}
            ])),
        );
        let handle = c.subscribe(SubscriptionFilter::restores());

        c.load_backup_form_array();

        match handle.try_recv() {
            Ok(BackupEvent::ArrayRestored {
                changes_in_edit,
                changes_in_create,
            }) => {
                assert_eq!(changes_in_edit.len(), 1);
                assert_eq!(changes_in_edit[0].changes.keys().collect::<Vec<_>>(), vec!["qty"]);
                assert_eq!(changes_in_create.len(), 1);
                assert!(changes_in_create[0].changes.is_empty());
            }
            other => panic!("expected array restore, got {:?}", other),
        }
    }

    #[test]
    fn test_load_without_backup_announces_empty_lists() {
        let mut c = controller(json!([{"id": 1, "qty": 2}]));
        let handle = c.subscribe(SubscriptionFilter::restores());

        c.load_backup_form_array();

        match handle.try_recv() {
            Ok(BackupEvent::ArrayRestored {
                changes_in_edit,
                changes_in_create,
            }) => {
                assert!(changes_in_edit.is_empty());
                assert!(changes_in_create.is_empty());
            }
            other => panic!("expected array restore, got {:?}", other),
        }
        assert!(!c.exists_backup());
    }

    #[test]
    fn test_remove_backup_data_dynamic() {
        let mut c = controller(json!([{"id": 1, "qty": 2}]));
        c.store().save(
            &BackupId::from("9"),
            "lines",
            &Tree::from(json!([{"id": 1, "qty": 3}, {"key": "k1", "qty": 1}])),
        );

        c.remove_backup_data_dynamic(&Tree::from(1), &Tree::Null, true);
        let stored = c.store().get(&BackupId::from("9"), "lines").unwrap();
        assert_eq!(stored.data, Tree::from(json!([{"key": "k1", "qty": 1}])));

        c.remove_backup_data_dynamic(&Tree::Null, &Tree::from("k1"), false);
        assert!(!c.check_backup_exist());
        assert!(!c.exists_backup());
    }

    #[test]
    fn test_states_event() {
        let mut c = controller(json!([{"id": 1, "qty": 2}]));
        let handle = c.subscribe(SubscriptionFilter::array_states());

        c.initialize_form_array_states();

        match handle.try_recv() {
            Ok(BackupEvent::ArrayStatesChanged { states }) => {
                assert_eq!(states.len(), 1);
                assert!(!states[&0].exists_backup);
            }
            other => panic!("expected states, got {:?}", other),
        }
    }
}
