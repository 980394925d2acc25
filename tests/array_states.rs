//! Array section tests: per-row states and row backups.

use form_backup::{
    BackupConfig, BackupEvent, BackupId, BackupOptions, BackupStateController, BackupStore,
    FormArrayState, MemoryForm, MemoryStorage, SubscriptionFilter, Tree,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

type Controller = BackupStateController<MemoryStorage, MemoryForm>;

fn order_lines() -> Tree {
    Tree::from(json!([
        {"lineId": 10, "product": "bolt", "qty": 4, "internal": "x"},
        {"lineId": 11, "product": "nut", "qty": 8, "internal": "y"}
    ]))
}

fn controller(store: Arc<BackupStore<MemoryStorage>>) -> Controller {
    BackupStateController::new(
        store,
        MemoryForm::new(order_lines()),
        BackupOptions::new("order-lines")
            .edit(500)
            .row_identifiers("lineId", "tempKey")
            .exclude_on_save(["internal"]),
        BackupConfig::default(),
    )
}

fn latest_states(events: &[BackupEvent]) -> Option<&form_backup::FormArrayStates> {
    events.iter().rev().find_map(|event| match event {
        BackupEvent::ArrayStatesChanged { states } => Some(states),
        _ => None,
    })
}

// --- Session Flow ---

#[test]
fn test_debounced_row_edit_cycle() {
    let store = Arc::new(BackupStore::new(MemoryStorage::new()));
    let mut c = controller(Arc::clone(&store));
    let events = c.subscribe(SubscriptionFilter::array_states());
    let start = Instant::now();

    c.schedule_load_array(order_lines(), start);
    assert!(c.tick(start + Duration::from_millis(1500)));

    let initial = events.drain();
    let states = latest_states(&initial).unwrap();
    assert_eq!(states[&0], FormArrayState::new(false, false));
    assert_eq!(states[&1], FormArrayState::new(false, false));

    // Edit the second line and add a new one
    let edit_at = start + Duration::from_secs(2);
    c.form_mut()
        .set_row(1, Tree::from(json!({"lineId": 11, "product": "nut", "qty": 9, "internal": "y"})));
    c.form_mut()
        .set_row(2, Tree::from(json!({"lineId": null, "tempKey": "t1", "product": "washer", "qty": 1})));
    c.notify_edit(edit_at);
    assert!(c.tick(edit_at + Duration::from_millis(200)));

    let states_events = events.drain();
    let states = latest_states(&states_events).unwrap();
    assert_eq!(states[&0], FormArrayState::new(false, false));
    assert_eq!(states[&1], FormArrayState::new(true, true));
    assert_eq!(states[&2], FormArrayState::new(true, true));

    let stored = store.get(&BackupId::from("500"), "order-lines").unwrap();
    let rows = stored.data.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| !row.contains_key("internal")));
}

#[test]
fn test_restore_on_next_visit() {
    let store = Arc::new(BackupStore::new(MemoryStorage::new()));

    {
        let mut c = controller(Arc::clone(&store));
        c.set_initial_state_array(&order_lines());
        c.form_mut()
            .set_row(0, Tree::from(json!({"lineId": 10, "product": "bolt", "qty": 5, "internal": "x"})));
        c.form_mut()
            .set_row(2, Tree::from(json!({"tempKey": "t1", "product": "washer", "qty": 1})));
        c.on_change_form_array();
    }

    let mut c = controller(Arc::clone(&store));
    let restores = c.subscribe(SubscriptionFilter::restores());
    c.set_initial_state_array(&order_lines());
    c.initialize_form_array_states();

    match restores.try_recv() {
        Ok(BackupEvent::ArrayRestored {
            changes_in_edit,
            changes_in_create,
        }) => {
            assert_eq!(changes_in_edit.len(), 1);
            assert_eq!(changes_in_edit[0].value.as_ref().unwrap()["qty"], Tree::from(5));
            assert_eq!(changes_in_edit[0].original_value.as_ref().unwrap()["qty"], Tree::from(4));
            assert_eq!(changes_in_create.len(), 1);
            assert_eq!(changes_in_create[0].value.as_ref().unwrap()["tempKey"], Tree::from("t1"));
        }
        other => panic!("expected array restore, got {:?}", other),
    }

    // Loading does not write: the backup is still there for the consumer
    assert!(c.check_backup_exist());
}

#[test]
fn test_edit_rows_matching_baseline_are_not_restored() {
    let store = Arc::new(BackupStore::new(MemoryStorage::new()));
    store.save(
        &BackupId::from("500"),
        "order-lines",
        &Tree::from(json!([{"lineId": 10, "product": "bolt", "qty": 4}])),
    );

    let mut c = controller(Arc::clone(&store));
    let restores = c.subscribe(SubscriptionFilter::restores());
    c.set_initial_state_array(&order_lines());
    c.load_backup_form_array();

    match restores.try_recv() {
        Ok(BackupEvent::ArrayRestored {
            changes_in_edit,
            changes_in_create,
        }) => {
            assert!(changes_in_edit.is_empty());
            assert!(changes_in_create.is_empty());
        }
        other => panic!("expected array restore, got {:?}", other),
    }
    // Nothing was restored, but the stored rows are still there
    assert!(c.exists_backup());
}

// --- Row Removal ---

#[test]
fn test_remove_rows_until_empty() {
    let store = Arc::new(BackupStore::new(MemoryStorage::new()));
    let mut c = controller(Arc::clone(&store));
    c.set_initial_state_array(&order_lines());
    c.form_mut()
        .set_row(0, Tree::from(json!({"lineId": 10, "product": "bolt", "qty": 5})));
    c.form_mut()
        .set_row(2, Tree::from(json!({"tempKey": "t1", "product": "washer", "qty": 1})));
    c.on_change_form_array();

    c.remove_backup_data_dynamic(&Tree::from(10), &Tree::Null, true);
    let rows = store
        .get(&BackupId::from("500"), "order-lines")
        .unwrap()
        .data;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert!(c.exists_backup());

    c.remove_backup_data_dynamic(&Tree::Null, &Tree::from("t1"), false);
    assert!(!c.check_backup_exist());
    assert!(!c.exists_backup());
}

#[test]
fn test_remove_backup_data_empty_keeps_rows() {
    let store = Arc::new(BackupStore::new(MemoryStorage::new()));
    store.save(
        &BackupId::from("500"),
        "order-lines",
        &Tree::from(json!([{"tempKey": "t1"}])),
    );

    let mut c = controller(Arc::clone(&store));
    c.remove_backup_data_empty();
    assert!(c.check_backup_exist());

    store.save(&BackupId::from("500"), "order-lines", &Tree::array());
    c.remove_backup_data_empty();
    assert!(!c.check_backup_exist());
}

// --- Validity ---

#[test]
fn test_invalid_row_blocks_save_only_for_that_row() {
    let store = Arc::new(BackupStore::new(MemoryStorage::new()));
    let mut c = controller(Arc::clone(&store));
    c.set_initial_state_array(&order_lines());

    c.form_mut()
        .set_row(0, Tree::from(json!({"lineId": 10, "product": "bolt", "qty": -1})));
    c.form_mut()
        .set_row(1, Tree::from(json!({"lineId": 11, "product": "nut", "qty": 9})));
    c.form_mut().set_row_valid(0, false);

    let reconciliation = c.on_change_form_array();
    assert_eq!(reconciliation.states[&0], FormArrayState::new(true, false));
    assert_eq!(reconciliation.states[&1], FormArrayState::new(true, true));
    assert!(c.exists_backup());
    assert!(!c.can_save_form());
}
