//! Change detection scenarios and properties.

use form_backup::{
    check_differences, deep_copy, BackupId, BackupStore, Delta, DiffConfig, Explanation,
    MemoryStorage, TextChange, Timestamp, Tree,
};
use proptest::prelude::*;
use serde_json::{json, Value};

fn tree(value: Value) -> Tree {
    Tree::from(value)
}

// --- Scenarios ---

#[test]
fn test_name_edit_scenario() {
    let report = check_differences(
        &tree(json!({"name": "Ann", "age": 30})),
        &tree(json!({"name": "Anne", "age": 30})),
        &DiffConfig::new(),
    );

    assert_eq!(report.result.len(), 1);
    assert_eq!(report.result["name"], Delta::Value(Tree::from("Anne")));
    assert_eq!(
        report.explain["name"],
        Explanation::Text(vec![TextChange::added("e")])
    );
}

#[test]
fn test_excluded_name_scenario() {
    let report = check_differences(
        &tree(json!({"name": "Ann", "age": 30})),
        &tree(json!({"name": "Anne", "age": 30})),
        &DiffConfig::new().exclude(["name"]),
    );

    assert!(report.result.is_empty());
    assert!(!report.is_materially_changed());
}

#[test]
fn test_array_field_scenario() {
    let report = check_differences(
        &tree(json!({"tags": ["a", "b"]})),
        &tree(json!({"tags": ["a", "c"]})),
        &DiffConfig::new(),
    );

    let tags = report.result["tags"].as_nested().unwrap();
    assert!(!tags.is_empty());
}

#[test]
fn test_store_scenario() {
    let store = BackupStore::new(MemoryStorage::new());

    store.save(&BackupId::from(1), "users", &tree(json!({"x": 1})));
    assert!(store.exists(&BackupId::from(1), "users"));

    store.remove(&BackupId::from(1), "users");
    assert!(!store.exists(&BackupId::from(1), "users"));
}

#[test]
fn test_added_and_dropped_keys_are_ignored() {
    let report = check_differences(
        &tree(json!({"a": 1, "b": 2})),
        &tree(json!({"a": 1, "c": 3})),
        &DiffConfig::new(),
    );
    assert!(report.result.is_empty());
}

#[test]
fn test_blank_text_is_visible_but_not_material() {
    let report = check_differences(
        &tree(json!({"note": "hello"})),
        &tree(json!({"note": "   "})),
        &DiffConfig::new(),
    );

    assert!(!report.is_materially_changed());
    assert!(report.is_visibly_changed());
    assert_eq!(report.visible_changes().count(), 1);
}

#[test]
fn test_case_only_edit_is_material_but_invisible() {
    let report = check_differences(
        &tree(json!({"name": "ann"})),
        &tree(json!({"name": "Ann"})),
        &DiffConfig::new(),
    );

    assert!(report.is_materially_changed());
    assert!(!report.is_visibly_changed());
}

#[test]
fn test_date_text_is_revived_in_result() {
    let report = check_differences(
        &tree(json!({"due": "2024-01-01T00:00:00.000Z"})),
        &tree(json!({"due": "2024-02-01T00:00:00.000Z"})),
        &DiffConfig::new(),
    );

    assert!(report.result["due"].as_value().unwrap().as_date().is_some());
}

#[test]
fn test_allowlist_applies_to_array_elements() {
    let config = DiffConfig::new().check_keys("lines", ["qty"]);
    let unchanged = check_differences(
        &tree(json!({"lines": [{"qty": 1, "note": "a"}]})),
        &tree(json!({"lines": [{"qty": 1, "note": "b"}]})),
        &config,
    );
    assert!(unchanged.result.is_empty());

    let changed = check_differences(
        &tree(json!({"lines": [{"qty": 1, "note": "a"}]})),
        &tree(json!({"lines": [{"qty": 2, "note": "a"}]})),
        &config,
    );
    assert!(changed.result.contains_key("lines"));
}

#[test]
fn test_deep_copy_shares_only_empty_containers() {
    let original = tree(json!({"filled": {"a": 1}, "empty": {}, "list": []}));
    let copy = deep_copy(&original);

    assert!(!copy.shares_container(&original));
    assert!(!copy["filled"].shares_container(&original["filled"]));
    assert!(copy["empty"].shares_container(&original["empty"]));
    assert!(copy["list"].shares_container(&original["list"]));
}

fn nested(levels: usize) -> Tree {
    let mut deep = Tree::from("leaf");
    for _ in 0..levels {
        deep = Tree::from(vec![deep]);
    }
    deep
}

#[test]
fn test_equal_deep_snapshots_have_no_changes() {
    let mut original = Tree::object();
    original.insert("f", nested(600));
    let mut updated = Tree::object();
    updated.insert("f", nested(600));

    let report = check_differences(&original, &updated, &DiffConfig::new());
    assert!(report.result.is_empty());
    assert!(!report.is_materially_changed());

    let copy = deep_copy(&original);
    assert_eq!(copy, original);
    assert!(!copy["f"].shares_container(&original["f"]));
}

#[test]
fn test_change_at_the_bottom_of_a_deep_tree() {
    let mut original = Tree::object();
    original.insert("f", nested(600));
    let mut updated = Tree::object();
    let mut deep = Tree::from("changed");
    for _ in 0..600 {
        deep = Tree::from(vec![deep]);
    }
    updated.insert("f", deep);

    let report = check_differences(&original, &updated, &DiffConfig::new());
    assert!(report.result.contains_key("f"));
}

// --- Properties ---

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-1000i64..1000).prop_map(Value::from),
        "[a-zA-Z ]{0,8}".prop_map(Value::from),
    ]
}

fn json_tree() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::btree_map("[a-d]", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn json_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-f]", json_tree(), 0..6)
        .prop_map(|map| Value::Object(map.into_iter().collect()))
}

/// Non-empty containers of `copy` never share storage with `original`;
/// empty ones below the top level always do.
fn assert_sharing(original: &Tree, copy: &Tree, top: bool) {
    match (original, copy) {
        (Tree::Object(a), Tree::Object(b)) => {
            assert_eq!(copy.shares_container(original), !top && a.is_empty());
            for (key, value) in a.iter() {
                assert_sharing(value, b.get(key).unwrap(), false);
            }
        }
        (Tree::Array(a), Tree::Array(b)) => {
            assert_eq!(copy.shares_container(original), !top && a.is_empty());
            for (value, copied) in a.iter().zip(b.iter()) {
                assert_sharing(value, copied, false);
            }
        }
        _ => {}
    }
}

proptest! {
    #[test]
    fn prop_identical_snapshots_have_no_changes(original in json_object()) {
        let original = tree(original);
        let report = check_differences(&original, &deep_copy(&original), &DiffConfig::new());
        prop_assert!(report.result.is_empty());
        prop_assert!(report.explain.is_empty());
    }

    #[test]
    fn prop_excluded_keys_never_reported(
        original in json_object(),
        updated in json_object(),
        excluded in prop::collection::hash_set("[a-f]", 0..6),
    ) {
        let config = DiffConfig::new().exclude(excluded.iter().cloned());
        let report = check_differences(&tree(original), &tree(updated), &config);
        for key in &excluded {
            prop_assert!(!report.result.contains_key(key));
            prop_assert!(!report.explain.contains_key(key));
        }
    }

    #[test]
    fn prop_changes_outside_allowlist_ignored(
        kept in json_tree(),
        before in json_tree(),
        after in json_tree(),
    ) {
        let config = DiffConfig::new().check_keys("field", ["kept"]);

        let original = json!({"field": {"kept": kept.clone(), "other": before.clone()}});
        let updated = json!({"field": {"kept": kept.clone(), "other": after.clone()}});
        let report = check_differences(&tree(original), &tree(updated), &config);
        prop_assert!(!report.result.contains_key("field"));

        let original = json!({"field": [{"kept": kept.clone(), "other": before}]});
        let updated = json!({"field": [{"kept": kept, "other": after}]});
        let report = check_differences(&tree(original), &tree(updated), &config);
        prop_assert!(!report.result.contains_key("field"));
    }

    #[test]
    fn prop_store_prepends_new_and_keeps_position(ids in prop::collection::vec(0i64..6, 1..20)) {
        let store = BackupStore::new(MemoryStorage::new());
        let mut expected: Vec<i64> = Vec::new();

        for (n, id) in ids.iter().enumerate() {
            store.save(&BackupId::from(*id), "group", &Tree::from(n as i64));
            if !expected.contains(id) {
                expected.insert(0, *id);
            }
        }

        let stored: Vec<BackupId> = store.entries("group").into_iter().map(|e| e.id).collect();
        let expected: Vec<BackupId> = expected.into_iter().map(BackupId::from).collect();
        prop_assert_eq!(stored, expected);
    }

    #[test]
    fn prop_save_get_round_trip(data in json_object()) {
        let store = BackupStore::new(MemoryStorage::new());
        let data = tree(data);
        let before = Timestamp::now();

        store.save(&BackupId::from("form_create"), "group", &data);
        let entry = store.get(&BackupId::from("form_create"), "group").unwrap();

        prop_assert_eq!(&entry.data, &data);
        prop_assert!(entry.created_at >= before);
    }

    #[test]
    fn prop_deep_copy_never_shares_filled_containers(value in json_tree()) {
        let original = tree(value);
        let copy = deep_copy(&original);

        prop_assert_eq!(&copy, &original);
        assert_sharing(&original, &copy, true);
    }

    #[test]
    fn prop_mutating_copy_leaves_original(value in json_object()) {
        let original = tree(value);
        let snapshot = original.to_json();

        let mut copy = deep_copy(&original);
        if let Some(map) = copy.as_object_mut() {
            for field in map.values_mut() {
                if let Some(inner) = field.as_object_mut() {
                    inner.insert("mutated".to_string(), Tree::from(true));
                }
                if let Some(items) = field.as_array_mut() {
                    items.push(Tree::Null);
                }
            }
            map.insert("added".to_string(), Tree::from(1));
        }

        prop_assert_eq!(original.to_json(), snapshot);
    }
}
