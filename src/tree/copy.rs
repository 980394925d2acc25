//! Structural copy with the empty-container sharing rule.

use std::sync::Arc;

use crate::error::{BackupError, Result};

use super::value::Tree;

/// Nesting depth accepted by [`try_deep_copy`].
///
/// Trees are acyclic by construction, so the limit bounds input taken from
/// outside the crate, not correctness of the copy.
pub const MAX_TREE_DEPTH: usize = 512;

/// Copy a tree so that no non-empty container is shared with the input.
///
/// The outermost container is always fresh. Below it, only non-empty
/// objects and arrays are copied recursively: empty containers keep their
/// allocation, and dates and primitives are cloned as leaves. Callers can
/// observe the sharing through [`Tree::shares_container`].
pub fn deep_copy(value: &Tree) -> Tree {
    match value {
        Tree::Array(items) => Tree::Array(Arc::new(items.iter().map(copy_child).collect())),
        Tree::Object(map) => Tree::Object(Arc::new(
            map.iter()
                .map(|(key, item)| (key.clone(), copy_child(item)))
                .collect(),
        )),
        leaf => leaf.clone(),
    }
}

/// [`deep_copy`] for input from outside the crate: trees nested deeper
/// than [`MAX_TREE_DEPTH`] are rejected before anything is copied.
pub fn try_deep_copy(value: &Tree) -> Result<Tree> {
    if nesting_exceeds(value, MAX_TREE_DEPTH) {
        return Err(BackupError::CyclicTree {
            depth: MAX_TREE_DEPTH,
        });
    }
    Ok(deep_copy(value))
}

fn copy_child(item: &Tree) -> Tree {
    if item.is_non_empty_container() {
        deep_copy(item)
    } else {
        item.clone()
    }
}

/// Whether containers nest more than `budget` levels below `value`.
fn nesting_exceeds(value: &Tree, budget: usize) -> bool {
    let too_deep = |child: &Tree| {
        child.is_non_empty_container() && (budget == 0 || nesting_exceeds(child, budget - 1))
    };
    match value {
        Tree::Array(items) => items.iter().any(too_deep),
        Tree::Object(map) => map.values().any(too_deep),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_copy_is_equal() {
        let tree = Tree::from(json!({"a": [1, {"b": "c"}], "d": null, "e": {}}));
        assert_eq!(deep_copy(&tree), tree);
    }

    #[test]
    fn test_non_empty_containers_are_fresh() {
        let tree = Tree::from(json!({"list": [{"x": 1}], "obj": {"y": 2}}));
        let copy = deep_copy(&tree);

        assert!(!copy.shares_container(&tree));
        assert!(!copy["list"].shares_container(&tree["list"]));
        assert!(!copy["list"][0].shares_container(&tree["list"][0]));
        assert!(!copy["obj"].shares_container(&tree["obj"]));
    }

    #[test]
    fn test_empty_containers_are_shared() {
        let tree = Tree::from(json!({"empty_obj": {}, "empty_list": [], "list": [[], {}]}));
        let copy = deep_copy(&tree);

        assert!(copy["empty_obj"].shares_container(&tree["empty_obj"]));
        assert!(copy["empty_list"].shares_container(&tree["empty_list"]));
        assert!(copy["list"][0].shares_container(&tree["list"][0]));
        assert!(copy["list"][1].shares_container(&tree["list"][1]));
    }

    #[test]
    fn test_top_level_empty_is_fresh() {
        let tree = Tree::object();
        assert!(!deep_copy(&tree).shares_container(&tree));
    }

    #[test]
    fn test_mutating_copy_leaves_original() {
        let tree = Tree::from(json!({"obj": {"y": 2}, "empty": {}}));
        let mut copy = deep_copy(&tree);

        copy.as_object_mut()
            .unwrap()
            .get_mut("obj")
            .unwrap()
            .insert("y", Tree::from(3));
        copy.as_object_mut()
            .unwrap()
            .get_mut("empty")
            .unwrap()
            .insert("z", Tree::from(1));

        assert_eq!(tree["obj"]["y"], Tree::from(2));
        assert!(tree["empty"].as_object().unwrap().is_empty());
    }

    fn nested(levels: usize) -> Tree {
        let mut tree = Tree::from(json!({"leaf": 1}));
        for _ in 0..levels {
            tree = Tree::from(vec![tree]);
        }
        tree
    }

    #[test]
    fn test_runaway_depth_is_rejected() {
        assert!(matches!(
            try_deep_copy(&nested(MAX_TREE_DEPTH + 2)),
            Err(BackupError::CyclicTree { .. })
        ));
        assert!(try_deep_copy(&nested(MAX_TREE_DEPTH - 2)).is_ok());
    }

    #[test]
    fn test_deep_copy_has_no_depth_limit() {
        let tree = nested(MAX_TREE_DEPTH + 100);
        let copy = deep_copy(&tree);

        assert_eq!(copy, tree);
        assert!(!copy.shares_container(&tree));
        assert!(!copy[0].shares_container(&tree[0]));
    }
}
