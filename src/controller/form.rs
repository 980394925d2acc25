//! The form widget a controller is bound to.

use std::collections::HashSet;

use crate::tree::Tree;

/// Read access to a form's value and validity, plus a patch that does not
/// count as a user edit.
pub trait FormHandle {
    /// Current value: an object for form groups, an array for array sections.
    fn value(&self) -> Tree;

    fn is_valid(&self) -> bool;

    /// Validity of one row of an array section.
    fn is_row_valid(&self, index: usize) -> bool {
        let _ = index;
        self.is_valid()
    }

    /// Apply a restored value without notifying edit listeners.
    fn patch_silently(&mut self, value: &Tree);
}

/// In-memory [`FormHandle`] for headless use and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryForm {
    value: Tree,
    valid: bool,
    invalid_rows: HashSet<usize>,
    patches: usize,
}

impl MemoryForm {
    pub fn new(value: Tree) -> Self {
        Self {
            value,
            valid: true,
            invalid_rows: HashSet::new(),
            patches: 0,
        }
    }

    pub fn set_value(&mut self, value: Tree) {
        self.value = value;
    }

    /// Set one top-level field.
    pub fn set_field(&mut self, field: &str, value: Tree) {
        self.value.insert(field, value);
    }

    /// Replace one row of an array section.
    pub fn set_row(&mut self, index: usize, row: Tree) {
        if let Some(rows) = self.value.as_array_mut() {
            if index < rows.len() {
                rows[index] = row;
            } else {
                rows.push(row);
            }
        }
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn set_row_valid(&mut self, index: usize, valid: bool) {
        if valid {
            self.invalid_rows.remove(&index);
        } else {
            self.invalid_rows.insert(index);
        }
    }

    /// How many silent patches were applied.
    pub fn patch_count(&self) -> usize {
        self.patches
    }
}

impl FormHandle for MemoryForm {
    fn value(&self) -> Tree {
        self.value.clone()
    }

    fn is_valid(&self) -> bool {
        self.valid && self.invalid_rows.is_empty()
    }

    fn is_row_valid(&self, index: usize) -> bool {
        !self.invalid_rows.contains(&index)
    }

    /// Patches only controls the form already has: unknown object keys are
    /// ignored and array rows past the end are not appended.
    fn patch_silently(&mut self, value: &Tree) {
        self.patches += 1;
        if let (Tree::Object(_), Some(patch)) = (&self.value, value.as_object()) {
            if let Some(map) = self.value.as_object_mut() {
                for (key, field) in patch {
                    if let Some(slot) = map.get_mut(key) {
                        *slot = field.clone();
                    }
                }
            }
        } else if let (Tree::Array(_), Some(patch)) = (&self.value, value.as_array()) {
            if let Some(rows) = self.value.as_array_mut() {
                for (slot, row) in rows.iter_mut().zip(patch) {
                    *slot = row.clone();
                }
            }
        } else {
            self.value = value.clone();
        }
    }
}
