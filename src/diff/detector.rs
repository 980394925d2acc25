//! Top-level change detection between a baseline and an edited snapshot.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;

use crate::tree::{deep_copy, format_iso_date_time, parse_iso_date_time, Tree};

use super::config::DiffConfig;
use super::structural::{Delta, ObjectDiffer, StructuralDiffer};
use super::text::{CharDiffer, TextChange, TextDiffer};

/// Human-oriented description of one field's change.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Explanation {
    /// Inserted and deleted text runs of a string field.
    Text(Vec<TextChange>),
    /// The raw structural delta, for everything that is not text.
    Structural(Delta),
}

impl Explanation {
    /// Whether a person looking at the field would see a difference.
    pub fn is_visible(&self) -> bool {
        match self {
            Explanation::Text(changes) => !changes.is_empty(),
            Explanation::Structural(_) => true,
        }
    }
}

/// Outcome of comparing two snapshots field by field.
///
/// `result` is the material signal: it is empty iff no compared field
/// differs. `explain` is for display and may list fields that `result`
/// dropped, such as a text field cleared to blank.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChangeReport {
    pub result: IndexMap<String, Delta>,
    pub explain: IndexMap<String, Explanation>,
}

impl ChangeReport {
    pub fn is_materially_changed(&self) -> bool {
        !self.result.is_empty()
    }

    pub fn is_visibly_changed(&self) -> bool {
        self.visible_changes().next().is_some()
    }

    /// Explanations that carry a visible difference.
    pub fn visible_changes(&self) -> impl Iterator<Item = (&str, &Explanation)> {
        self.explain
            .iter()
            .filter(|(_, e)| e.is_visible())
            .map(|(k, e)| (k.as_str(), e))
    }

    pub fn changed_fields(&self) -> impl Iterator<Item = &str> {
        self.result.keys().map(String::as_str)
    }
}

/// How a field is compared, decided once per field from the updated value.
enum FieldKind<'c> {
    /// Array field; the allowlist applies to every element.
    Sequence(Option<&'c HashSet<String>>),
    /// Plain mapping; the allowlist applies to its keys.
    Record(Option<&'c HashSet<String>>),
    Leaf,
}

impl<'c> FieldKind<'c> {
    fn resolve(field: &str, updated: &Tree, config: &'c DiffConfig) -> Self {
        match updated {
            Tree::Array(_) => FieldKind::Sequence(config.allowed_keys(field)),
            Tree::Object(_) => FieldKind::Record(config.allowed_keys(field)),
            _ => FieldKind::Leaf,
        }
    }
}

/// Compares baseline and updated mappings under a [`DiffConfig`].
///
/// Only keys of the baseline are inspected. Keys added by the update are
/// never reported, and neither are keys the update dropped.
pub struct ChangeDetector<S = ObjectDiffer, T = CharDiffer> {
    config: DiffConfig,
    structural: S,
    text: T,
}

impl ChangeDetector {
    pub fn new(config: DiffConfig) -> Self {
        Self::with_differs(config, ObjectDiffer, CharDiffer)
    }
}

impl<S: StructuralDiffer, T: TextDiffer> ChangeDetector<S, T> {
    pub fn with_differs(config: DiffConfig, structural: S, text: T) -> Self {
        Self {
            config,
            structural,
            text,
        }
    }

    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    pub fn diff(&self, original: &Tree, updated: &Tree) -> ChangeReport {
        let (Some(baseline), Some(current)) = (original.as_object(), updated.as_object()) else {
            return ChangeReport::default();
        };

        let mut found = IndexMap::new();
        let mut explain = IndexMap::new();

        for (field, before) in baseline {
            if self.config.is_excluded(field) {
                continue;
            }
            let Some(after) = current.get(field) else {
                continue;
            };

            match FieldKind::resolve(field, after, &self.config) {
                FieldKind::Sequence(allowed) => {
                    let (lhs, rhs) = match allowed {
                        Some(keys) => (project_each(before, keys), project_each(after, keys)),
                        None => (before.clone(), after.clone()),
                    };
                    if let Some(delta) = self.structural.diff(&lhs, &rhs) {
                        explain.insert(field.clone(), Explanation::Structural(delta.clone()));
                        found.insert(field.clone(), delta);
                    }
                }
                kind => {
                    let (lhs, rhs) = match kind {
                        FieldKind::Record(Some(keys)) => (project(before, keys), project(after, keys)),
                        _ => (before.clone(), after.clone()),
                    };
                    let Some(delta) = self.structural.diff(&lhs, &rhs) else {
                        continue;
                    };
                    let explanation = match &delta {
                        Delta::Value(Tree::String(_)) => {
                            let changes = self
                                .text
                                .diff_chars(&display_text(before), &display_text(after), true)
                                .into_iter()
                                .filter(TextChange::is_edit)
                                .collect();
                            Explanation::Text(changes)
                        }
                        other => Explanation::Structural(other.clone()),
                    };
                    explain.insert(field.clone(), explanation);
                    found.insert(field.clone(), delta);
                }
            }
        }

        ChangeReport {
            result: clean_and_validate(found),
            explain,
        }
    }
}

/// Compare two snapshots with the default differs.
pub fn check_differences(original: &Tree, updated: &Tree, config: &DiffConfig) -> ChangeReport {
    ChangeDetector::new(config.clone()).diff(original, updated)
}

/// Copy of `value` keeping only allowed keys when it is a mapping.
fn project(value: &Tree, allowed: &HashSet<String>) -> Tree {
    let mut copy = deep_copy(value);
    if let Some(map) = copy.as_object_mut() {
        map.retain(|key, _| allowed.contains(key));
    }
    copy
}

fn project_each(value: &Tree, allowed: &HashSet<String>) -> Tree {
    match value.as_array() {
        Some(items) => Tree::from(
            items
                .iter()
                .map(|item| project(item, allowed))
                .collect::<Vec<_>>(),
        ),
        None => value.clone(),
    }
}

fn display_text(value: &Tree) -> String {
    if value.is_falsy() {
        return String::new();
    }
    match value {
        Tree::String(s) => s.clone(),
        Tree::Date(d) => format_iso_date_time(d),
        other => other.to_json().to_string(),
    }
}

/// Drop fields whose new value is absent or blank text, revive date text,
/// and detach carried values from the input trees.
fn clean_and_validate(found: IndexMap<String, Delta>) -> IndexMap<String, Delta> {
    found
        .into_iter()
        .filter_map(|(field, delta)| {
            let cleaned = match delta {
                Delta::Removed => return None,
                Delta::Value(Tree::String(text)) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() || trimmed == "undefined" {
                        return None;
                    }
                    match parse_iso_date_time(&text) {
                        Some(date) => Delta::Value(Tree::Date(date)),
                        None => Delta::Value(Tree::String(text)),
                    }
                }
                Delta::Value(Tree::Array(items)) => {
                    Delta::Value(Tree::from(items.iter().map(deep_copy).collect::<Vec<_>>()))
                }
                other => other.detach(),
            };
            Some((field, cleaned))
        })
        .collect()
}
