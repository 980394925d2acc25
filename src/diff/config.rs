//! Field exclusion and per-field allowlists for change detection.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Which top-level fields are compared, and how much of each.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiffConfig {
    /// Top-level keys that are never compared.
    pub exclude_global_keys: HashSet<String>,

    /// Field name -> subkeys that are compared for that field. A field
    /// listed here with an empty set compares nothing below it.
    pub keys_to_check_per_field: HashMap<String, HashSet<String>>,
}

impl DiffConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude top-level keys from comparison.
    pub fn exclude<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_global_keys
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// Restrict comparison of `field` to the given subkeys.
    pub fn check_keys<I, S>(mut self, field: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys_to_check_per_field
            .entry(field.into())
            .or_default()
            .extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn is_excluded(&self, key: &str) -> bool {
        self.exclude_global_keys.contains(key)
    }

    /// The allowlist configured for `field`, if any.
    pub fn allowed_keys(&self, field: &str) -> Option<&HashSet<String>> {
        self.keys_to_check_per_field.get(field)
    }
}
