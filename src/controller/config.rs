//! Controller timing and per-form binding options.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::diff::DiffConfig;
use crate::types::BackupId;

/// Timing and buffering shared by every controller.
#[derive(Clone, Debug)]
pub struct BackupConfig {
    /// Quiet window after the last edit before a backup pass runs.
    pub debounce: Duration,

    /// Delay between scheduling a load and restoring the backup.
    pub load_delay: Duration,

    /// Buffered events per subscriber.
    pub event_buffer_size: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(200),
            load_delay: Duration::from_millis(1500),
            event_buffer_size: 1000,
        }
    }
}

/// How one form is bound to its backup group.
#[derive(Clone, Debug, Default)]
pub struct BackupOptions {
    /// Group name; an empty name disables backups for the form.
    pub form_name: String,

    /// Entity id of the record being edited.
    pub identifier: Option<BackupId>,

    /// Field that tells create rows of an array section apart.
    pub unique_identifier: String,

    /// Field holding the persisted id of an array row.
    pub dynamic_identifier: String,

    /// Fields never written to the backup.
    pub exclude_fields_on_save: Vec<String>,

    /// Fields stripped from a restored value before it reaches the form.
    pub exclude_fields_on_load: Vec<String>,

    /// Fields ignored when deciding whether the form changed.
    pub exclude_fields_on_check: Vec<String>,

    /// Per-field allowlists of compared subkeys.
    pub fields_object_to_check: HashMap<String, HashSet<String>>,

    /// Editing an existing record rather than creating one.
    pub is_edit: bool,
}

impl BackupOptions {
    pub fn new(form_name: impl Into<String>) -> Self {
        Self {
            form_name: form_name.into(),
            ..Default::default()
        }
    }

    /// Bind to an existing record.
    pub fn edit(mut self, identifier: impl Into<BackupId>) -> Self {
        self.identifier = Some(identifier.into());
        self.is_edit = true;
        self
    }

    /// Bind to a record that does not exist yet.
    pub fn create(mut self) -> Self {
        self.identifier = None;
        self.is_edit = false;
        self
    }

    /// Row identifier fields for array sections.
    pub fn row_identifiers(
        mut self,
        dynamic_identifier: impl Into<String>,
        unique_identifier: impl Into<String>,
    ) -> Self {
        self.dynamic_identifier = dynamic_identifier.into();
        self.unique_identifier = unique_identifier.into();
        self
    }

    pub fn exclude_on_save<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_fields_on_save
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn exclude_on_load<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_fields_on_load
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn exclude_on_check<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_fields_on_check
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Compare only `keys` of `field`.
    pub fn check_keys<I, S>(mut self, field: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields_object_to_check
            .entry(field.into())
            .or_default()
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// Id of this form's backup within its group.
    ///
    /// Edit mode uses the identifier's text (empty when missing or zero);
    /// create mode shares one `"{form_name}_create"` slot per form.
    pub fn backup_id(&self) -> BackupId {
        if !self.is_edit {
            return BackupId::Text(format!("{}_create", self.form_name));
        }
        match &self.identifier {
            Some(id) if !id.is_zero() => BackupId::Text(id.to_string()),
            _ => BackupId::Text(String::new()),
        }
    }

    pub fn diff_config(&self) -> DiffConfig {
        let mut config = DiffConfig::new().exclude(self.exclude_fields_on_check.iter().cloned());
        for (field, keys) in &self.fields_object_to_check {
            config = config.check_keys(field.clone(), keys.iter().cloned());
        }
        config
    }

    pub(crate) fn has_group(&self) -> bool {
        !self.form_name.is_empty()
    }
}
