// Delete options offered for a filtered list

use crate::domain::DELETE_NOW_KEY;
use serde::Serialize;

/// One entry of the delete dropdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOption {
    pub key: String,
    pub label: String,
}

impl DeleteOption {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }

    /// The unrestricted "delete everything" entry
    pub fn delete_all(count: u64) -> Self {
        Self::new(DELETE_NOW_KEY, format!("Delete all {} records", count))
    }
}

/// Label of the submit button for a set of options
pub fn button_label(options: &[DeleteOption]) -> Option<String> {
    match options {
        [] => None,
        [only] => Some(only.label.clone()),
        _ => Some("Go".to_string()),
    }
}
