// Deletion Request (ephemeral, one per dispatch)

use std::collections::HashSet;

use super::job::UserId;
use super::record::{RecordId, RecordType};

/// Everything a dispatch decided to delete, captured once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    pub record_type: RecordType,
    /// Query order, duplicates removed (first occurrence wins)
    pub candidate_ids: Vec<RecordId>,
    pub initiator: Option<UserId>,
    pub title: String,
}

impl DeletionRequest {
    /// Build a request; `title` falls back to a label derived from the type,
    /// the candidate count and the list the deletion was started from
    pub fn new(
        record_type: RecordType,
        candidate_ids: impl IntoIterator<Item = RecordId>,
        initiator: Option<UserId>,
        title: Option<String>,
        source: Option<&str>,
    ) -> Self {
        let mut seen = HashSet::new();
        let candidate_ids: Vec<RecordId> = candidate_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| Self::derive_title(&record_type, candidate_ids.len(), source));

        Self {
            record_type,
            candidate_ids,
            initiator,
            title,
        }
    }

    pub fn derive_title(record_type: &RecordType, count: usize, source: Option<&str>) -> String {
        match source.filter(|s| !s.trim().is_empty()) {
            Some(from) => format!(
                "Delete {} record ({}) from {}",
                count,
                record_type.label(),
                from
            ),
            None => format!("Delete {} {}", count, record_type.label()),
        }
    }

    pub fn len(&self) -> usize {
        self.candidate_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidate_ids.is_empty()
    }
}
