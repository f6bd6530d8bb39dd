// Record Domain Model
//
// Records are owned by the host data store. The engine only ever holds
// identifiers plus the snapshot read right before a deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record identifier (unique per record type)
pub type RecordId = i64;

/// Visibility scope of a record (sub-site / tenant)
pub type PartitionId = i64;

/// Entity kind being deleted, e.g. `App\Model\BlogComment`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordType(String);

impl RecordType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment of a namespaced type name
    pub fn short_name(&self) -> &str {
        self.0
            .rsplit(['\\', ':', '.', '/'])
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.0)
    }

    /// Human-readable label: `BlogComment` -> `Blog Comment`,
    /// `HTTPRequestLog` -> `HTTP Request Log`
    pub fn label(&self) -> String {
        let chars: Vec<char> = self.short_name().chars().collect();
        let mut label = String::with_capacity(chars.len() + 4);

        for (i, &c) in chars.iter().enumerate() {
            if c == '_' || c == '-' {
                if !label.ends_with(' ') && !label.is_empty() {
                    label.push(' ');
                }
                continue;
            }
            if i > 0 && c.is_uppercase() && !label.ends_with(' ') {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
                {
                    label.push(' ');
                }
            }
            label.push(c);
        }

        label.trim().to_string()
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of a record read right before it is removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub record_type: RecordType,
    pub id: RecordId,
    pub partition: Option<PartitionId>,
    pub created_at: DateTime<Utc>,
}

impl RecordSnapshot {
    pub fn new(record_type: RecordType, id: RecordId, created_at: DateTime<Utc>) -> Self {
        Self {
            record_type,
            id,
            partition: None,
            created_at,
        }
    }

    pub fn in_partition(mut self, partition: PartitionId) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Creation time as shown in job logs, e.g. `05/03/2024 3:04pm`
    pub fn created_nice(&self) -> String {
        self.created_at.format("%d/%m/%Y %-I:%M%P").to_string()
    }
}

/// The full filtered record set of one admin list (no pagination)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub record_type: RecordType,

    /// Restrict to one partition; None means every partition visible to the list
    #[serde(default)]
    pub partition: Option<PartitionId>,

    /// Only records created strictly before this instant
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
}

impl RecordQuery {
    pub fn new(record_type: RecordType) -> Self {
        Self {
            record_type,
            partition: None,
            created_before: None,
        }
    }

    pub fn in_partition(mut self, partition: PartitionId) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Narrow to records created before `cutoff`; keeps the earlier bound
    /// when the query is already narrowed
    pub fn created_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.created_before = Some(match self.created_before {
            Some(existing) if existing < cutoff => existing,
            _ => cutoff,
        });
        self
    }
}
