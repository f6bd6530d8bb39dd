// Record Store Ports (Interfaces)
//
// The host data store is reached through three capabilities:
// - RecordSetProvider: the filtered, unpaginated candidate set
// - RecordLocator: lookup of one record at job time
// - RecordStore: the idempotent deletion primitive

use crate::domain::{RecordId, RecordQuery, RecordSnapshot, RecordType};
use crate::error::Result;
use async_trait::async_trait;

/// Source of the candidate set for a dispatch
#[async_trait]
pub trait RecordSetProvider: Send + Sync {
    /// Identifiers matching the query, in query order
    async fn candidate_ids(&self, query: &RecordQuery) -> Result<Vec<RecordId>>;

    /// Number of records matching the query
    async fn count(&self, query: &RecordQuery) -> Result<u64>;
}

/// Finds a record by type and identifier at processing time.
///
/// Implementations:
/// - single-scope: only records visible in one partition
/// - all-partitions: ignores partition visibility
#[async_trait]
pub trait RecordLocator: Send + Sync {
    async fn locate(&self, record_type: &RecordType, id: RecordId)
        -> Result<Option<RecordSnapshot>>;
}

/// Outcome of the deletion primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Record existed and was removed (snapshot taken before removal)
    Removed(RecordSnapshot),
    /// Nothing to delete (already gone or never existed)
    NotFound,
}

/// Deletion primitive
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Remove one record; repeated calls yield `NotFound`
    async fn delete(&self, record_type: &RecordType, id: RecordId) -> Result<DeleteOutcome>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    /// In-memory store implementing all three record ports.
    ///
    /// Lookups ignore partitions (all-partitions behaviour).
    #[derive(Default)]
    pub struct InMemoryRecordStore {
        records: Mutex<BTreeMap<(String, RecordId), RecordSnapshot>>,
        deleted: Mutex<Vec<RecordId>>,
        fail_next: Mutex<Option<String>>,
        rejected: Mutex<HashMap<RecordId, String>>,
    }

    impl InMemoryRecordStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, record: RecordSnapshot) {
            self.records
                .lock()
                .unwrap()
                .insert((record.record_type.as_str().to_string(), record.id), record);
        }

        /// Remove a record behind the engine's back
        pub fn remove_externally(&self, record_type: &RecordType, id: RecordId) {
            self.records
                .lock()
                .unwrap()
                .remove(&(record_type.as_str().to_string(), id));
        }

        pub fn contains(&self, record_type: &RecordType, id: RecordId) -> bool {
            self.records
                .lock()
                .unwrap()
                .contains_key(&(record_type.as_str().to_string(), id))
        }

        pub fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        /// Identifiers removed through `delete`, in call order
        pub fn deleted(&self) -> Vec<RecordId> {
            self.deleted.lock().unwrap().clone()
        }

        /// Make the next lookup or delete fail with a transient storage error
        pub fn fail_next(&self, message: impl Into<String>) {
            *self.fail_next.lock().unwrap() = Some(message.into());
        }

        /// Every delete of `id` fails with a permanent storage error
        pub fn reject(&self, id: RecordId, message: impl Into<String>) {
            self.rejected.lock().unwrap().insert(id, message.into());
        }

        fn take_failure(&self) -> Result<()> {
            match self.fail_next.lock().unwrap().take() {
                Some(msg) => Err(AppError::StorageUnavailable(msg)),
                None => Ok(()),
            }
        }

        fn matching(&self, query: &RecordQuery) -> Vec<RecordId> {
            self.records
                .lock()
                .unwrap()
                .values()
                .filter(|r| r.record_type == query.record_type)
                .filter(|r| query.partition.is_none() || r.partition == query.partition)
                .filter(|r| query.created_before.map_or(true, |c| r.created_at < c))
                .map(|r| r.id)
                .collect()
        }
    }

    #[async_trait]
    impl RecordSetProvider for InMemoryRecordStore {
        async fn candidate_ids(&self, query: &RecordQuery) -> Result<Vec<RecordId>> {
            Ok(self.matching(query))
        }

        async fn count(&self, query: &RecordQuery) -> Result<u64> {
            Ok(self.matching(query).len() as u64)
        }
    }

    #[async_trait]
    impl RecordLocator for InMemoryRecordStore {
        async fn locate(
            &self,
            record_type: &RecordType,
            id: RecordId,
        ) -> Result<Option<RecordSnapshot>> {
            self.take_failure()?;
            Ok(self
                .records
                .lock()
                .unwrap()
                .get(&(record_type.as_str().to_string(), id))
                .cloned())
        }
    }

    #[async_trait]
    impl RecordStore for InMemoryRecordStore {
        async fn delete(&self, record_type: &RecordType, id: RecordId) -> Result<DeleteOutcome> {
            self.take_failure()?;
            if let Some(msg) = self.rejected.lock().unwrap().get(&id) {
                return Err(AppError::Storage(msg.clone()));
            }
            let removed = self
                .records
                .lock()
                .unwrap()
                .remove(&(record_type.as_str().to_string(), id));
            match removed {
                Some(record) => {
                    self.deleted.lock().unwrap().push(id);
                    Ok(DeleteOutcome::Removed(record))
                }
                None => Ok(DeleteOutcome::NotFound),
            }
        }
    }
}
