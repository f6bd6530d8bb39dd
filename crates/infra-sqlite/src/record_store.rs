// SQLite record store and locators

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;
use sweeper_core::domain::{PartitionId, RecordId, RecordQuery, RecordSnapshot, RecordType};
use sweeper_core::error::{AppError, Result};
use sweeper_core::port::{DeleteOutcome, RecordLocator, RecordSetProvider, RecordStore};
use tracing::debug;

#[derive(sqlx::FromRow)]
struct RecordRow {
    record_type: String,
    id: i64,
    partition_id: Option<i64>,
    created_at: i64, // epoch ms
}

impl RecordRow {
    fn into_snapshot(self) -> Result<RecordSnapshot> {
        let created_at = Utc
            .timestamp_millis_opt(self.created_at)
            .single()
            .ok_or_else(|| {
                AppError::Storage(format!(
                    "Record {} {} has invalid created_at {}",
                    self.record_type, self.id, self.created_at
                ))
            })?;
        Ok(RecordSnapshot {
            record_type: RecordType::new(self.record_type),
            id: self.id,
            partition: self.partition_id,
            created_at,
        })
    }
}

/// Records table: candidate sets and the deletion primitive
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Add or replace a record
    pub async fn insert(&self, record: &RecordSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO records (record_type, id, partition_id, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (record_type, id) DO UPDATE
            SET partition_id = excluded.partition_id, created_at = excluded.created_at
            "#,
        )
        .bind(record.record_type.as_str())
        .bind(record.id)
        .bind(record.partition)
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl RecordSetProvider for SqliteRecordStore {
    async fn candidate_ids(&self, query: &RecordQuery) -> Result<Vec<RecordId>> {
        let cutoff = query.created_before.map(|c| c.timestamp_millis());
        sqlx::query_scalar::<_, RecordId>(
            r#"
            SELECT id FROM records
            WHERE record_type = ?
              AND (? IS NULL OR partition_id = ?)
              AND (? IS NULL OR created_at < ?)
            ORDER BY id ASC
            "#,
        )
        .bind(query.record_type.as_str())
        .bind(query.partition)
        .bind(query.partition)
        .bind(cutoff)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn count(&self, query: &RecordQuery) -> Result<u64> {
        let cutoff = query.created_before.map(|c| c.timestamp_millis());
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM records
            WHERE record_type = ?
              AND (? IS NULL OR partition_id = ?)
              AND (? IS NULL OR created_at < ?)
            "#,
        )
        .bind(query.record_type.as_str())
        .bind(query.partition)
        .bind(query.partition)
        .bind(cutoff)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn delete(&self, record_type: &RecordType, id: RecordId) -> Result<DeleteOutcome> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            DELETE FROM records
            WHERE record_type = ? AND id = ?
            RETURNING record_type, id, partition_id, created_at
            "#,
        )
        .bind(record_type.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Ok(DeleteOutcome::Removed(row.into_snapshot()?)),
            None => {
                debug!(record_type = %record_type, record_id = id, "Delete found nothing");
                Ok(DeleteOutcome::NotFound)
            }
        }
    }
}

/// Looks a record up only within one partition (`None` = default partition)
pub struct SingleScopeLocator {
    pool: SqlitePool,
    partition: Option<PartitionId>,
}

impl SingleScopeLocator {
    pub fn new(pool: SqlitePool, partition: Option<PartitionId>) -> Self {
        Self { pool, partition }
    }
}

#[async_trait]
impl RecordLocator for SingleScopeLocator {
    async fn locate(
        &self,
        record_type: &RecordType,
        id: RecordId,
    ) -> Result<Option<RecordSnapshot>> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT record_type, id, partition_id, created_at FROM records
            WHERE record_type = ? AND id = ? AND partition_id IS ?
            "#,
        )
        .bind(record_type.as_str())
        .bind(id)
        .bind(self.partition)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(RecordRow::into_snapshot).transpose()
    }
}

/// Looks a record up regardless of which partition it lives in
pub struct AllPartitionsLocator {
    pool: SqlitePool,
}

impl AllPartitionsLocator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordLocator for AllPartitionsLocator {
    async fn locate(
        &self,
        record_type: &RecordType,
        id: RecordId,
    ) -> Result<Option<RecordSnapshot>> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT record_type, id, partition_id, created_at FROM records
            WHERE record_type = ? AND id = ?
            "#,
        )
        .bind(record_type.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(RecordRow::into_snapshot).transpose()
    }
}
