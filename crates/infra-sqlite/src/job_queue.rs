// SQLite JobQueue Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use sweeper_core::domain::{BatchDeletionJob, JobId, JobState, RecordType};
use sweeper_core::error::{AppError, Result};
use sweeper_core::port::{JobQueue, TimeProvider};
use tracing::debug;

pub struct SqliteJobQueue {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job: &BatchDeletionJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO deletion_jobs (
                id, record_type, title, initiator_id,
                candidate_ids, remaining, total_steps, current_step,
                state, messages, created_at, finished_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(job.record_type.as_str())
        .bind(&job.title)
        .bind(job.initiator_id)
        .bind(serde_json::to_string(&job.candidate_ids)?)
        .bind(serde_json::to_string(&job.remaining)?)
        .bind(job.total_steps as i64)
        .bind(job.current_step as i64)
        .bind(job.state.to_string())
        .bind(serde_json::to_string(&job.messages)?)
        .bind(job.created_at)
        .bind(job.finished_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<BatchDeletionJob>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM deletion_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn lease_next(&self) -> Result<Option<BatchDeletionJob>> {
        let now = self.time_provider.now_millis();

        // Single statement: two workers can never lease the same row
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE deletion_jobs
            SET leased_at = ?
            WHERE id = (
                SELECT id FROM deletion_jobs
                WHERE state != ? AND leased_at IS NULL
                ORDER BY created_at ASC, rowid ASC
                LIMIT 1
            )
            AND leased_at IS NULL
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(JobState::Complete.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = &row {
            debug!(job_id = %row.id, leased_at = now, "Job leased");
        }
        row.map(JobRow::into_job).transpose()
    }

    async fn save(&self, job: &BatchDeletionJob) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE deletion_jobs
            SET remaining = ?, current_step = ?, state = ?, messages = ?, finished_at = ?
            WHERE id = ?
            "#,
        )
        .bind(serde_json::to_string(&job.remaining)?)
        .bind(job.current_step as i64)
        .bind(job.state.to_string())
        .bind(serde_json::to_string(&job.messages)?)
        .bind(job.finished_at)
        .bind(&job.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {} not found", job.id)));
        }
        Ok(())
    }

    async fn release(&self, id: &JobId) -> Result<()> {
        sqlx::query("UPDATE deletion_jobs SET leased_at = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn release_stale_leases(&self, leased_before: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE deletion_jobs
            SET leased_at = NULL
            WHERE leased_at IS NOT NULL AND leased_at < ? AND state != ?
            "#,
        )
        .bind(leased_before)
        .bind(JobState::Complete.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn count_by_state(&self, state: JobState) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM deletion_jobs WHERE state = ?")
            .bind(state.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    record_type: String,
    title: String,
    initiator_id: Option<i64>,
    candidate_ids: String, // JSON
    remaining: String,     // JSON
    total_steps: i64,
    current_step: i64,
    state: String,
    messages: String, // JSON
    created_at: i64,
    finished_at: Option<i64>,
}

impl JobRow {
    fn into_job(self) -> Result<BatchDeletionJob> {
        let state = JobState::parse(&self.state).ok_or_else(|| {
            AppError::Storage(format!("Job {} has unknown state {}", self.id, self.state))
        })?;

        Ok(BatchDeletionJob {
            id: self.id,
            record_type: RecordType::new(self.record_type),
            title: self.title,
            initiator_id: self.initiator_id,
            candidate_ids: serde_json::from_str(&self.candidate_ids)?,
            remaining: serde_json::from_str(&self.remaining)?,
            total_steps: self.total_steps.max(0) as u64,
            current_step: self.current_step.max(0) as u64,
            state,
            messages: serde_json::from_str(&self.messages)?,
            created_at: self.created_at,
            finished_at: self.finished_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use sweeper_core::domain::{DeletionRequest, JobMessage, Severity};
    use sweeper_core::port::time_provider::SystemTimeProvider;

    async fn setup_test_db() -> (SqlitePool, Arc<dyn TimeProvider>) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let time_provider = Arc::new(SystemTimeProvider);
        (pool, time_provider)
    }

    fn job(id: &str, created_at: i64, ids: Vec<i64>) -> BatchDeletionJob {
        let req = DeletionRequest::new(RecordType::new("Comment"), ids, Some(3), None, None);
        BatchDeletionJob::new(id, created_at, req)
    }

    #[tokio::test]
    async fn test_enqueue_and_find() {
        let (pool, time_provider) = setup_test_db().await;
        let queue = SqliteJobQueue::new(pool, time_provider);

        let job = job("job-1", 100, vec![4, 5, 6]);
        queue.enqueue(&job).await.unwrap();

        let found = queue.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(found, job);
        assert!(queue
            .find_by_id(&"missing".to_string())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_enqueue_is_storage_error() {
        let (pool, time_provider) = setup_test_db().await;
        let queue = SqliteJobQueue::new(pool, time_provider);

        queue.enqueue(&job("job-1", 100, vec![1])).await.unwrap();
        let err = queue.enqueue(&job("job-1", 100, vec![1])).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(msg) if msg.contains("Unique")));
    }

    #[tokio::test]
    async fn test_lease_is_fifo_and_exclusive() {
        let (pool, time_provider) = setup_test_db().await;
        let queue = SqliteJobQueue::new(pool, time_provider);

        queue.enqueue(&job("job-late", 200, vec![1])).await.unwrap();
        queue.enqueue(&job("job-early", 100, vec![2])).await.unwrap();

        let first = queue.lease_next().await.unwrap().unwrap();
        assert_eq!(first.id, "job-early");
        let second = queue.lease_next().await.unwrap().unwrap();
        assert_eq!(second.id, "job-late");
        assert!(queue.lease_next().await.unwrap().is_none());

        queue.release(&first.id).await.unwrap();
        let again = queue.lease_next().await.unwrap().unwrap();
        assert_eq!(again.id, "job-early");
    }

    #[tokio::test]
    async fn test_save_persists_progress() {
        let (pool, time_provider) = setup_test_db().await;
        let queue = SqliteJobQueue::new(pool, time_provider);

        let mut job = job("job-1", 100, vec![7, 8]);
        queue.enqueue(&job).await.unwrap();

        job.setup().unwrap();
        job.record_step(7, JobMessage::new(150, Severity::Info, "Deleted Comment ID 7"))
            .unwrap();
        queue.save(&job).await.unwrap();

        let found = queue.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(found.state, JobState::Running);
        assert_eq!(found.current_step, 1);
        assert_eq!(found.next_id(), Some(8));
        assert_eq!(found.messages.len(), 1);
        assert_eq!(found.candidate_ids, vec![7, 8]);
    }

    #[tokio::test]
    async fn test_save_unknown_job_is_not_found() {
        let (pool, time_provider) = setup_test_db().await;
        let queue = SqliteJobQueue::new(pool, time_provider);

        let err = queue.save(&job("ghost", 1, vec![1])).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_complete_jobs_are_not_leased() {
        let (pool, time_provider) = setup_test_db().await;
        let queue = SqliteJobQueue::new(pool, time_provider);

        let mut job = job("job-1", 100, vec![]);
        queue.enqueue(&job).await.unwrap();
        job.setup().unwrap();
        job.complete(200).unwrap();
        queue.save(&job).await.unwrap();

        assert!(queue.lease_next().await.unwrap().is_none());
        assert_eq!(queue.count_by_state(JobState::Complete).await.unwrap(), 1);
        assert_eq!(queue.count_by_state(JobState::Pending).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_release_stale_leases() {
        let (pool, time_provider) = setup_test_db().await;
        let queue = SqliteJobQueue::new(pool, time_provider.clone());

        queue.enqueue(&job("job-1", 100, vec![1])).await.unwrap();
        let leased = queue.lease_next().await.unwrap().unwrap();

        // lease is newer than the cutoff
        let released = queue.release_stale_leases(0).await.unwrap();
        assert_eq!(released, 0);
        assert!(queue.lease_next().await.unwrap().is_none());

        let future = time_provider.now_millis() + 60_000;
        let released = queue.release_stale_leases(future).await.unwrap();
        assert_eq!(released, 1);
        assert_eq!(queue.lease_next().await.unwrap().unwrap().id, leased.id);
    }

    #[tokio::test]
    async fn test_concurrent_leases_hand_out_one_job_once() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("queue.db").display());
        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let queue = Arc::new(SqliteJobQueue::new(pool.clone(), Arc::new(SystemTimeProvider)));

        for round in 0..10 {
            // earlier rounds' jobs stay leased, so exactly one is eligible
            let id = format!("job-{}", round);
            queue.enqueue(&job(&id, round, vec![1])).await.unwrap();

            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    tokio::spawn(async move { queue.lease_next().await })
                })
                .collect();

            let mut leased = Vec::new();
            for handle in handles {
                if let Some(job) = handle.await.unwrap().unwrap() {
                    leased.push(job.id);
                }
            }
            assert_eq!(leased, vec![id], "round {round}");
        }

        pool.close().await;
    }
}
