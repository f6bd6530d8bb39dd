//! Bulk delete flow over SQLite
//!
//! Dispatcher decisions (synchronous vs queued) and the queued job's
//! step-by-step behaviour against real adapters.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use sqlx::SqlitePool;
use sweeper_core::application::dispatch::STATUS_HEADER;
use sweeper_core::application::{
    BatchDeletionProcessor, CompletionNotifier, DeletionDispatcher, DispatchOutcome,
    DispatchRequest, DispatchResponse, DispatcherConfig, NotificationOutcome, StepOutcome,
    Worker,
};
use sweeper_core::domain::{
    AgeCutoffPreset, JobState, RecordId, RecordQuery, RecordSnapshot, RecordType, Severity,
};
use sweeper_core::port::id_provider::UuidProvider;
use sweeper_core::port::job_logger::mocks::RecordingJobLogger;
use sweeper_core::port::notification::mocks::RecordingNotificationSender;
use sweeper_core::port::time_provider::SystemTimeProvider;
use sweeper_core::port::{Identity, JobQueue, RecordSetProvider, RecordStore};
use sweeper_infra_sqlite::{
    create_pool, run_migrations, AllPartitionsLocator, SqliteIdentityResolver, SqliteJobQueue,
    SqliteRecordStore,
};

struct Env {
    store: Arc<SqliteRecordStore>,
    queue: Arc<SqliteJobQueue>,
    sender: Arc<RecordingNotificationSender>,
    logger: Arc<RecordingJobLogger>,
    processor: Arc<BatchDeletionProcessor>,
}

fn page() -> RecordType {
    RecordType::new("Page")
}

async fn setup(pool: SqlitePool) -> Env {
    run_migrations(&pool).await.unwrap();
    let time_provider = Arc::new(SystemTimeProvider);

    let identities = Arc::new(SqliteIdentityResolver::new(pool.clone()));
    identities
        .upsert(&Identity {
            id: 1,
            display_name: "Ada Admin".to_string(),
            email: Some("ada@example.com".to_string()),
        })
        .await
        .unwrap();

    let store = Arc::new(SqliteRecordStore::new(pool.clone()));
    let queue = Arc::new(SqliteJobQueue::new(pool.clone(), time_provider.clone()));
    let sender = Arc::new(RecordingNotificationSender::new());
    let logger = Arc::new(RecordingJobLogger::default());
    let processor = Arc::new(BatchDeletionProcessor::new(
        Arc::new(AllPartitionsLocator::new(pool)),
        store.clone(),
        logger.clone(),
        Arc::new(CompletionNotifier::new(identities, sender.clone())),
        time_provider,
    ));

    Env {
        store,
        queue,
        sender,
        logger,
        processor,
    }
}

async fn memory_env() -> Env {
    setup(create_pool("sqlite::memory:").await.unwrap()).await
}

async fn seed(env: &Env, ids: impl IntoIterator<Item = RecordId>) {
    let created = Utc.with_ymd_and_hms(2023, 1, 2, 9, 15, 0).unwrap();
    for id in ids {
        env.store
            .insert(&RecordSnapshot::new(page(), id, created))
            .await
            .unwrap();
    }
}

fn dispatcher(env: &Env, threshold: i64) -> DeletionDispatcher {
    DeletionDispatcher::new(
        env.store.clone(),
        env.store.clone(),
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
        DispatcherConfig::with_threshold(threshold),
    )
    .with_queue(env.queue.clone())
}

fn all_pages() -> DispatchRequest {
    DispatchRequest::new(RecordQuery::new(page()))
        .initiated_by(1)
        .from_source("Pages")
}

/// Three records under threshold 50 are deleted inside the call
#[tokio::test]
async fn test_small_set_deleted_synchronously() {
    let env = memory_env().await;
    seed(&env, [1, 2, 3]).await;
    let mut response = DispatchResponse::new();

    let outcome = dispatcher(&env, 50)
        .dispatch(all_pages(), &mut response)
        .await
        .unwrap();

    assert!(matches!(outcome, DispatchOutcome::Deleted { deleted: 3, .. }));
    assert_eq!(response.status_code, 200);
    assert_eq!(
        response.header(STATUS_HEADER),
        Some("3 records have been successfully deleted.")
    );
    assert_eq!(
        env.store.count(&RecordQuery::new(page())).await.unwrap(),
        0
    );
    assert_eq!(env.queue.count_by_state(JobState::Pending).await.unwrap(), 0);
}

/// 100 records over threshold 50 become a job; 100 steps plus the completing
/// call finish it
#[tokio::test]
async fn test_large_set_queued_and_processed_step_by_step() {
    let env = memory_env().await;
    seed(&env, 1..=100).await;

    let outcome = dispatcher(&env, 50)
        .dispatch(all_pages(), &mut DispatchResponse::new())
        .await
        .unwrap();
    let DispatchOutcome::Queued {
        job_id,
        total_steps,
        status,
    } = outcome
    else {
        panic!("expected queued job, got {outcome:?}");
    };
    assert_eq!(total_steps, 100);
    assert_eq!(status.severity, Severity::Warning);
    assert_eq!(
        env.store.count(&RecordQuery::new(page())).await.unwrap(),
        100,
        "dispatcher must not delete queued records"
    );

    let mut job = env.queue.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.title, "Delete 100 record (Page) from Pages");
    job.setup().unwrap();

    for step in 1..=100u64 {
        let outcome = env.processor.process(&mut job).await.unwrap();
        assert!(matches!(outcome, StepOutcome::Deleted(_)));
        assert_eq!(job.current_step, step);
        assert!(!job.is_complete());
    }

    let outcome = env.processor.process(&mut job).await.unwrap();
    assert_eq!(outcome, StepOutcome::Completed);
    assert!(job.is_complete());
    assert_eq!(job.current_step, 100);

    // the notice goes out once the complete state is stored
    assert!(env.sender.sent().is_empty());
    env.queue.save(&job).await.unwrap();
    assert_eq!(
        env.processor.notify_completion(&job).await,
        NotificationOutcome::Sent
    );

    // order preserved in the message log
    let deleted: Vec<String> = job
        .messages
        .iter()
        .take(100)
        .map(|m| m.text.clone())
        .collect();
    for (i, text) in deleted.iter().enumerate() {
        assert!(
            text.starts_with(&format!("Deleted Page ID {} (", i + 1)),
            "{text}"
        );
    }

    let sent = env.sender.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("100 records have been deleted."));
}

/// A record removed by someone else is logged and still counts as a step
#[tokio::test]
async fn test_externally_deleted_record_counts_as_step() {
    let env = memory_env().await;
    seed(&env, [5, 6]).await;

    let outcome = dispatcher(&env, 0)
        .dispatch(all_pages(), &mut DispatchResponse::new())
        .await
        .unwrap();
    let DispatchOutcome::Queued { job_id, .. } = outcome else {
        panic!("expected queued job");
    };

    env.store.delete(&page(), 5).await.unwrap();

    let mut job = env.queue.find_by_id(&job_id).await.unwrap().unwrap();
    job.setup().unwrap();

    assert_eq!(
        env.processor.process(&mut job).await.unwrap(),
        StepOutcome::NotFound(5)
    );
    assert_eq!(job.current_step, 1);
    assert_eq!(job.messages[0].text, "Page ID 5 not found!");
    assert_eq!(job.messages[0].severity, Severity::Warning);
    assert_eq!(
        env.logger.lines(),
        vec![(Severity::Warning, "Page ID 5 not found!".to_string())]
    );

    assert_eq!(
        env.processor.process(&mut job).await.unwrap(),
        StepOutcome::Deleted(6)
    );
    assert_eq!(job.current_step, 2);

    assert!(env.processor.process(&mut job).await.unwrap().is_terminal());
    assert!(job.is_complete());
}

/// Negative threshold disables queuing, whatever the size
#[tokio::test]
async fn test_negative_threshold_deletes_everything_synchronously() {
    let env = memory_env().await;
    seed(&env, 1..=10_000).await;

    let outcome = dispatcher(&env, -1)
        .dispatch(all_pages(), &mut DispatchResponse::new())
        .await
        .unwrap();

    assert!(matches!(outcome, DispatchOutcome::Deleted { deleted: 10_000, .. }));
    assert_eq!(
        env.store.count(&RecordQuery::new(page())).await.unwrap(),
        0
    );
    assert_eq!(env.queue.count_by_state(JobState::Pending).await.unwrap(), 0);
}

/// Completion is idempotent and notifies once
#[tokio::test]
async fn test_completed_job_is_inert() {
    let env = memory_env().await;
    seed(&env, [1]).await;

    let DispatchOutcome::Queued { job_id, .. } = dispatcher(&env, 0)
        .dispatch(all_pages(), &mut DispatchResponse::new())
        .await
        .unwrap()
    else {
        panic!("expected queued job");
    };

    let worker = Worker::new(env.queue.clone(), env.processor.clone());
    while worker.process_next_job().await.unwrap() {}

    let mut job = env.queue.find_by_id(&job_id).await.unwrap().unwrap();
    assert!(job.is_complete());
    let snapshot = job.clone();

    for _ in 0..3 {
        assert_eq!(
            env.processor.process(&mut job).await.unwrap(),
            StepOutcome::AlreadyComplete
        );
    }
    assert_eq!(job, snapshot);
    assert_eq!(env.sender.sent().len(), 1);
    assert!(env.queue.lease_next().await.unwrap().is_none());
}

/// Age presets narrow both the options and the dispatch
#[tokio::test]
async fn test_age_cutoff_options_and_dispatch() {
    let env = memory_env().await;
    let now = Utc::now();
    for (id, age_days) in [(1, 800), (2, 400), (3, 40), (4, 1)] {
        env.store
            .insert(&RecordSnapshot::new(page(), id, now - Duration::days(age_days)))
            .await
            .unwrap();
    }

    let d = DeletionDispatcher::new(
        env.store.clone(),
        env.store.clone(),
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
        DispatcherConfig::with_threshold(50).with_age_cutoffs(vec![
            AgeCutoffPreset::new("1 month", "Older than a month ({count})"),
            AgeCutoffPreset::new("1 year", "Older than a year ({count})"),
        ]),
    );

    let labels: Vec<String> = d
        .options(&RecordQuery::new(page()))
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.label)
        .collect();
    assert_eq!(
        labels,
        vec![
            "Delete all 4 records",
            "Older than a month (3)",
            "Older than a year (2)",
        ]
    );

    let outcome = d
        .dispatch(
            DispatchRequest::new(RecordQuery::new(page())).with_age_cutoff("1 year"),
            &mut DispatchResponse::new(),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, DispatchOutcome::Deleted { deleted: 2, .. }));
    assert_eq!(
        env.store.candidate_ids(&RecordQuery::new(page())).await.unwrap(),
        vec![3, 4]
    );
}

/// Real sendmail adapter at the end of a worker-driven job
#[cfg(unix)]
#[tokio::test]
async fn test_completion_mail_through_sendmail_adapter() {
    use sweeper_infra_system::SendmailNotifier;

    let pool = create_pool("sqlite::memory:").await.unwrap();
    let env = setup(pool.clone()).await;
    seed(&env, [1, 2]).await;

    let outbox_dir = tempfile::tempdir().unwrap();
    let outbox = outbox_dir.path().join("completion.eml");
    let sendmail = SendmailNotifier::new("sh")
        .with_args(vec![
            "-c".to_string(),
            format!("cat > '{}'", outbox.display()),
        ])
        .with_from("sweeper@example.com");

    let processor = Arc::new(BatchDeletionProcessor::new(
        Arc::new(AllPartitionsLocator::new(pool.clone())),
        env.store.clone(),
        Arc::new(RecordingJobLogger::default()),
        Arc::new(CompletionNotifier::new(
            Arc::new(SqliteIdentityResolver::new(pool)),
            Arc::new(sendmail),
        )),
        Arc::new(SystemTimeProvider),
    ));

    dispatcher(&env, 0)
        .dispatch(
            all_pages().with_title("Spring cleaning"),
            &mut DispatchResponse::new(),
        )
        .await
        .unwrap();

    let worker = Worker::new(env.queue.clone(), processor);
    while worker.process_next_job().await.unwrap() {}

    let mail = std::fs::read_to_string(&outbox).unwrap();
    assert!(mail.contains("To: ada@example.com\r\n"));
    assert!(mail.contains("Subject: A deletion task requested by you has completed.\r\n"));
    assert!(mail.contains("Hi, Ada Admin"));
    assert!(mail.contains("Job Spring cleaning has completed."));
    assert!(mail.contains("2 records have been deleted."));
}
