//! Sweeper - background worker for queued bulk deletions

mod settings;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use settings::DaemonConfig;
use sweeper_core::application::{
    shutdown_channel, BatchDeletionProcessor, CompletionNotifier, RecoveryService, Worker,
};
use sweeper_core::domain::JobState;
use sweeper_core::port::time_provider::SystemTimeProvider;
use sweeper_core::port::{JobQueue, RecordLocator, TracingJobLogger};
use sweeper_infra_sqlite::{
    create_pool, run_migrations, AllPartitionsLocator, SingleScopeLocator, SqliteIdentityResolver,
    SqliteJobQueue, SqliteRecordStore,
};
use sweeper_infra_system::SendmailNotifier;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging: SWEEPER_LOG_FORMAT=json for production, pretty otherwise
    let log_format = std::env::var("SWEEPER_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_env("SWEEPER_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new("sweeper=info"))
        .context("Failed to create env filter")?;

    let fmt_layer = match log_format.as_str() {
        "json" => fmt::layer().json().boxed(),
        _ => fmt::layer().pretty().boxed(),
    };

    let (otel_layer, otel_error) = match telemetry::layer() {
        Ok(layer) => (layer, None),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    info!("Sweeper v{} starting...", VERSION);
    if let Some(e) = otel_error {
        warn!(error = %e, "OpenTelemetry disabled");
    }

    // 2. Configuration
    let config = DaemonConfig::load()?;
    let database_url = config.database_url();

    if let Some(dir) = config.database_dir() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create database directory {}", dir.display()))?;
    }

    info!(database_url = %database_url, "Initializing database...");

    // 3. Database
    let pool = create_pool(&database_url)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let queue = Arc::new(SqliteJobQueue::new(pool.clone(), time_provider.clone()));
    let store = Arc::new(SqliteRecordStore::new(pool.clone()));

    let locator: Arc<dyn RecordLocator> = if config.records.multi_partition {
        Arc::new(AllPartitionsLocator::new(pool.clone()))
    } else {
        Arc::new(SingleScopeLocator::new(
            pool.clone(),
            config.records.partition,
        ))
    };

    let mut sendmail =
        SendmailNotifier::new(config.sendmail_path()).with_timeout(config.send_timeout());
    if let Some(from) = &config.mail.from {
        sendmail = sendmail.with_from(from);
    }
    let notifier = Arc::new(CompletionNotifier::new(
        Arc::new(SqliteIdentityResolver::new(pool.clone())),
        Arc::new(sendmail),
    ));

    let processor = Arc::new(BatchDeletionProcessor::new(
        locator,
        store,
        Arc::new(TracingJobLogger),
        notifier,
        time_provider.clone(),
    ));

    // 5. Abandoned lease recovery
    info!("Running lease recovery...");
    let recovery_service = RecoveryService::new(
        queue.clone(),
        time_provider.clone(),
        Some(config.recovery_window_ms()),
    );
    match recovery_service.recover_abandoned_leases().await {
        Ok(count) => info!(released_jobs = count, "Lease recovery completed"),
        Err(e) => error!(error = ?e, "Lease recovery failed"),
    }

    for state in [JobState::Pending, JobState::Ready, JobState::Running] {
        match queue.count_by_state(state).await {
            Ok(count) => info!(state = %state, count, "Queued deletion jobs"),
            Err(e) => warn!(state = %state, error = %e, "Cannot count jobs"),
        }
    }

    // 6. Worker
    info!(
        steps_per_lease = config.queue.steps_per_lease,
        multi_partition = config.records.multi_partition,
        "Starting worker..."
    );
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let worker =
        Worker::new(queue.clone(), processor).with_steps_per_lease(config.queue.steps_per_lease);

    let worker_handle = tokio::spawn(async move {
        if let Err(e) = worker.run(shutdown_rx).await {
            error!(error = ?e, "Worker failed");
        }
    });

    info!("System ready. Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown: the worker finishes its current step
    shutdown_tx.shutdown();
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), worker_handle).await;
    pool.close().await;

    info!("Shutdown complete.");

    Ok(())
}
