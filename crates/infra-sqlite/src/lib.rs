// Sweeper Infrastructure - SQLite Adapter
// Implements: JobQueue, RecordSetProvider, RecordStore, RecordLocator, IdentityResolver

mod connection;
mod error;
mod identity;
mod job_queue;
mod migration;
mod record_store;

pub use connection::create_pool;
pub use identity::SqliteIdentityResolver;
pub use job_queue::SqliteJobQueue;
pub use migration::run_migrations;
pub use record_store::{AllPartitionsLocator, SingleScopeLocator, SqliteRecordStore};

// Note: sqlx::Error conversion is handled by a helper function (error.rs)
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
