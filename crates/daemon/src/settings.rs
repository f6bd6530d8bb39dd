//! Daemon configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file (`SWEEPER_CONFIG`, default `sweeper.toml`), then `SWEEPER_*`
//! environment variables with `__` between nested keys
//! (`SWEEPER_QUEUE__THRESHOLD=100`).
//!
//! The daemon itself only runs queued jobs: it reads `database_url`,
//! `queue.steps_per_lease`, `queue.recovery_window_secs`, `records` and
//! `mail`. `queue.threshold` and `age_cutoffs` configure the dispatcher of
//! the host application that enqueues jobs into the same database; they are
//! validated here so a shared config file fails fast, and handed over
//! through `DaemonConfig::dispatcher`.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use sweeper_core::application::worker::constants::{
    DEFAULT_RECOVERY_WINDOW_MS, DEFAULT_STEPS_PER_LEASE,
};
use sweeper_core::application::{DispatcherConfig, DEFAULT_QUEUE_THRESHOLD};
use sweeper_core::domain::{AgeCutoffPreset, PartitionId};
use sweeper_infra_system::sendmail::{DEFAULT_SENDMAIL_PATH, DEFAULT_SEND_TIMEOUT};

const DEFAULT_CONFIG_FILE: &str = "sweeper.toml";
const DEFAULT_DATABASE_URL: &str = "sqlite://~/.sweeper/sweeper.db";

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub age_cutoffs: Vec<AgeCutoffPreset>,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Dispatcher setting for the enqueueing host; negative disables the
    /// background queue. Not used by the worker.
    pub threshold: i64,
    pub steps_per_lease: usize,
    pub recovery_window_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_QUEUE_THRESHOLD,
            steps_per_lease: DEFAULT_STEPS_PER_LEASE,
            recovery_window_secs: (DEFAULT_RECOVERY_WINDOW_MS / 1000) as u64,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordsConfig {
    /// Look records up across every partition when deleting
    pub multi_partition: bool,
    /// Partition used by single-scope lookups (unset = default partition)
    pub partition: Option<PartitionId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub sendmail_path: String,
    pub from: Option<String>,
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sendmail_path: DEFAULT_SENDMAIL_PATH.to_string(),
            from: None,
            timeout_secs: DEFAULT_SEND_TIMEOUT.as_secs(),
        }
    }
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

impl DaemonConfig {
    /// Load from `SWEEPER_CONFIG` (or `./sweeper.toml`) and the environment
    pub fn load() -> Result<Self> {
        let (path, required) = match std::env::var("SWEEPER_CONFIG") {
            Ok(path) => (shellexpand::tilde(&path).into_owned(), true),
            Err(_) => (DEFAULT_CONFIG_FILE.to_string(), false),
        };

        let settings = Config::builder()
            .add_source(File::new(&path, FileFormat::Toml).required(required))
            .add_source(
                Environment::with_prefix("SWEEPER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration ({})", path))?;

        Self::from_settings(settings)
    }

    /// Parse a TOML document (no environment overlay)
    pub fn from_toml(toml: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Self::from_settings(settings)
    }

    fn from_settings(settings: Config) -> Result<Self> {
        let config: DaemonConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        config
            .dispatcher()
            .validate()
            .context("Invalid age cutoff presets")?;
        Ok(config)
    }

    /// Database URL with `~` expanded in the file path
    pub fn database_url(&self) -> String {
        match self.database_url.strip_prefix("sqlite://") {
            Some(path) => format!("sqlite://{}", shellexpand::tilde(path)),
            None => self.database_url.clone(),
        }
    }

    /// Directory that must exist before the database file can be created
    pub fn database_dir(&self) -> Option<PathBuf> {
        let url = self.database_url();
        let path = url.strip_prefix("sqlite://")?.split('?').next()?;
        if path.is_empty() || path.contains(":memory:") {
            return None;
        }
        PathBuf::from(path).parent().map(PathBuf::from)
    }

    pub fn sendmail_path(&self) -> String {
        shellexpand::tilde(&self.mail.sendmail_path).into_owned()
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.mail.timeout_secs.max(1))
    }

    pub fn recovery_window_ms(&self) -> i64 {
        (self.queue.recovery_window_secs as i64).saturating_mul(1000)
    }

    /// Dispatcher settings for the host application
    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig::with_threshold(self.queue.threshold)
            .with_age_cutoffs(self.age_cutoffs.clone())
    }
}
