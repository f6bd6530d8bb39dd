// Worker constants
use std::time::Duration;

/// Sleep when no job is waiting (500ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(500);

/// Sleep after a failed lease before trying again (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// `process()` calls per lease before the job goes back to the queue
pub const DEFAULT_STEPS_PER_LEASE: usize = 25;

/// Leases older than this are considered abandoned (5 minutes)
pub const DEFAULT_RECOVERY_WINDOW_MS: i64 = 5 * 60 * 1000;
