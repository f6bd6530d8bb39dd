// Job Logger Port
//
// Out-of-band diagnostics for per-record outcomes (records that vanished
// before their step ran).

use crate::domain::Severity;
use tracing::{error, info, warn};

pub trait JobLogger: Send + Sync {
    fn log(&self, severity: Severity, message: &str);
}

/// Forwards job diagnostics to `tracing` (production)
pub struct TracingJobLogger;

impl JobLogger for TracingJobLogger {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Bad => error!(target: "sweeper::job", "{}", message),
            Severity::Warning => warn!(target: "sweeper::job", "{}", message),
            Severity::Good | Severity::Info => info!(target: "sweeper::job", "{}", message),
        }
    }
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every logged line for assertions
    #[derive(Default)]
    pub struct RecordingJobLogger {
        lines: Mutex<Vec<(Severity, String)>>,
    }

    impl RecordingJobLogger {
        pub fn lines(&self) -> Vec<(Severity, String)> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl JobLogger for RecordingJobLogger {
        fn log(&self, severity: Severity, message: &str) {
            self.lines
                .lock()
                .unwrap()
                .push((severity, message.to_string()));
        }
    }
}
