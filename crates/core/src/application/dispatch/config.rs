// Dispatcher configuration

use crate::domain::{AgeCutoff, AgeCutoffPreset, DELETE_NOW_KEY};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;

/// Candidate count above which deletion is deferred to a queued job
pub const DEFAULT_QUEUE_THRESHOLD: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DispatcherConfig {
    /// Negative disables queuing, 0 queues every non-empty set
    #[serde(default = "default_threshold")]
    pub threshold: i64,

    /// Age restrictions offered next to "delete all", in display order
    #[serde(default)]
    pub age_cutoffs: Vec<AgeCutoffPreset>,
}

fn default_threshold() -> i64 {
    DEFAULT_QUEUE_THRESHOLD
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_QUEUE_THRESHOLD,
            age_cutoffs: Vec::new(),
        }
    }
}

impl DispatcherConfig {
    pub fn with_threshold(threshold: i64) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    pub fn with_age_cutoffs(mut self, presets: Vec<AgeCutoffPreset>) -> Self {
        self.age_cutoffs = presets;
        self
    }

    /// Whether `count` candidates go to the background queue
    pub fn should_queue(&self, count: u64) -> bool {
        self.threshold >= 0 && count > self.threshold as u64
    }

    /// Check every preset key parses and is unique
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for preset in &self.age_cutoffs {
            if preset.key == DELETE_NOW_KEY {
                return Err(AppError::InvalidConfiguration(format!(
                    "Age cutoff key '{}' is reserved",
                    DELETE_NOW_KEY
                )));
            }
            preset.cutoff().map_err(|e| {
                AppError::InvalidConfiguration(format!("Age cutoff '{}': {}", preset.key, e))
            })?;
            if !seen.insert(preset.key.as_str()) {
                return Err(AppError::InvalidConfiguration(format!(
                    "Duplicate age cutoff key '{}'",
                    preset.key
                )));
            }
        }
        Ok(())
    }

    /// Cutoff instant for an option key; `None` means no age restriction
    pub fn resolve_cutoff(
        &self,
        key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let key = match key.map(str::trim) {
            None | Some("") | Some(DELETE_NOW_KEY) => return Ok(None),
            Some(key) => key,
        };

        let cutoff: AgeCutoff = key.parse().map_err(|e| {
            AppError::InvalidConfiguration(format!("Age cutoff '{}': {}", key, e))
        })?;
        let instant = cutoff
            .cutoff_from(now)
            .map_err(|e| AppError::InvalidConfiguration(e.to_string()))?;
        Ok(Some(instant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_default_threshold() {
        let config = DispatcherConfig::default();
        assert_eq!(config.threshold, 50);
        assert!(!config.should_queue(50));
        assert!(config.should_queue(51));
    }

    #[test]
    fn test_threshold_boundaries() {
        assert!(!DispatcherConfig::with_threshold(-1).should_queue(10_000));
        assert!(DispatcherConfig::with_threshold(0).should_queue(1));
        assert!(!DispatcherConfig::with_threshold(0).should_queue(0));
    }

    #[test]
    fn test_resolve_cutoff() {
        let config = DispatcherConfig::default();
        assert_eq!(config.resolve_cutoff(None, now()).unwrap(), None);
        assert_eq!(config.resolve_cutoff(Some("now"), now()).unwrap(), None);
        assert_eq!(config.resolve_cutoff(Some(" "), now()).unwrap(), None);
        assert_eq!(
            config.resolve_cutoff(Some("1 week"), now()).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap())
        );

        let err = config.resolve_cutoff(Some("soon"), now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_validate_presets() {
        let ok = DispatcherConfig::default().with_age_cutoffs(vec![
            AgeCutoffPreset::new("3 months", "Older than 3 months ({count})"),
            AgeCutoffPreset::new("1 year", "Older than a year ({count})"),
        ]);
        assert!(ok.validate().is_ok());

        let malformed = DispatcherConfig::default()
            .with_age_cutoffs(vec![AgeCutoffPreset::new("a while", "Old")]);
        assert!(malformed.validate().is_err());

        let duplicate = DispatcherConfig::default().with_age_cutoffs(vec![
            AgeCutoffPreset::new("1 day", "a"),
            AgeCutoffPreset::new("1 day", "b"),
        ]);
        assert!(duplicate.validate().is_err());

        let reserved =
            DispatcherConfig::default().with_age_cutoffs(vec![AgeCutoffPreset::new("now", "x")]);
        assert!(reserved.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: DispatcherConfig = serde_json::from_str(
            r#"{"age_cutoffs":[{"key":"6 months","label":"Older than 6 months (%s)"}]}"#,
        )
        .unwrap();
        assert_eq!(config.threshold, DEFAULT_QUEUE_THRESHOLD);
        assert_eq!(config.age_cutoffs.len(), 1);
    }
}
