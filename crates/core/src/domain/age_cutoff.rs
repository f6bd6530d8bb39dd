//! Age cutoff presets
//!
//! Operators restrict a bulk deletion to records older than a relative
//! duration such as `3 months`. The cutoff instant is the start of the day
//! (UTC) that lies that far in the past.

use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::{DomainError, Result};

/// Option key meaning "no age restriction"
pub const DELETE_NOW_KEY: &str = "now";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutoffUnit {
    Day,
    Week,
    Month,
    Year,
}

impl CutoffUnit {
    fn parse(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        let singular = lower.strip_suffix('s').unwrap_or(&lower);
        match singular {
            "day" => Some(CutoffUnit::Day),
            "week" => Some(CutoffUnit::Week),
            "month" => Some(CutoffUnit::Month),
            "year" => Some(CutoffUnit::Year),
            _ => None,
        }
    }
}

/// A relative duration such as `3 months`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeCutoff {
    pub amount: u32,
    pub unit: CutoffUnit,
}

impl AgeCutoff {
    pub fn new(amount: u32, unit: CutoffUnit) -> Self {
        Self { amount, unit }
    }

    /// Start of the day `self` before `now`
    pub fn cutoff_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let shifted = match self.unit {
            CutoffUnit::Day => now.checked_sub_signed(Duration::days(i64::from(self.amount))),
            CutoffUnit::Week => {
                now.checked_sub_signed(Duration::weeks(i64::from(self.amount)))
            }
            CutoffUnit::Month => now.checked_sub_months(Months::new(self.amount)),
            CutoffUnit::Year => self
                .amount
                .checked_mul(12)
                .and_then(|months| now.checked_sub_months(Months::new(months))),
        }
        .ok_or_else(|| DomainError::InvalidAgeCutoff(self.to_string()))?;

        let midnight = shifted
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| DomainError::InvalidAgeCutoff(self.to_string()))?;
        Ok(Utc.from_utc_datetime(&midnight))
    }
}

impl FromStr for AgeCutoff {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DomainError::InvalidAgeCutoff(s.to_string());

        let mut parts = s.split_whitespace();
        let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };

        let amount: u32 = amount
            .trim_start_matches('+')
            .parse()
            .map_err(|_| invalid())?;
        if amount == 0 {
            return Err(invalid());
        }

        let unit = CutoffUnit::parse(unit).ok_or_else(invalid)?;
        Ok(Self { amount, unit })
    }
}

impl std::fmt::Display for AgeCutoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let unit = match self.unit {
            CutoffUnit::Day => "day",
            CutoffUnit::Week => "week",
            CutoffUnit::Month => "month",
            CutoffUnit::Year => "year",
        };
        let plural = if self.amount == 1 { "" } else { "s" };
        write!(f, "{} {}{}", self.amount, unit, plural)
    }
}

/// Configured dropdown entry: `key` is the duration, `label` a template
/// where `{count}` (or `%s`) is replaced by the number of matching records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeCutoffPreset {
    pub key: String,
    pub label: String,
}

impl AgeCutoffPreset {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }

    pub fn cutoff(&self) -> Result<AgeCutoff> {
        self.key.parse()
    }

    pub fn render_label(&self, count: u64) -> String {
        let count = count.to_string();
        self.label.replace("{count}", &count).replacen("%s", &count, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    #[test]
    fn test_parse_valid_cutoffs() {
        assert_eq!(
            "3 months".parse::<AgeCutoff>().unwrap(),
            AgeCutoff::new(3, CutoffUnit::Month)
        );
        assert_eq!(
            "1 Year".parse::<AgeCutoff>().unwrap(),
            AgeCutoff::new(1, CutoffUnit::Year)
        );
        assert_eq!(
            "  +2   weeks ".parse::<AgeCutoff>().unwrap(),
            AgeCutoff::new(2, CutoffUnit::Week)
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "months", "3", "three months", "0 days", "3 fortnights", "1 day ago"] {
            let err = bad.parse::<AgeCutoff>().unwrap_err();
            assert!(matches!(err, DomainError::InvalidAgeCutoff(_)), "{bad}");
        }
    }

    #[test]
    fn test_cutoff_is_start_of_day() {
        let now = at(2024, 5, 31, 17);
        let cutoff = AgeCutoff::new(3, CutoffUnit::Month).cutoff_from(now).unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap());

        let cutoff = AgeCutoff::new(10, CutoffUnit::Day).cutoff_from(now).unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2024, 5, 21, 0, 0, 0).unwrap());

        let cutoff = AgeCutoff::new(1, CutoffUnit::Year).cutoff_from(now).unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2023, 5, 31, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_render_label_placeholders() {
        let preset = AgeCutoffPreset::new("1 month", "Delete {count} records older than 1 month");
        assert_eq!(
            preset.render_label(12),
            "Delete 12 records older than 1 month"
        );

        let preset = AgeCutoffPreset::new("6 months", "Delete %s records older than 6 months");
        assert_eq!(preset.render_label(3), "Delete 3 records older than 6 months");
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let cutoff = AgeCutoff::new(6, CutoffUnit::Month);
        assert_eq!(cutoff.to_string(), "6 months");
        assert_eq!(cutoff.to_string().parse::<AgeCutoff>().unwrap(), cutoff);
    }
}
