use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::app::{Result, SluiceError};

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Half-open `[start_inclusive, end_exclusive)` range of epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub start_inclusive: i64,
    pub end_exclusive: i64,
}

impl FetchWindow {
    pub fn new(start_inclusive: i64, end_exclusive: i64) -> Self {
        Self {
            start_inclusive,
            end_exclusive,
        }
    }

    /// The UTC calendar day named by `date` (`YYYY-MM-DD`).
    pub fn for_date(date: &str) -> Result<Self> {
        let day = NaiveDate::parse_from_str(date.trim(), DAY_FORMAT)
            .map_err(|_| SluiceError::InvalidDate(date.to_string()))?;
        let start = day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| SluiceError::InvalidDate(date.to_string()))?
            .and_utc()
            .timestamp();
        Ok(Self::new(start, start + SECONDS_PER_DAY))
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start_inclusive && timestamp < self.end_exclusive
    }

    pub fn is_before(&self, timestamp: i64) -> bool {
        timestamp < self.start_inclusive
    }

    /// Bucket key (`YYYY-MM-DD`, UTC) of the day containing `timestamp`.
    pub fn day_key(timestamp: i64) -> String {
        DateTime::<Utc>::from_timestamp(timestamp, 0)
            .map(|dt| dt.format(DAY_FORMAT).to_string())
            .unwrap_or_else(|| "invalid".to_string())
    }

    /// Day key of the window start.
    pub fn start_day(&self) -> String {
        Self::day_key(self.start_inclusive)
    }

    /// First day that lies wholly after the window. Search queries take it
    /// as their exclusive `until:` bound.
    pub fn end_day(&self) -> String {
        Self::day_key(self.end_exclusive - 1 + SECONDS_PER_DAY)
    }
}
