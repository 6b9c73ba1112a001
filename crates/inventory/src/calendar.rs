//! Calendar bucketing shared by sales statistics and reporting consumers.
//!
//! All keys are derived from the UTC date of the instant.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Week of year: `ceil((day_of_year + weekday_of_jan_1) / 7)`, with the
/// weekday counted from Sunday = 0. Weeks start on Sunday; week 1 is the one
/// holding January 1st.
pub fn week_number(date: NaiveDate) -> u32 {
    let jan_1_offset = NaiveDate::from_ymd_opt(date.year(), 1, 1)
        .map(|d| d.weekday().num_days_from_sunday())
        .unwrap_or(0);
    (date.ordinal() + jan_1_offset).div_ceil(7)
}

/// `YYYY-MM-DD`.
pub fn day_key(at: DateTime<Utc>) -> String {
    at.date_naive().format("%Y-%m-%d").to_string()
}

/// `YYYY-W##`.
pub fn week_key(at: DateTime<Utc>) -> String {
    let date = at.date_naive();
    format!("{:04}-W{:02}", date.year(), week_number(date))
}

/// `YYYY-MM`.
pub fn month_key(at: DateTime<Utc>) -> String {
    at.date_naive().format("%Y-%m").to_string()
}

/// Day / week / month counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarBuckets {
    pub daily: BTreeMap<String, i64>,
    pub weekly: BTreeMap<String, i64>,
    pub monthly: BTreeMap<String, i64>,
}

impl CalendarBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the day, week and month buckets containing `at`.
    pub fn record(&mut self, at: DateTime<Utc>, amount: i64) {
        *self.daily.entry(day_key(at)).or_insert(0) += amount;
        *self.weekly.entry(week_key(at)).or_insert(0) += amount;
        *self.monthly.entry(month_key(at)).or_insert(0) += amount;
    }

    pub fn day(&self, at: DateTime<Utc>) -> i64 {
        self.daily.get(&day_key(at)).copied().unwrap_or(0)
    }

    pub fn week(&self, at: DateTime<Utc>) -> i64 {
        self.weekly.get(&week_key(at)).copied().unwrap_or(0)
    }

    pub fn month(&self, at: DateTime<Utc>) -> i64 {
        self.monthly.get(&month_key(at)).copied().unwrap_or(0)
    }
}
