//! Day arithmetic and date parsing.
//!
//! Every boundary in the engine is a [`Day`]: the number of days from the
//! common era (chrono's `num_days_from_ce`). Integer days make window
//! arithmetic and comparison trivial; calendar dates only appear at the input
//! and output edges.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Day count used for every date in the engine
pub type Day = i32;

/// Average number of days per year, used for fractional ages
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Convert a calendar date to a day count
#[must_use]
pub fn to_day(date: NaiveDate) -> Day {
    date.num_days_from_ce()
}

/// Convert a day count back to a calendar date
#[must_use]
pub fn from_day(day: Day) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(day)
}

/// Format a day count with the given chrono format, falling back to the raw number
#[must_use]
pub fn format_day(day: Day, format: &str) -> String {
    from_day(day).map_or_else(|| day.to_string(), |d| d.format(format).to_string())
}

/// Day on which someone born on `birth` turns `years` old.
///
/// Leap-day birthdays fall on the 28th of February in non-leap years.
#[must_use]
pub fn birthday(birth: Day, years: u32) -> Option<Day> {
    let date = from_day(birth)?;
    date.checked_add_months(Months::new(years.checked_mul(12)?))
        .map(to_day)
}

/// Completed years of age on `day`
#[must_use]
pub fn age_in_years(birth: Day, day: Day) -> Option<u32> {
    let birth_date = from_day(birth)?;
    let date = from_day(day)?;
    if date < birth_date {
        return None;
    }
    let mut age = date.year() - birth_date.year();
    if (date.month(), date.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

/// Fractional age in years on `day`, as used by growth references
#[must_use]
pub fn age_fraction(birth: Day, day: Day) -> f64 {
    f64::from(day - birth) / DAYS_PER_YEAR
}

/// Configuration for date format handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DateFormatConfig {
    /// List of date format strings to try when parsing dates
    pub date_formats: Vec<String>,
    /// Format used when writing dates to output files
    pub output_format: String,
    /// Enable heuristic format detection
    pub enable_format_detection: bool,
}

impl Default for DateFormatConfig {
    fn default() -> Self {
        Self {
            date_formats: vec![
                "%Y%m%d".to_string(),   // Compact: 20230115
                "%Y-%m-%d".to_string(), // ISO format: 2023-01-15
                "%d-%m-%Y".to_string(), // European: 15-01-2023
                "%d/%m/%Y".to_string(), // UK: 15/01/2023
                "%d.%m.%Y".to_string(), // 15.01.2023
            ],
            output_format: "%Y-%m-%d".to_string(),
            enable_format_detection: true,
        }
    }
}

/// Parse a date string with multiple format attempts
#[must_use]
pub fn parse_date_string(s: &str, config: &DateFormatConfig) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for format in &config.date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    if config.enable_format_detection {
        if let Some(detected_format) = detect_date_format(s) {
            if let Ok(date) = NaiveDate::parse_from_str(s, detected_format) {
                return Some(date);
            }
        }
    }

    None
}

/// Parse a date string straight to a day count
#[must_use]
pub fn parse_day(s: &str, config: &DateFormatConfig) -> Option<Day> {
    parse_date_string(s, config).map(to_day)
}

/// Try to detect the date format based on string patterns
#[must_use]
pub fn detect_date_format(s: &str) -> Option<&'static str> {
    let bytes = s.as_bytes();
    if s.len() == 10 && bytes[4] == b'-' && bytes[7] == b'-' {
        return Some("%Y-%m-%d");
    }

    if s.contains('/') {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() == 3 {
            if parts[0].len() == 4 {
                return Some("%Y/%m/%d");
            } else if parts[2].len() == 4 {
                return Some("%d/%m/%Y");
            }
        }
    }

    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        return Some("%Y%m%d");
    }

    None
}
