//! Shared utilities: day arithmetic, logging and progress helpers.

pub mod date;
pub mod logging;

pub use date::{Day, DateFormatConfig, age_in_years, birthday, from_day, parse_day, to_day};
