//! Common domain type definitions
//!
//! Enum types and small value types shared by the domain models.

use std::fmt;

use crate::utils::date::Day;

/// Gender of a patient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Gender {
    /// Male gender
    Male,
    /// Female gender
    Female,
    /// Unknown or not specified
    #[default]
    Unknown,
}

impl From<&str> for Gender {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "m" | "male" | "1" => Self::Male,
            "f" | "female" | "v" | "2" => Self::Female,
            _ => Self::Unknown,
        }
    }
}

impl From<i32> for Gender {
    fn from(value: i32) -> Self {
        match value {
            1 => Self::Male,
            2 => Self::Female,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Male => "M",
            Self::Female => "F",
            Self::Unknown => "U",
        };
        f.write_str(label)
    }
}

/// A `[start, end)` day interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    /// First day inside the window
    pub start: Day,
    /// First day after the window
    pub end: Day,
}

impl Window {
    /// Create a new window
    #[must_use]
    pub const fn new(start: Day, end: Day) -> Self {
        Self { start, end }
    }

    /// Number of days covered, zero for inverted windows
    #[must_use]
    pub fn len(&self) -> i32 {
        (self.end - self.start).max(0)
    }

    /// Whether the window covers no day at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether `day` lies inside the window
    #[must_use]
    pub fn contains(&self, day: Day) -> bool {
        day >= self.start && day < self.end
    }

    /// Number of days shared with `[start, end)`
    #[must_use]
    pub fn overlap(&self, start: Day, end: Day) -> i32 {
        (self.end.min(end) - self.start.max(start)).max(0)
    }

    /// Whether the window shares at least one day with `[start, end)`
    #[must_use]
    pub fn overlaps(&self, start: Day, end: Day) -> bool {
        self.overlap(start, end) > 0
    }

    /// Intersection with another window, `None` when empty
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let window = Self::new(self.start.max(other.start), self.end.min(other.end));
        (!window.is_empty()).then_some(window)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_from_string() {
        assert_eq!(Gender::from("M"), Gender::Male);
        assert_eq!(Gender::from("female"), Gender::Female);
        assert_eq!(Gender::from("x"), Gender::Unknown);
    }

    #[test]
    fn test_window_overlap() {
        let window = Window::new(400, 700);
        assert_eq!(window.overlap(350, 410), 10);
        assert_eq!(window.overlap(700, 800), 0);
        assert!(window.overlaps(699, 701));
        assert!(!window.overlaps(100, 400));
        assert_eq!(window.len(), 300);
    }

    #[test]
    fn test_window_intersect() {
        let a = Window::new(0, 10);
        assert_eq!(a.intersect(&Window::new(5, 20)), Some(Window::new(5, 10)));
        assert_eq!(a.intersect(&Window::new(10, 20)), None);
    }
}
