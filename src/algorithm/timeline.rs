//! Prescription timeline of disjoint intervals
//!
//! A [`Timeline`] splits a patient's drug history into disjoint, date-ordered
//! intervals. Each interval records which drug groups are active and which
//! prescriptions make them active. Interval boundaries only ever fall on real
//! prescription start or end days.

use std::collections::BTreeMap;

use crate::models::Prescription;
use crate::utils::date::Day;

/// A `[start, end)` stretch with a constant set of active drug groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    /// First day of the interval
    pub start: Day,
    /// First day after the interval
    pub end: Day,
    /// Active group name to the prescriptions making it active
    pub groups: BTreeMap<String, Vec<Prescription>>,
}

impl Interval {
    fn tagged(start: Day, end: Day, groups: &[String], prescription: &Prescription) -> Self {
        let mut interval = Self {
            start,
            end,
            groups: BTreeMap::new(),
        };
        interval.tag(groups, prescription);
        interval
    }

    fn slice(&self, start: Day, end: Day) -> Self {
        Self {
            start,
            end,
            groups: self.groups.clone(),
        }
    }

    fn tag(&mut self, groups: &[String], prescription: &Prescription) {
        for group in groups {
            self.groups
                .entry(group.clone())
                .or_default()
                .push(prescription.clone());
        }
    }

    /// Length in days
    #[must_use]
    pub fn len(&self) -> i32 {
        self.end - self.start
    }

    /// Whether the interval covers no day
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Names of the active groups
    pub fn active_groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Whether every group in `required` is active
    #[must_use]
    pub fn has_groups(&self, required: &[String]) -> bool {
        required.iter().all(|g| self.groups.contains_key(g))
    }

    /// Prescriber id and type shared by every contributing prescription
    #[must_use]
    pub fn prescriber(&self) -> Option<(&str, Option<&str>)> {
        let mut all = self.groups.values().flatten();
        let first = all.next()?;
        let id = first.prescriber_id.as_deref()?;
        let prescriber_type = first.prescriber_type.as_deref();
        all.all(|p| p.prescriber_id.as_deref() == Some(id))
            .then_some((id, prescriber_type))
    }
}

/// Disjoint, date-ordered intervals built from tagged prescriptions
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    intervals: Vec<Interval>,
}

impl Timeline {
    /// Create an empty timeline
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a timeline from prescriptions and the groups each belongs to
    #[must_use]
    pub fn build<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = (&'a [String], &'a Prescription)>,
    {
        let mut timeline = Self::new();
        for (groups, prescription) in items {
            timeline.add(groups, prescription);
        }
        timeline
    }

    /// Add one prescription active for `groups`.
    ///
    /// Overlapped intervals are split at the prescription's start and end,
    /// the overlapping pieces are tagged, and any part of the prescription
    /// not yet covered becomes a new interval. Prescriptions without groups or
    /// with a non-positive duration change nothing.
    pub fn add(&mut self, groups: &[String], prescription: &Prescription) {
        let (start, end) = (prescription.date, prescription.end());
        if end <= start || groups.is_empty() {
            return;
        }

        let mut result = Vec::with_capacity(self.intervals.len() + 3);
        let mut cursor = start;

        for interval in self.intervals.drain(..) {
            if interval.end <= start || interval.start >= end {
                result.push(interval);
                continue;
            }

            if cursor < interval.start {
                result.push(Interval::tagged(cursor, interval.start, groups, prescription));
            }

            let lo = interval.start.max(start);
            let hi = interval.end.min(end);
            if interval.start < start {
                result.push(interval.slice(interval.start, start));
            }
            let mut overlap = interval.slice(lo, hi);
            overlap.tag(groups, prescription);
            result.push(overlap);
            if interval.end > end {
                result.push(interval.slice(end, interval.end));
            }

            cursor = hi;
        }

        if cursor < end {
            result.push(Interval::tagged(cursor, end, groups, prescription));
        }

        result.sort_by_key(|i| i.start);
        self.intervals = result;
    }

    /// The intervals, ordered by start
    #[must_use]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Number of intervals
    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Whether the timeline is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}
