//! Patient entity and its per-run processing state
//!
//! A [`Patient`] holds the records loaded from the input tables. The
//! population and cohort windows computed by the modifiers live in a separate
//! [`PatientState`] that the pipeline threads through every modifier.

use crate::models::types::{Gender, Window};
use crate::models::{Event, Measurement, Prescription};
use crate::utils::date::{self, Day};

/// Core patient entity
#[derive(Debug, Clone)]
pub struct Patient {
    /// Patient identifier
    pub id: String,
    /// Gender of the patient
    pub gender: Gender,
    /// Birth date
    pub birth_date: Day,
    /// First day of observed patient time
    pub start_date: Day,
    /// First day after observed patient time
    pub end_date: Day,
    /// Events sorted by date
    pub events: Vec<Event>,
    /// Prescriptions sorted by date
    pub prescriptions: Vec<Prescription>,
    /// Measurements sorted by date
    pub measurements: Vec<Measurement>,
}

impl Patient {
    /// Create a patient without any records
    #[must_use]
    pub fn new(id: impl Into<String>, gender: Gender, birth_date: Day, start_date: Day, end_date: Day) -> Self {
        Self {
            id: id.into(),
            gender,
            birth_date,
            start_date,
            end_date,
            events: Vec::new(),
            prescriptions: Vec::new(),
            measurements: Vec::new(),
        }
    }

    /// Observed patient time as a window
    #[must_use]
    pub const fn observation(&self) -> Window {
        Window::new(self.start_date, self.end_date)
    }

    /// Completed years of age on `day`
    #[must_use]
    pub fn age_at(&self, day: Day) -> Option<u32> {
        date::age_in_years(self.birth_date, day)
    }

    /// Age in days on `day`
    #[must_use]
    pub const fn age_in_days(&self, day: Day) -> i32 {
        day - self.birth_date
    }

    /// Restore date order of every collection after records were appended
    pub fn sort_collections(&mut self) {
        self.events.sort_by_key(|e| e.date);
        self.prescriptions.sort_by_key(|p| p.date);
        self.measurements.sort_by_key(|m| m.date);
    }
}

/// Population and cohort windows derived for one patient during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientState {
    /// Admissible observation window, `None` when excluded from the population
    pub population: Option<Window>,
    /// Cohort window, `None` when not in the cohort
    pub cohort: Option<Window>,
}

impl PatientState {
    /// Whether the patient is in the population
    #[must_use]
    pub const fn in_population(&self) -> bool {
        self.population.is_some()
    }

    /// Whether the patient is in the cohort
    #[must_use]
    pub const fn in_cohort(&self) -> bool {
        self.cohort.is_some()
    }

    /// Days of cohort time
    #[must_use]
    pub fn cohort_time(&self) -> i32 {
        self.cohort.map_or(0, |w| w.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_collections() {
        let mut patient = Patient::new("P1", Gender::Female, 0, 0, 1000);
        patient.events.push(Event::new("MI", 50));
        patient.events.push(Event::new("MI", 10));
        patient.sort_collections();
        assert_eq!(patient.events[0].date, 10);
    }

    #[test]
    fn test_state_flags() {
        let mut state = PatientState::default();
        assert!(!state.in_population());
        state.population = Some(Window::new(0, 100));
        state.cohort = Some(Window::new(10, 40));
        assert!(state.in_population());
        assert_eq!(state.cohort_time(), 30);
    }
}
