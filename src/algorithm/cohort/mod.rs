//! Cohort window calculators
//!
//! Every calculator follows the same state machine. A [`CohortCandidate`] is
//! seeded from the population window (or, when chaining, from the cohort
//! window an earlier calculator left), narrowed by the calculator's checks,
//! and finally committed to the [`PatientState`] or rejected with a named
//! attrition reason.

pub mod event;
pub mod fixed;
pub mod measurement;
pub mod measurement_count;
pub mod prescription;

pub use event::{EventCohortDefinition, EventCohortSettings};
pub use fixed::{FixedCohortDefinition, FixedCohortSettings};
pub use measurement::{MeasurementCohortDefinition, MeasurementCohortSettings};
pub use measurement_count::{MeasurementCountCohortDefinition, MeasurementCountSettings};
pub use prescription::{PrescriptionCohortDefinition, PrescriptionCohortSettings};

use crate::algorithm::rules::RuleParser;
use crate::error::Result;
use crate::models::{PatientState, Window};
use crate::stats::ModifierStats;
use crate::utils::date::Day;

/// Attrition step counting every patient offered to a calculator
pub const STEP_PATIENTS: &str = "patients";
/// Patients skipped because they are outside the population
pub const STEP_NOT_IN_POPULATION: &str = "not in population";
/// Patients skipped because an earlier calculator removed them from the cohort
pub const STEP_NOT_IN_COHORT: &str = "not in cohort";
/// Patients committed to the cohort
pub const STEP_IN_COHORT: &str = "in cohort";

/// A cohort window under construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortCandidate {
    /// Window the candidate was seeded from
    pub seed: Window,
    /// Current start
    pub start: Day,
    /// Current end
    pub end: Day,
}

impl CohortCandidate {
    /// Seed a candidate from `state`.
    ///
    /// Without `chain` the population window is the seed; with `chain` the
    /// cohort window of the previous calculator is. Patients without the
    /// required window are counted and `None` is returned.
    pub fn seed(state: &PatientState, chain: bool, stats: &mut ModifierStats) -> Option<Self> {
        stats.attrition.record(STEP_PATIENTS);
        let Some(population) = state.population else {
            stats.attrition.record(STEP_NOT_IN_POPULATION);
            return None;
        };
        let seed = if chain {
            let Some(cohort) = state.cohort else {
                stats.attrition.record(STEP_NOT_IN_COHORT);
                return None;
            };
            cohort
        } else {
            population
        };
        Some(Self {
            seed,
            start: seed.start,
            end: seed.end,
        })
    }

    /// Current window
    #[must_use]
    pub const fn window(&self) -> Window {
        Window::new(self.start, self.end)
    }

    /// Whether no cohort time is left
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Days of cohort time left
    #[must_use]
    pub fn len(&self) -> i32 {
        self.window().len()
    }

    /// Move the start later, never earlier
    pub fn move_start(&mut self, start: Day) {
        self.start = self.start.max(start);
    }

    /// Move the end earlier, never later
    pub fn truncate(&mut self, end: Day) {
        self.end = self.end.min(end);
    }

    /// Write the window to `state` and count the patient
    pub fn commit(self, state: &mut PatientState, stats: &mut ModifierStats) {
        state.cohort = Some(self.window());
        stats.attrition.record(STEP_IN_COHORT);
        stats.counters.add(&["cohortTime".into()], f64::from(self.len()));
    }
}

/// Remove the patient from the cohort, counting `reason`
pub fn reject(state: &mut PatientState, stats: &mut ModifierStats, reason: &str) {
    state.cohort = None;
    stats.attrition.record(reason);
}

/// Declare the common attrition steps around a calculator's own `reasons`
pub fn declare_steps(stats: &mut ModifierStats, reasons: &[&str]) {
    for step in [STEP_PATIENTS, STEP_NOT_IN_POPULATION, STEP_NOT_IN_COHORT] {
        stats.attrition.declare(step);
    }
    for reason in reasons {
        stats.attrition.declare(reason);
    }
    stats.attrition.declare(STEP_IN_COHORT);
}

/// Attrition report followed by the total and mean cohort time
#[must_use]
pub fn cohort_summary(name: &str, stats: &ModifierStats) -> String {
    let mut out = stats.attrition.render(name);
    let time = stats.counters.get(&["cohortTime".into()]);
    out.push_str(&format!(
        "  cohort time: {} days, mean {:.1} days per patient\n",
        time.sum,
        time.mean()
    ));
    out
}

/// `"CODE;start;end"` window relative to a reference day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeWindow {
    /// Event type or ATC prefix
    pub code: String,
    /// Offset of the first day
    pub start: i32,
    /// Offset of the first day after the window
    pub end: i32,
}

impl RelativeWindow {
    /// Parse `"CODE;start;end"`
    pub fn parse(rule: &RuleParser<'_>) -> Result<Self> {
        rule.expect_fields(3, 3)?;
        let window = Self {
            code: rule.text(0)?.to_string(),
            start: rule.int(1)?,
            end: rule.int(2)?,
        };
        if window.end < window.start {
            return Err(rule.error("window end precedes window start"));
        }
        Ok(window)
    }

    /// Absolute window around `day`
    #[must_use]
    pub const fn around(&self, day: Day) -> Window {
        Window::new(day + self.start, day + self.end)
    }
}
