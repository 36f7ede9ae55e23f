//! Measurement based cohort definition

use serde::{Deserialize, Serialize};

use super::{CohortCandidate, cohort_summary, declare_steps, reject};
use crate::error::{Error, Result};
use crate::models::{Measurement, Patient, PatientState};
use crate::pipeline::{Modifier, RunContext};
use crate::stats::ModifierStats;

const NAME: &str = "MeasurementCohortDefinition";

const STEP_NO_MEASUREMENT: &str = "no qualifying measurement";
const STEP_TOO_SHORT: &str = "insufficient cohort time";

/// Which qualifying measurement starts the cohort
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementSelection {
    /// Earliest qualifying measurement
    #[default]
    First,
    /// Latest qualifying measurement
    Last,
}

/// Settings as written in the workflow file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MeasurementCohortSettings {
    /// Start from the cohort window of the previous calculator
    pub chain_cohort_definitions: bool,
    /// Measurement types that qualify
    pub measurement_types: Vec<String>,
    /// Value a measurement must have to qualify
    pub required_value: Option<String>,
    /// Only measurements strictly before the first of these events qualify
    pub before_event_types: Vec<String>,
    /// Start at the first or the last qualifying measurement
    pub selection: MeasurementSelection,
    /// Minimum days of cohort time
    pub minimum_duration: i32,
}

/// Starts the cohort at a qualifying measurement
#[derive(Debug, Clone)]
pub struct MeasurementCohortDefinition {
    chain: bool,
    types: Vec<String>,
    required_value: Option<String>,
    before_event_types: Vec<String>,
    selection: MeasurementSelection,
    minimum_duration: i32,
}

impl MeasurementCohortDefinition {
    /// Parse the settings
    pub fn from_settings(settings: &MeasurementCohortSettings) -> Result<Self> {
        let types: Vec<String> = settings
            .measurement_types
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if types.is_empty() {
            return Err(Error::config(NAME, "no measurement types defined"));
        }
        Ok(Self {
            chain: settings.chain_cohort_definitions,
            types,
            required_value: settings
                .required_value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            before_event_types: settings.before_event_types.clone(),
            selection: settings.selection,
            minimum_duration: settings.minimum_duration,
        })
    }

    fn qualifies(&self, measurement: &Measurement) -> bool {
        measurement.is_any_of(&self.types)
            && self
                .required_value
                .as_deref()
                .is_none_or(|value| measurement.value.trim().eq_ignore_ascii_case(value))
    }

    fn evaluate(&self, patient: &Patient, mut candidate: CohortCandidate) -> std::result::Result<CohortCandidate, &'static str> {
        let cutoff = patient
            .events
            .iter()
            .filter(|e| e.is_any_of(&self.before_event_types))
            .map(|e| e.date)
            .min()
            .map_or(candidate.end, |day| day.min(candidate.end));

        let mut qualifying = patient
            .measurements
            .iter()
            .filter(|m| m.date >= candidate.start && m.date < cutoff && self.qualifies(m));
        let chosen = match self.selection {
            MeasurementSelection::First => qualifying.next(),
            MeasurementSelection::Last => qualifying.last(),
        };
        let Some(measurement) = chosen else {
            return Err(STEP_NO_MEASUREMENT);
        };

        candidate.move_start(measurement.date);
        if candidate.is_empty() || candidate.len() < self.minimum_duration {
            return Err(STEP_TOO_SHORT);
        }
        Ok(candidate)
    }
}

impl Modifier for MeasurementCohortDefinition {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, patient: &mut Patient, state: &mut PatientState, _ctx: &RunContext, stats: &mut ModifierStats) {
        let Some(candidate) = CohortCandidate::seed(state, self.chain, stats) else {
            return;
        };
        match self.evaluate(patient, candidate) {
            Ok(candidate) => candidate.commit(state, stats),
            Err(reason) => reject(state, stats, reason),
        }
    }

    fn prepare(&self, stats: &mut ModifierStats) {
        declare_steps(stats, &[STEP_NO_MEASUREMENT, STEP_TOO_SHORT]);
    }

    fn summary(&self, stats: &ModifierStats) -> String {
        cohort_summary(NAME, stats)
    }
}
