//! Fixed date cohort definition

use serde::{Deserialize, Serialize};

use super::{CohortCandidate, cohort_summary, declare_steps, reject};
use crate::error::{Error, Result};
use crate::models::{Patient, PatientState};
use crate::pipeline::{Modifier, RunContext};
use crate::stats::ModifierStats;
use crate::utils::date::{DateFormatConfig, Day, parse_day};

const NAME: &str = "FixedCohortDefinition";

const STEP_OUTSIDE: &str = "no time between fixed dates";

/// Settings as written in the workflow file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixedCohortSettings {
    /// Start from the cohort window of the previous calculator
    pub chain_cohort_definitions: bool,
    /// First day of the cohort
    pub cohort_start_date: Option<String>,
    /// First day after the cohort
    pub cohort_end_date: Option<String>,
}

/// Clips the cohort to absolute dates
#[derive(Debug, Clone)]
pub struct FixedCohortDefinition {
    chain: bool,
    start: Option<Day>,
    end: Option<Day>,
}

impl FixedCohortDefinition {
    /// Parse the settings; dates are read with `formats`
    pub fn from_settings(settings: &FixedCohortSettings, formats: &DateFormatConfig) -> Result<Self> {
        let parse = |value: &Option<String>| -> Result<Option<Day>> {
            value
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_day(s, formats).ok_or_else(|| Error::config(NAME, format!("invalid date \"{s}\""))))
                .transpose()
        };
        let definition = Self {
            chain: settings.chain_cohort_definitions,
            start: parse(&settings.cohort_start_date)?,
            end: parse(&settings.cohort_end_date)?,
        };
        if let (Some(start), Some(end)) = (definition.start, definition.end) {
            if end <= start {
                return Err(Error::config(NAME, "cohort end date must follow cohort start date"));
            }
        }
        Ok(definition)
    }
}

impl Modifier for FixedCohortDefinition {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, _patient: &mut Patient, state: &mut PatientState, _ctx: &RunContext, stats: &mut ModifierStats) {
        let Some(mut candidate) = CohortCandidate::seed(state, self.chain, stats) else {
            return;
        };
        if let Some(start) = self.start {
            candidate.move_start(start);
        }
        if let Some(end) = self.end {
            candidate.truncate(end);
        }
        if candidate.is_empty() {
            reject(state, stats, STEP_OUTSIDE);
        } else {
            candidate.commit(state, stats);
        }
    }

    fn prepare(&self, stats: &mut ModifierStats) {
        declare_steps(stats, &[STEP_OUTSIDE]);
    }

    fn summary(&self, stats: &ModifierStats) -> String {
        cohort_summary(NAME, stats)
    }
}
