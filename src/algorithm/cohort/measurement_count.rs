//! Measurement count cohort definition
//!
//! Each rule counts the measurements of one type inside a window placed
//! relative to a reference point and requires the count to fall in a range.
//! A patient stays in the cohort only when every rule passes.

use serde::{Deserialize, Serialize};

use super::{CohortCandidate, cohort_summary, declare_steps, reject};
use crate::algorithm::rules::{RuleParser, parse_all};
use crate::error::{Error, Result};
use crate::models::{Patient, PatientState, Window};
use crate::pipeline::{Modifier, RunContext};
use crate::stats::ModifierStats;
use crate::utils::date::{DateFormatConfig, Day, parse_day};

const NAME: &str = "MeasurementCountCohortDefinition";

const STEP_COUNT: &str = "measurement count out of range";

/// Settings as written in the workflow file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MeasurementCountSettings {
    /// Start from the cohort window of the previous calculator
    pub chain_cohort_definitions: bool,
    /// `"TYPE;REFERENCE;startOffset;endOffset;min;max"`
    pub rules: Vec<String>,
}

/// Point the count window is placed against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// Population start
    PopulationStart,
    /// Population end
    PopulationEnd,
    /// Start of the candidate cohort window
    CohortStart,
    /// End of the candidate cohort window
    CohortEnd,
    /// Absolute day
    Date(Day),
}

impl Reference {
    fn parse(rule: &RuleParser<'_>, index: usize, formats: &DateFormatConfig) -> Result<Self> {
        let text = rule.text(index)?;
        Ok(match text.to_ascii_lowercase().as_str() {
            "populationstart" => Self::PopulationStart,
            "populationend" => Self::PopulationEnd,
            "cohortstart" => Self::CohortStart,
            "cohortend" => Self::CohortEnd,
            _ => Self::Date(
                parse_day(text, formats).ok_or_else(|| rule.error(format!("unknown reference \"{text}\"")))?,
            ),
        })
    }

    fn resolve(self, population: Window, candidate: &CohortCandidate) -> Day {
        match self {
            Self::PopulationStart => population.start,
            Self::PopulationEnd => population.end,
            Self::CohortStart => candidate.start,
            Self::CohortEnd => candidate.end,
            Self::Date(day) => day,
        }
    }
}

/// One count requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountRule {
    /// Measurement type counted
    pub measurement_type: String,
    /// Where the window is placed
    pub reference: Reference,
    /// Offset of the first day
    pub start_offset: i32,
    /// Offset of the first day after the window
    pub end_offset: i32,
    /// Minimum count
    pub min: u32,
    /// Maximum count, unbounded when absent
    pub max: Option<u32>,
}

impl CountRule {
    fn parse(rule: &RuleParser<'_>, formats: &DateFormatConfig) -> Result<Self> {
        rule.expect_fields(5, 6)?;
        let count = |index: usize| -> Result<Option<u32>> {
            rule.opt_int(index)?
                .map(|n| u32::try_from(n).map_err(|_| rule.error("negative count")))
                .transpose()
        };
        let parsed = Self {
            measurement_type: rule.text(0)?.to_string(),
            reference: Reference::parse(rule, 1, formats)?,
            start_offset: rule.int(2)?,
            end_offset: rule.int(3)?,
            min: count(4)?.unwrap_or(0),
            max: count(5)?,
        };
        if parsed.end_offset < parsed.start_offset {
            return Err(rule.error("window end precedes window start"));
        }
        if parsed.max.is_some_and(|max| max < parsed.min) {
            return Err(rule.error("maximum count below minimum count"));
        }
        Ok(parsed)
    }

    /// Whether the patient's count inside the rule's window is in range
    #[must_use]
    pub fn passes(&self, patient: &Patient, population: Window, candidate: &CohortCandidate) -> bool {
        let reference = self.reference.resolve(population, candidate);
        let window = Window::new(reference + self.start_offset, reference + self.end_offset);
        let count = patient
            .measurements
            .iter()
            .filter(|m| m.measurement_type == self.measurement_type && window.contains(m.date))
            .count();
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

/// Keeps patients whose measurement counts are in range
#[derive(Debug, Clone)]
pub struct MeasurementCountCohortDefinition {
    chain: bool,
    rules: Vec<CountRule>,
}

impl MeasurementCountCohortDefinition {
    /// Parse the settings; absolute reference dates are read with `formats`
    pub fn from_settings(settings: &MeasurementCountSettings, formats: &DateFormatConfig) -> Result<Self> {
        let rules = parse_all(NAME, &settings.rules, |rule| CountRule::parse(rule, formats))?;
        if rules.is_empty() {
            return Err(Error::config(NAME, "no count rules defined"));
        }
        Ok(Self {
            chain: settings.chain_cohort_definitions,
            rules,
        })
    }
}

impl Modifier for MeasurementCountCohortDefinition {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, patient: &mut Patient, state: &mut PatientState, _ctx: &RunContext, stats: &mut ModifierStats) {
        let Some(candidate) = CohortCandidate::seed(state, self.chain, stats) else {
            return;
        };
        // Seeding succeeded, so the population window is present.
        let population = state.population.unwrap_or(candidate.seed);
        if self.rules.iter().all(|rule| rule.passes(patient, population, &candidate)) {
            candidate.commit(state, stats);
        } else {
            reject(state, stats, STEP_COUNT);
        }
    }

    fn prepare(&self, stats: &mut ModifierStats) {
        declare_steps(stats, &[STEP_COUNT]);
    }

    fn summary(&self, stats: &ModifierStats) -> String {
        cohort_summary(NAME, stats)
    }
}
