//! Event based cohort definition

use serde::{Deserialize, Serialize};

use super::{CohortCandidate, RelativeWindow, cohort_summary, declare_steps, reject};
use crate::algorithm::rules::{RuleParser, parse_all};
use crate::error::{Error, Result};
use crate::models::{Event, Patient, PatientState, Window};
use crate::pipeline::{Modifier, RunContext};
use crate::stats::ModifierStats;

const NAME: &str = "EventCohortDefinition";

const STEP_NO_EVENT: &str = "no qualifying event";
const STEP_PREVALENT: &str = "prevalent event";
const STEP_DOSE: &str = "dose criteria not met";
const STEP_EXCLUSION: &str = "exclusion event";
const STEP_TOO_SHORT: &str = "insufficient cohort time";

/// Settings as written in the workflow file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventCohortSettings {
    /// Start from the cohort window of the previous calculator
    pub chain_cohort_definitions: bool,
    /// `"TYPE;startOffset[;endOffset]"`
    pub events: Vec<String>,
    /// `"ATC;windowStart;windowEnd"` around the event
    pub qualifying_drugs: Vec<String>,
    /// Reject patients whose first event precedes the window
    pub incident_only: bool,
    /// Start prevalent patients at the window start
    pub prevalent_to_start: bool,
    /// `"ATC;minDose;minDuration"`
    pub dose_criteria: Vec<String>,
    /// `"TYPE;start;end"` relative to cohort start
    pub exclusion_events: Vec<String>,
    /// Minimum days of cohort time
    pub minimum_duration: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexEvent {
    event_type: String,
    start_offset: i32,
    end_offset: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
struct DoseCriterion {
    atc: String,
    min_dose: f64,
    min_duration: i32,
}

/// Starts the cohort at the first qualifying event
#[derive(Debug, Clone)]
pub struct EventCohortDefinition {
    chain: bool,
    events: Vec<IndexEvent>,
    qualifying_drugs: Vec<RelativeWindow>,
    incident_only: bool,
    prevalent_to_start: bool,
    dose_criteria: Vec<DoseCriterion>,
    exclusion_events: Vec<RelativeWindow>,
    minimum_duration: i32,
}

impl EventCohortDefinition {
    /// Parse the settings
    pub fn from_settings(settings: &EventCohortSettings) -> Result<Self> {
        let events = parse_all(NAME, &settings.events, |rule: &RuleParser<'_>| {
            rule.expect_fields(2, 3)?;
            Ok(IndexEvent {
                event_type: rule.text(0)?.to_string(),
                start_offset: rule.int(1)?,
                end_offset: rule.opt_int(2)?,
            })
        })?;
        if events.is_empty() {
            return Err(Error::config(NAME, "no index events defined"));
        }
        if settings.incident_only && settings.prevalent_to_start {
            return Err(Error::config(NAME, "incidentOnly and prevalentToStart exclude each other"));
        }

        Ok(Self {
            chain: settings.chain_cohort_definitions,
            events,
            qualifying_drugs: parse_all(NAME, &settings.qualifying_drugs, RelativeWindow::parse)?,
            incident_only: settings.incident_only,
            prevalent_to_start: settings.prevalent_to_start,
            dose_criteria: parse_all(NAME, &settings.dose_criteria, |rule| {
                rule.expect_fields(3, 3)?;
                Ok(DoseCriterion {
                    atc: rule.text(0)?.to_string(),
                    min_dose: rule.float(1)?,
                    min_duration: rule.int(2)?,
                })
            })?,
            exclusion_events: parse_all(NAME, &settings.exclusion_events, RelativeWindow::parse)?,
            minimum_duration: settings.minimum_duration,
        })
    }

    fn index_rule(&self, event: &Event) -> Option<&IndexEvent> {
        self.events.iter().find(|r| r.event_type == event.event_type)
    }

    fn has_qualifying_drug(&self, patient: &Patient, event: &Event) -> bool {
        self.qualifying_drugs.is_empty()
            || self.qualifying_drugs.iter().any(|rule| {
                let window = rule.around(event.date);
                patient
                    .prescriptions
                    .iter()
                    .any(|p| p.matches_atc(&rule.code) && window.overlaps(p.date, p.end()))
            })
    }

    /// Narrow `candidate` to the cohort window, or name the rejection reason
    fn evaluate(&self, patient: &Patient, mut candidate: CohortCandidate) -> std::result::Result<CohortCandidate, &'static str> {
        let mut index = None;
        for event in &patient.events {
            if event.date >= candidate.end {
                break;
            }
            let Some(rule) = self.index_rule(event) else {
                continue;
            };
            if !self.has_qualifying_drug(patient, event) {
                continue;
            }
            if event.date < candidate.start {
                if self.incident_only {
                    return Err(STEP_PREVALENT);
                }
                if !self.prevalent_to_start {
                    continue;
                }
            }
            index = Some((event, rule));
            break;
        }
        let Some((event, rule)) = index else {
            return Err(STEP_NO_EVENT);
        };

        candidate.move_start(event.date + rule.start_offset);
        if let Some(end_offset) = rule.end_offset {
            candidate.truncate(event.date + end_offset);
        }

        for criterion in &self.dose_criteria {
            let first = patient.prescriptions.iter().find(|p| {
                p.matches_atc(&criterion.atc)
                    && Window::new(p.date, p.end()).overlaps(candidate.start, candidate.end)
                    && p.duration >= criterion.min_duration
                    && p.dose_value().is_some_and(|dose| dose >= criterion.min_dose)
            });
            match first {
                Some(p) => candidate.move_start(p.date),
                None => return Err(STEP_DOSE),
            }
        }

        let start = candidate.start;
        if self.exclusion_events.iter().any(|rule| {
            let window = rule.around(start);
            patient
                .events
                .iter()
                .any(|e| e.event_type == rule.code && window.contains(e.date))
        }) {
            return Err(STEP_EXCLUSION);
        }

        if candidate.is_empty() || candidate.len() < self.minimum_duration {
            return Err(STEP_TOO_SHORT);
        }
        Ok(candidate)
    }
}

impl Modifier for EventCohortDefinition {
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
        declare_steps(
            stats,
            &[STEP_NO_EVENT, STEP_PREVALENT, STEP_DOSE, STEP_EXCLUSION, STEP_TOO_SHORT],
        );
    }

    fn summary(&self, stats: &ModifierStats) -> String {
        cohort_summary(NAME, stats)
    }
}
