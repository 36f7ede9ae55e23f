//! Prescription based cohort definition
//!
//! The cohort starts at the first naive use of a drug of interest inside the
//! candidate window. A drug of interest is either an ATC prefix (which also
//! matches synthetic combination labels) or a free combination written
//! `_A10BA/A10BH`, whose components must start together or keep overlapping.
//! Endpoints then truncate the window and exclusions void it.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{CohortCandidate, RelativeWindow, cohort_summary, declare_steps, reject};
use crate::algorithm::drug_groups::free_combination_components;
use crate::algorithm::rules::{RuleParser, parse_all, split_list};
use crate::error::{Error, Result};
use crate::models::{Patient, PatientState, Prescription, Window};
use crate::pipeline::{Modifier, RunContext};
use crate::stats::{Dim, ModifierStats};
use crate::utils::date::Day;

const NAME: &str = "PrescriptionCohortDefinition";

const STEP_NO_DRUG: &str = "no drug of interest";
const STEP_NOT_NAIVE: &str = "not naive";
const STEP_NO_INCLUSION_EVENT: &str = "no inclusion event";
const STEP_PREVALENT_ENDPOINT: &str = "prevalent endpoint event";
const STEP_DRUG_EXCLUSION: &str = "excluded drug";
const STEP_CONCOMITANT: &str = "concomitant drug";
const STEP_NO_TIME: &str = "endpoint at cohort start";

/// Which earlier prescriptions break naivety
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NaiveScope {
    /// Drugs of interest only
    #[default]
    Class,
    /// Drugs of interest and endpoint drugs
    ClassAndEndpoints,
}

/// How the components of a free combination must start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinationStart {
    /// Every component starts on the same day
    Simultaneous,
    /// Components already running must overlap the starting one for this many days
    Overlap(i32),
}

impl CombinationStart {
    fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("simultaneous") {
            return Ok(Self::Simultaneous);
        }
        match text.parse::<i32>() {
            Ok(days) if days >= 0 => Ok(Self::Overlap(days)),
            _ => Err(Error::config(
                NAME,
                format!("freeCombinationStart must be \"simultaneous\" or a day count, found \"{text}\""),
            )),
        }
    }
}

impl fmt::Display for CombinationStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simultaneous => f.write_str("simultaneous"),
            Self::Overlap(days) => write!(f, "overlap of {days} days"),
        }
    }
}

/// Settings as written in the workflow file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrescriptionCohortSettings {
    /// Start from the cohort window of the previous calculator
    pub chain_cohort_definitions: bool,
    /// ATC prefixes or free combinations such as `_A10BA/A10BH`
    pub drugs_of_interest: Vec<String>,
    /// Days without use required before a start counts
    pub naive_period: i32,
    /// Which prescriptions count as prior use
    pub naive_scope: NaiveScope,
    /// Keep searching past non-naive or non-qualifying starts
    pub extended_search: bool,
    /// Scan same-day prescriptions longest first
    pub sort_by_duration: bool,
    /// `"simultaneous"` or the minimum overlap in days
    pub free_combination_start: String,
    /// Ignore combination prescriptions whose components did not start together
    pub require_all_components_start: bool,
    /// `"TYPE;start;end"` around the start, at least one must be present
    pub inclusion_events: Vec<String>,
    /// ATC prefixes whose start ends the cohort
    pub endpoint_drugs: Vec<String>,
    /// Days an endpoint drug may already run at cohort start
    pub endpoint_grace: i32,
    /// `"TYPE[;incident]"`
    pub endpoint_events: Vec<String>,
    /// `"ATC;start;end"` around the start
    pub drug_exclusions: Vec<String>,
    /// Days an excluded drug may overlap its window
    pub exclusion_grace: i32,
    /// ATC prefixes that may not be in use on the start day
    pub concomitant_exclusions: Vec<String>,
    /// End the cohort this many days after the drug of interest stops
    pub extend_at_drug_end: Option<i32>,
    /// Components of a free combination whose end decides when it stops
    pub stopping_components: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DrugOfInterest {
    Prefix(String),
    Free { label: String, components: Vec<String> },
}

impl DrugOfInterest {
    fn parse(text: &str) -> Result<Self> {
        if text.starts_with('_') {
            let components = free_combination_components(text)
                .ok_or_else(|| Error::config(NAME, format!("free combination \"{text}\" needs at least two components")))?;
            return Ok(Self::Free {
                label: text.to_string(),
                components,
            });
        }
        Ok(Self::Prefix(text.to_string()))
    }

    fn covers(&self, p: &Prescription) -> bool {
        match self {
            Self::Prefix(prefix) => p.matches_atc(prefix),
            Self::Free { components, .. } => !p.is_combination() && p.matches_any(components),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EndpointEvent {
    event_type: String,
    incident: bool,
}

/// The qualifying start found for a patient
#[derive(Debug, Clone)]
struct Start<'a> {
    date: Day,
    label: String,
    members: Vec<&'a Prescription>,
    drug_end: Day,
}

impl Start<'_> {
    /// Latest end of use that began before the first member started
    fn prior_use(&self, prior: &[&Prescription]) -> Option<Day> {
        let first = self.members.iter().map(|m| m.date).min().unwrap_or(self.date);
        prior
            .iter()
            .filter(|q| q.date < first && !self.members.iter().any(|m| std::ptr::eq(*m, **q)))
            .map(|q| q.end())
            .max()
    }

    /// Whether `p` belongs to the qualifying drug itself
    fn is_part_of(&self, p: &Prescription) -> bool {
        self.members.iter().any(|m| {
            std::ptr::eq(*m, p)
                || m.combination.as_ref().is_some_and(|info| {
                    info.components.contains(&p.atc) && Window::new(m.date, m.end()).overlaps(p.date, p.end())
                })
        })
    }
}

/// Starts the cohort at the first naive use of a drug of interest
#[derive(Debug, Clone)]
pub struct PrescriptionCohortDefinition {
    chain: bool,
    drugs: Vec<DrugOfInterest>,
    naive_period: i32,
    naive_scope: NaiveScope,
    extended_search: bool,
    sort_by_duration: bool,
    combination_start: CombinationStart,
    require_all_components_start: bool,
    inclusion_events: Vec<RelativeWindow>,
    endpoint_drugs: Vec<String>,
    endpoint_grace: i32,
    endpoint_events: Vec<EndpointEvent>,
    drug_exclusions: Vec<RelativeWindow>,
    exclusion_grace: i32,
    concomitant_exclusions: Vec<String>,
    extend_at_drug_end: Option<i32>,
    stopping_components: Vec<String>,
}

impl PrescriptionCohortDefinition {
    /// Parse the settings
    pub fn from_settings(settings: &PrescriptionCohortSettings) -> Result<Self> {
        let drugs = settings
            .drugs_of_interest
            .iter()
            .flat_map(|entry| split_list(entry))
            .map(|d| DrugOfInterest::parse(&d))
            .collect::<Result<Vec<_>>>()?;
        if drugs.is_empty() {
            return Err(Error::config(NAME, "no drugs of interest defined"));
        }
        if settings.naive_period < 0 || settings.endpoint_grace < 0 || settings.exclusion_grace < 0 {
            return Err(Error::config(NAME, "negative period"));
        }

        let endpoint_events = parse_all(NAME, &settings.endpoint_events, |rule: &RuleParser<'_>| {
            rule.expect_fields(1, 2)?;
            let incident = match rule.opt_text(1) {
                None => false,
                Some(flag) if flag.eq_ignore_ascii_case("incident") => true,
                Some(flag) => return Err(rule.error(format!("unknown flag \"{flag}\""))),
            };
            Ok(EndpointEvent {
                event_type: rule.text(0)?.to_string(),
                incident,
            })
        })?;

        Ok(Self {
            chain: settings.chain_cohort_definitions,
            drugs,
            naive_period: settings.naive_period,
            naive_scope: settings.naive_scope,
            extended_search: settings.extended_search,
            sort_by_duration: settings.sort_by_duration,
            combination_start: CombinationStart::parse(&settings.free_combination_start)?,
            require_all_components_start: settings.require_all_components_start,
            inclusion_events: parse_all(NAME, &settings.inclusion_events, RelativeWindow::parse)?,
            endpoint_drugs: settings.endpoint_drugs.iter().flat_map(|e| split_list(e)).collect(),
            endpoint_grace: settings.endpoint_grace,
            endpoint_events,
            drug_exclusions: parse_all(NAME, &settings.drug_exclusions, RelativeWindow::parse)?,
            exclusion_grace: settings.exclusion_grace,
            concomitant_exclusions: settings
                .concomitant_exclusions
                .iter()
                .flat_map(|e| split_list(e))
                .collect(),
            extend_at_drug_end: settings.extend_at_drug_end,
            stopping_components: settings.stopping_components.iter().flat_map(|e| split_list(e)).collect(),
        })
    }

    fn in_class(&self, p: &Prescription) -> bool {
        self.drugs.iter().any(|d| d.covers(p))
    }

    fn breaks_naivety(&self, p: &Prescription) -> bool {
        self.in_class(p)
            || (self.naive_scope == NaiveScope::ClassAndEndpoints && p.matches_any(&self.endpoint_drugs))
    }

    /// Start built on `p`, if `p` qualifies as a drug of interest
    fn start_from<'a>(&self, p: &'a Prescription, all: &[&'a Prescription]) -> Option<Start<'a>> {
        self.drugs.iter().find_map(|drug| match drug {
            DrugOfInterest::Prefix(prefix) => {
                if !p.matches_atc(prefix) {
                    return None;
                }
                let partial = p.combination.as_ref().is_some_and(|c| !c.all_components_start);
                if partial && self.require_all_components_start {
                    return None;
                }
                Some(Start {
                    date: p.date,
                    label: p.atc.clone(),
                    members: vec![p],
                    drug_end: p.end(),
                })
            }
            DrugOfInterest::Free { label, components } => {
                if p.is_combination() {
                    return None;
                }
                let own = components.iter().position(|c| p.matches_atc(c))?;
                let mut members = vec![p];
                for (i, component) in components.iter().enumerate() {
                    if i == own {
                        continue;
                    }
                    let partner = all.iter().copied().find(|q| {
                        !q.is_combination() && q.matches_atc(component) && self.joins(q, p)
                    })?;
                    members.push(partner);
                }
                let drug_end = self.combination_end(&members);
                Some(Start {
                    date: p.date,
                    label: label.clone(),
                    members,
                    drug_end,
                })
            }
        })
    }

    /// Whether component `q` joins the combination started by `p`
    fn joins(&self, q: &Prescription, p: &Prescription) -> bool {
        match self.combination_start {
            CombinationStart::Simultaneous => q.date == p.date,
            CombinationStart::Overlap(days) => {
                q.date <= p.date && q.end() > p.date && q.end().min(p.end()) - p.date >= days
            }
        }
    }

    fn combination_end(&self, members: &[&Prescription]) -> Day {
        let stopping = members
            .iter()
            .filter(|m| m.matches_any(&self.stopping_components))
            .map(|m| m.end())
            .min();
        stopping
            .or_else(|| members.iter().map(|m| m.end()).min())
            .unwrap_or_default()
    }

    fn naive(&self, date: Day, last_end: Option<Day>, candidate: &CohortCandidate) -> bool {
        self.naive_period == 0
            || (last_end.is_none_or(|end| date - end >= self.naive_period)
                && date - candidate.start >= self.naive_period)
    }

    fn has_inclusion_event(&self, patient: &Patient, date: Day) -> bool {
        self.inclusion_events.is_empty()
            || self.inclusion_events.iter().any(|rule| {
                let window = rule.around(date);
                patient
                    .events
                    .iter()
                    .any(|e| e.event_type == rule.code && window.contains(e.date))
            })
    }

    fn find_start<'a>(
        &self,
        patient: &Patient,
        prescriptions: &[&'a Prescription],
        candidate: &CohortCandidate,
    ) -> std::result::Result<Start<'a>, &'static str> {
        let mut prior: Vec<&Prescription> = Vec::new();
        let mut failure = STEP_NO_DRUG;

        for &p in prescriptions {
            if p.date >= candidate.end {
                break;
            }
            if p.date >= candidate.start && self.in_class(p) {
                if let Some(start) = self.start_from(p, prescriptions) {
                    let reason = if !self.naive(start.date, start.prior_use(&prior), candidate) {
                        Some(STEP_NOT_NAIVE)
                    } else if !self.has_inclusion_event(patient, start.date) {
                        Some(STEP_NO_INCLUSION_EVENT)
                    } else {
                        None
                    };
                    match reason {
                        None => return Ok(start),
                        Some(reason) if !self.extended_search => return Err(reason),
                        Some(reason) => failure = reason,
                    }
                }
            }
            if self.breaks_naivety(p) {
                prior.push(p);
            }
        }
        Err(failure)
    }

    fn evaluate<'a>(
        &self,
        patient: &'a Patient,
        mut candidate: CohortCandidate,
    ) -> std::result::Result<(CohortCandidate, Start<'a>), &'static str> {
        let mut prescriptions: Vec<&Prescription> = patient.prescriptions.iter().collect();
        if self.sort_by_duration {
            prescriptions.sort_by(|a, b| a.date.cmp(&b.date).then(b.duration.cmp(&a.duration)));
        } else {
            prescriptions.sort_by_key(|p| p.date);
        }

        let start = self.find_start(patient, &prescriptions, &candidate)?;
        candidate.move_start(start.date);
        let day = candidate.start;

        if let Some(days) = self.extend_at_drug_end {
            candidate.truncate(start.drug_end + days);
        }

        for q in prescriptions
            .iter()
            .filter(|q| q.matches_any(&self.endpoint_drugs) && !start.is_part_of(q))
        {
            if q.date >= day {
                candidate.truncate(q.date);
            } else if q.end() > day && q.end() - day > self.endpoint_grace {
                candidate.truncate(day);
            }
        }

        for rule in &self.endpoint_events {
            for event in patient.events.iter().filter(|e| e.event_type == rule.event_type) {
                if event.date < day {
                    if rule.incident {
                        return Err(STEP_PREVALENT_ENDPOINT);
                    }
                } else {
                    candidate.truncate(event.date);
                }
            }
        }

        for rule in &self.drug_exclusions {
            let window = rule.around(day);
            if prescriptions.iter().any(|q| {
                q.matches_atc(&rule.code)
                    && !start.is_part_of(q)
                    && window.overlap(q.date, q.end()) > self.exclusion_grace
            }) {
                return Err(STEP_DRUG_EXCLUSION);
            }
        }

        if prescriptions
            .iter()
            .any(|q| q.matches_any(&self.concomitant_exclusions) && !start.is_part_of(q) && q.is_active_on(day))
        {
            return Err(STEP_CONCOMITANT);
        }

        if candidate.is_empty() {
            return Err(STEP_NO_TIME);
        }
        Ok((candidate, start))
    }
}

impl Modifier for PrescriptionCohortDefinition {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, patient: &mut Patient, state: &mut PatientState, _ctx: &RunContext, stats: &mut ModifierStats) {
        let Some(candidate) = CohortCandidate::seed(state, self.chain, stats) else {
            return;
        };
        let outcome = self
            .evaluate(patient, candidate)
            .map(|(candidate, start)| (candidate, start.label));
        match outcome {
            Ok((candidate, label)) => {
                stats.counters.increment(&["startDrug".into(), label.into()]);
                candidate.commit(state, stats);
            }
            Err(reason) => reject(state, stats, reason),
        }
    }

    fn prepare(&self, stats: &mut ModifierStats) {
        declare_steps(
            stats,
            &[
                STEP_NO_DRUG,
                STEP_NOT_NAIVE,
                STEP_NO_INCLUSION_EVENT,
                STEP_PREVALENT_ENDPOINT,
                STEP_DRUG_EXCLUSION,
                STEP_CONCOMITANT,
                STEP_NO_TIME,
            ],
        );
    }

    fn summary(&self, stats: &ModifierStats) -> String {
        let mut out = cohort_summary(NAME, stats);
        for (key, cell) in stats.counters.sorted_entries() {
            if key.len() == 2 && key[0] == Dim::from("startDrug") {
                out.push_str(&format!("  started on {}: {}\n", key[1], cell.count));
            }
        }
        out
    }
}
