//! Population window calculation
//!
//! Turns each patient's observed time into the window during which the
//! patient is eligible for the study, or excludes the patient. The checks run
//! in a fixed order and the first failure decides the attrition reason.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::algorithm::rules::{RuleParser, parse_all};
use crate::error::{Error, Result};
use crate::models::{Patient, PatientState, Window};
use crate::pipeline::{Modifier, RunContext};
use crate::stats::ModifierStats;
use crate::utils::date::{self, DateFormatConfig, Day, parse_day};

const NAME: &str = "PopulationDefinition";
const FALLBACK_DATABASE: &str = "OTHER";

const STEP_PATIENTS: &str = "patients";
const STEP_PATIENT_TIME: &str = "insufficient patient time";
const STEP_STUDY_PERIOD: &str = "insufficient time in study period";
const STEP_AGE: &str = "insufficient time in age range";
const STEP_INCLUDED: &str = "in population";

/// Settings as written in the workflow file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PopulationSettings {
    /// `"DB;days"` entries with an optional `OTHER` fallback, or one plain number
    pub run_in_period: Vec<String>,
    /// Patients younger than this many days at observation start skip the run-in
    pub child_inclusion_period: i32,
    /// Move the start of such children back to their birth date
    pub child_to_birth_date: bool,
    /// Minimum days of patient time left after every clip
    pub minimum_days_of_patient_time: i32,
    /// First day of the study period
    pub study_start: Option<String>,
    /// Last day of the study period (exclusive)
    pub study_end: Option<String>,
    /// Minimum age in years
    pub min_age: Option<u32>,
    /// Maximum age in years; patient time ends on the next birthday
    pub max_age: Option<u32>,
    /// Count the end day as part of the window
    pub inclusive_end: bool,
}

/// Run-in period per database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunIn {
    per_database: FxHashMap<String, i32>,
    fallback: i32,
}

impl RunIn {
    /// Parse `"DB;days"` entries or a single plain value
    pub fn parse(entries: &[String]) -> Result<Self> {
        let non_empty: Vec<&String> = entries.iter().filter(|e| !e.trim().is_empty()).collect();
        if let [single] = non_empty.as_slice() {
            if !single.contains(';') {
                let fallback = RuleParser::new(NAME, single).int(0)?;
                if fallback < 0 {
                    return Err(Error::config(NAME, format!("negative run-in \"{single}\"")));
                }
                return Ok(Self {
                    per_database: FxHashMap::default(),
                    fallback,
                });
            }
        }

        let mut run_in = Self::default();
        let parsed = parse_all(NAME, entries, |rule| {
            rule.expect_fields(2, 2)?;
            Ok((rule.text(0)?.to_string(), rule.int(1)?))
        })?;
        for (database, days) in parsed {
            if days < 0 {
                return Err(Error::config(NAME, format!("negative run-in for {database}")));
            }
            if database.eq_ignore_ascii_case(FALLBACK_DATABASE) {
                run_in.fallback = days;
            } else if run_in.per_database.insert(database.clone(), days).is_some() {
                return Err(Error::config(NAME, format!("duplicate run-in for {database}")));
            }
        }
        Ok(run_in)
    }

    /// Run-in days for `database`
    #[must_use]
    pub fn days_for(&self, database: &str) -> i32 {
        self.per_database.get(database).copied().unwrap_or(self.fallback)
    }
}

/// Computes the population window of every patient
#[derive(Debug, Clone)]
pub struct PopulationDefinition {
    run_in: RunIn,
    child_inclusion_period: i32,
    child_to_birth_date: bool,
    minimum_days: i32,
    study: Window,
    min_age: Option<u32>,
    max_age: Option<u32>,
    inclusive_end: bool,
}

impl PopulationDefinition {
    /// Parse the settings; study dates are read with `formats`
    pub fn from_settings(settings: &PopulationSettings, formats: &DateFormatConfig) -> Result<Self> {
        let parse_date = |value: &Option<String>, what: &str| -> Result<Option<Day>> {
            value
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_day(s, formats).ok_or_else(|| Error::config(NAME, format!("invalid {what} \"{s}\""))))
                .transpose()
        };
        let study = Window::new(
            parse_date(&settings.study_start, "study start")?.unwrap_or(Day::MIN),
            parse_date(&settings.study_end, "study end")?.unwrap_or(Day::MAX),
        );
        if study.is_empty() {
            return Err(Error::config(NAME, "study end precedes study start"));
        }
        if let (Some(min), Some(max)) = (settings.min_age, settings.max_age) {
            if max < min {
                return Err(Error::config(NAME, format!("maximum age {max} below minimum age {min}")));
            }
        }
        if settings.minimum_days_of_patient_time < 0 || settings.child_inclusion_period < 0 {
            return Err(Error::config(NAME, "negative period"));
        }

        Ok(Self {
            run_in: RunIn::parse(&settings.run_in_period)?,
            child_inclusion_period: settings.child_inclusion_period,
            child_to_birth_date: settings.child_to_birth_date,
            minimum_days: settings.minimum_days_of_patient_time,
            study,
            min_age: settings.min_age,
            max_age: settings.max_age,
            inclusive_end: settings.inclusive_end,
        })
    }

    /// Population window of `patient`, or the attrition step that excluded it
    pub fn window(&self, patient: &Patient, database: &str) -> std::result::Result<Window, &'static str> {
        let mut window = patient.observation();

        if patient.age_in_days(window.start) < self.child_inclusion_period {
            if self.child_to_birth_date {
                window.start = patient.birth_date;
            }
        } else {
            window.start += self.run_in.days_for(database);
        }
        self.check(window, STEP_PATIENT_TIME)?;

        window.start = window.start.max(self.study.start);
        window.end = window.end.min(self.study.end);
        self.check(window, STEP_STUDY_PERIOD)?;

        if let Some(min_age) = self.min_age {
            let day = date::birthday(patient.birth_date, min_age).unwrap_or(Day::MAX);
            window.start = window.start.max(day);
        }
        if let Some(max_age) = self.max_age {
            let day = date::birthday(patient.birth_date, max_age + 1).unwrap_or(Day::MAX);
            window.end = window.end.min(day);
        }
        self.check(window, STEP_AGE)?;

        if self.inclusive_end {
            window.end += 1;
        }
        Ok(window)
    }

    fn check(&self, window: Window, step: &'static str) -> std::result::Result<(), &'static str> {
        if window.is_empty() || window.len() < self.minimum_days {
            return Err(step);
        }
        Ok(())
    }
}

impl Modifier for PopulationDefinition {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, patient: &mut Patient, state: &mut PatientState, ctx: &RunContext, stats: &mut ModifierStats) {
        stats.attrition.record(STEP_PATIENTS);
        match self.window(patient, &ctx.database) {
            Ok(window) => {
                state.population = Some(window);
                state.cohort = Some(window);
                stats.attrition.record(STEP_INCLUDED);
                stats.counters.add(&["populationTime".into()], f64::from(window.len()));
            }
            Err(step) => {
                state.population = None;
                state.cohort = None;
                stats.attrition.record(step);
            }
        }
    }

    fn prepare(&self, stats: &mut ModifierStats) {
        for step in [STEP_PATIENTS, STEP_PATIENT_TIME, STEP_STUDY_PERIOD, STEP_AGE, STEP_INCLUDED] {
            stats.attrition.declare(step);
        }
    }

    fn summary(&self, stats: &ModifierStats) -> String {
        let mut out = stats.attrition.render(NAME);
        let time = stats.counters.get(&["populationTime".into()]);
        out.push_str(&format!(
            "  population time: {} days, mean {:.1} days per patient\n",
            time.sum,
            time.mean()
        ));
        out
    }
}

impl fmt::Display for PopulationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Population Definition:")?;
        writeln!(f, "  Run-in (fallback): {} days", self.run_in.fallback)?;
        writeln!(f, "  Child Inclusion Period: {} days", self.child_inclusion_period)?;
        writeln!(f, "  Minimum Patient Time: {} days", self.minimum_days)?;
        if let Some(min_age) = self.min_age {
            writeln!(f, "  Minimum Age: {min_age}")?;
        }
        if let Some(max_age) = self.max_age {
            writeln!(f, "  Maximum Age: {max_age}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> Day {
        date::to_day(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn definition(settings: PopulationSettings) -> PopulationDefinition {
        PopulationDefinition::from_settings(&settings, &DateFormatConfig::default()).unwrap()
    }

    #[test]
    fn test_child_inclusion() {
        let patient = Patient::new("P1", Gender::Female, 0, 10, 1000);
        let settings = PopulationSettings {
            run_in_period: vec!["30".to_string()],
            child_inclusion_period: 365,
            ..Default::default()
        };

        let without = definition(settings.clone());
        assert_eq!(without.window(&patient, "IPCI").unwrap().start, 10);

        let to_birth = definition(PopulationSettings {
            child_to_birth_date: true,
            ..settings
        });
        assert_eq!(to_birth.window(&patient, "IPCI").unwrap().start, 0);
    }

    #[test]
    fn test_run_in_per_database() {
        let run_in = RunIn::parse(&["IPCI;365".to_string(), "OTHER;180".to_string()]).unwrap();
        assert_eq!(run_in.days_for("IPCI"), 365);
        assert_eq!(run_in.days_for("THIN"), 180);

        let patient = Patient::new("P1", Gender::Male, -20_000, 0, 1000);
        let population = definition(PopulationSettings {
            run_in_period: vec!["IPCI;365".to_string(), "OTHER;180".to_string()],
            ..Default::default()
        });
        assert_eq!(population.window(&patient, "IPCI"), Ok(Window::new(365, 1000)));
        assert_eq!(population.window(&patient, "THIN"), Ok(Window::new(180, 1000)));
    }

    #[test]
    fn test_minimum_patient_time() {
        let patient = Patient::new("P1", Gender::Male, -20_000, 0, 400);
        let population = definition(PopulationSettings {
            run_in_period: vec!["100".to_string()],
            minimum_days_of_patient_time: 365,
            ..Default::default()
        });
        assert_eq!(population.window(&patient, "X"), Err(STEP_PATIENT_TIME));
    }

    #[test]
    fn test_study_period_clip() {
        let patient = Patient::new("P1", Gender::Male, day(1950, 1, 1), day(2000, 1, 1), day(2010, 1, 1));
        let population = definition(PopulationSettings {
            study_start: Some("2005-01-01".to_string()),
            study_end: Some("20080101".to_string()),
            ..Default::default()
        });
        assert_eq!(
            population.window(&patient, "X"),
            Ok(Window::new(day(2005, 1, 1), day(2008, 1, 1)))
        );

        let outside = definition(PopulationSettings {
            study_start: Some("2011-01-01".to_string()),
            ..Default::default()
        });
        assert_eq!(outside.window(&patient, "X"), Err(STEP_STUDY_PERIOD));
    }

    #[test]
    fn test_age_clip_uses_birthdays() {
        let birth = day(1992, 2, 29);
        let patient = Patient::new("P1", Gender::Female, birth, day(2000, 1, 1), day(2020, 1, 1));
        let population = definition(PopulationSettings {
            min_age: Some(18),
            max_age: Some(20),
            ..Default::default()
        });
        assert_eq!(
            population.window(&patient, "X"),
            Ok(Window::new(day(2010, 2, 28), day(2013, 2, 28)))
        );
    }

    #[test]
    fn test_in_population_windows_meet_minimum() {
        let population = definition(PopulationSettings {
            run_in_period: vec!["30".to_string()],
            minimum_days_of_patient_time: 100,
            min_age: Some(1),
            ..Default::default()
        });
        for (start, end) in [(0, 50), (0, 129), (0, 130), (200, 5000), (-400, 100)] {
            let patient = Patient::new("P", Gender::Unknown, -365, start, end);
            if let Ok(window) = population.window(&patient, "X") {
                assert!(window.len() >= 100, "{window} too short");
            }
        }
    }

    #[test]
    fn test_inclusive_end_and_state() {
        let population = definition(PopulationSettings {
            inclusive_end: true,
            ..Default::default()
        });
        let mut patient = Patient::new("P1", Gender::Male, -20_000, 0, 100);
        let mut state = PatientState::default();
        let mut stats = ModifierStats::new();
        population.prepare(&mut stats);
        population.process(&mut patient, &mut state, &RunContext::new("X"), &mut stats);

        assert_eq!(state.population, Some(Window::new(0, 101)));
        assert_eq!(state.cohort, state.population);
        assert_eq!(stats.attrition.get(STEP_INCLUDED), 1);
    }

    #[test]
    fn test_invalid_settings() {
        let bad_date = PopulationSettings {
            study_start: Some("not a date".to_string()),
            ..Default::default()
        };
        assert!(PopulationDefinition::from_settings(&bad_date, &DateFormatConfig::default()).is_err());

        let bad_run_in = PopulationSettings {
            run_in_period: vec!["IPCI;abc".to_string()],
            ..Default::default()
        };
        assert!(PopulationDefinition::from_settings(&bad_run_in, &DateFormatConfig::default()).is_err());
    }
}
