//! BMI derivation
//!
//! Pairs every weight with the nearest height of the same life stage,
//! calculates a BMI, reconciles it with any BMI measured on the same day and
//! appends the validated BMI, its category and the body surface area to the
//! patient's measurements.
//!
//! Adults pair heights up to `adultMaxTimeSpan` days away and date the BMI on
//! the weight; children use the shorter `childMaxTimeSpan` and the later of the
//! two dates. Adult categories use fixed BMI cut-offs, child categories the
//! percentile from an LMS growth reference.

pub mod lms;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use self::lms::{DAYS_PER_MONTH, LmsReference};
use crate::error::{Error, Result};
use crate::models::{Measurement, Patient, PatientState};
use crate::pipeline::{Modifier, RunContext};
use crate::stats::{Dim, ModifierStats};
use crate::utils::date::Day;

const NAME: &str = "BMICalculation";
const OUTPUT_FILE: &str = "bmi";

const STEP_PATIENTS: &str = "patients";
const STEP_WITH_BMI: &str = "patients with a BMI";

/// Settings as written in the workflow file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BmiSettings {
    /// Measurement types holding weights
    pub weight_types: Vec<String>,
    /// Measurement types holding heights
    pub height_types: Vec<String>,
    /// Measurement types holding measured BMIs
    pub bmi_types: Vec<String>,
    /// Type of the appended validated BMI
    pub bmi_output_type: String,
    /// Type of the appended BMI category
    pub category_output_type: String,
    /// Type of the appended body surface area, none when empty
    pub bsa_output_type: String,
    /// Age in years from which a patient counts as an adult
    pub adult_age: u32,
    /// Maximum days between an adult weight and height
    pub adult_max_time_span: i32,
    /// Maximum days between a child weight and height
    pub child_max_time_span: i32,
    /// Multiplier bringing weights to kilograms
    pub weight_factor: f64,
    /// Multiplier bringing heights to metres
    pub height_factor: f64,
    /// Smallest plausible BMI
    pub min_bmi: f64,
    /// Largest plausible BMI
    pub max_bmi: f64,
    /// Largest difference at which a measured and a calculated BMI agree
    pub agreement_tolerance: f64,
    /// Use measurements outside the observation period
    pub keep_outside_patient_time: bool,
    /// `sex,ageMonths,L,M,S` growth reference for children
    pub lms_reference: Option<PathBuf>,
    /// Child percentile from which a BMI is overweight
    pub overweight_percentile: f64,
    /// Child percentile from which a BMI is obese
    pub obese_percentile: f64,
    /// Adult BMI from which a patient is overweight
    pub adult_overweight: f64,
    /// Adult BMI above which a patient is obese
    pub adult_obese: f64,
    /// Write the `bmi` output file
    pub output: bool,
}

impl Default for BmiSettings {
    fn default() -> Self {
        Self {
            weight_types: vec!["WEIGHT".to_string()],
            height_types: vec!["HEIGHT".to_string()],
            bmi_types: vec!["BMI".to_string()],
            bmi_output_type: "BMI_RESULT".to_string(),
            category_output_type: "BMI_CATEGORY".to_string(),
            bsa_output_type: "BSA".to_string(),
            adult_age: 18,
            adult_max_time_span: 365,
            child_max_time_span: 31,
            weight_factor: 1.0,
            height_factor: 1.0,
            min_bmi: 10.0,
            max_bmi: 60.0,
            agreement_tolerance: 0.1,
            keep_outside_patient_time: false,
            lms_reference: None,
            overweight_percentile: 85.0,
            obese_percentile: 95.0,
            adult_overweight: 25.0,
            adult_obese: 30.0,
            output: false,
        }
    }
}

/// Weight class of a BMI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmiCategory {
    /// Below the overweight cut-off
    Normal,
    /// Between the cut-offs
    Overweight,
    /// Above the obese cut-off
    Obese,
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Overweight => "overweight",
            Self::Obese => "obese",
        })
    }
}

/// Origin of a validated BMI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmiSource {
    /// Measured value only
    Measured,
    /// Calculated value only
    Calculated,
    /// Both present and in agreement
    Agreed,
    /// Both present, measured value kept
    MeasuredOverCalculated,
    /// Both present, measured value was an outlier
    CalculatedOverOutlier,
}

impl BmiSource {
    const fn label(self) -> &'static str {
        match self {
            Self::Measured => "measured",
            Self::Calculated => "calculated",
            Self::Agreed => "agreed",
            Self::MeasuredOverCalculated => "measured preferred",
            Self::CalculatedOverOutlier => "calculated replaces outlier",
        }
    }
}

/// A weight paired with a height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair {
    /// Date the BMI is assigned to
    pub date: Day,
    /// Weight in kilograms
    pub weight: f64,
    /// Height in metres
    pub height: f64,
    /// Day of the weight
    pub weight_date: Day,
    /// Day of the height
    pub height_date: Day,
}

impl Pair {
    /// Body mass index
    #[must_use]
    pub fn bmi(&self) -> f64 {
        self.weight / (self.height * self.height)
    }

    /// Body surface area (Mosteller)
    #[must_use]
    pub fn bsa(&self) -> f64 {
        (self.height * 100.0 * self.weight / 3600.0).sqrt()
    }
}

/// Validated BMI for one day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciled {
    /// Day of the BMI
    pub date: Day,
    /// Chosen value
    pub value: f64,
    /// Where the value came from
    pub source: BmiSource,
    /// Absolute difference between measured and calculated values
    pub discrepancy: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct Dated {
    date: Day,
    value: f64,
}

/// Derives BMI, BMI category and BSA measurements
#[derive(Debug, Clone)]
pub struct BmiCalculation {
    settings: BmiSettings,
    reference: Option<LmsReference>,
}

impl BmiCalculation {
    /// Validate the settings and load the growth reference, if any
    pub fn from_settings(settings: &BmiSettings) -> Result<Self> {
        if settings.weight_types.is_empty() || settings.height_types.is_empty() {
            return Err(Error::config(NAME, "weight and height types are required"));
        }
        if settings.bmi_output_type.trim().is_empty() || settings.category_output_type.trim().is_empty() {
            return Err(Error::config(NAME, "output measurement types may not be empty"));
        }
        if settings.weight_factor <= 0.0 || settings.height_factor <= 0.0 {
            return Err(Error::config(NAME, "weight and height factors must be positive"));
        }
        if settings.min_bmi >= settings.max_bmi {
            return Err(Error::config(NAME, "minBmi must be below maxBmi"));
        }
        if settings.adult_max_time_span < 0 || settings.child_max_time_span < 0 {
            return Err(Error::config(NAME, "time spans may not be negative"));
        }
        if settings.overweight_percentile >= settings.obese_percentile || settings.adult_overweight >= settings.adult_obese {
            return Err(Error::config(NAME, "overweight cut-off must be below obese cut-off"));
        }
        let reference = settings
            .lms_reference
            .as_deref()
            .map(LmsReference::load)
            .transpose()
            .map_err(|e| Error::config(NAME, e.to_string()))?;
        Ok(Self {
            settings: settings.clone(),
            reference,
        })
    }

    fn is_adult(&self, patient: &Patient, day: Day) -> bool {
        patient.age_at(day).is_some_and(|age| age >= self.settings.adult_age)
    }

    fn max_span(&self, adult: bool) -> i32 {
        if adult {
            self.settings.adult_max_time_span
        } else {
            self.settings.child_max_time_span
        }
    }

    fn is_outlier(&self, bmi: f64) -> bool {
        bmi < self.settings.min_bmi || bmi > self.settings.max_bmi
    }

    /// Usable values of the given types, scaled by `factor`; rejects are tallied
    fn usable(&self, patient: &Patient, types: &[String], factor: f64, stats: &mut ModifierStats) -> Vec<Dated> {
        let observation = patient.observation();
        patient
            .measurements
            .iter()
            .filter(|m| m.is_any_of(types))
            .filter_map(|m| {
                let reason = match m.numeric_value() {
                    _ if m.value.trim().is_empty() => "no value",
                    _ if m.date < patient.birth_date => "before birth",
                    None => "non-numeric value",
                    Some(v) if v <= 0.0 => "non-positive value",
                    Some(_) if !self.settings.keep_outside_patient_time && !observation.contains(m.date) => {
                        "outside patient time"
                    }
                    Some(v) => {
                        return Some(Dated {
                            date: m.date,
                            value: v * factor,
                        });
                    }
                };
                stats
                    .counters
                    .increment(&["filtered".into(), m.measurement_type.as_str().into(), reason.into()]);
                None
            })
            .collect()
    }

    /// Pair every weight with the nearest height of the same life stage.
    ///
    /// Equidistant heights resolve to the earlier one.
    #[must_use]
    pub fn pair(&self, patient: &Patient, weights: &[(Day, f64)], heights: &[(Day, f64)]) -> Vec<Pair> {
        weights
            .iter()
            .filter_map(|&(weight_date, weight)| {
                let adult = self.is_adult(patient, weight_date);
                let span = self.max_span(adult);
                let &(height_date, height) = heights
                    .iter()
                    .filter(|(d, _)| (d - weight_date).abs() <= span && self.is_adult(patient, *d) == adult)
                    .min_by_key(|(d, _)| ((d - weight_date).abs(), *d))?;
                let date = if adult { weight_date } else { weight_date.max(height_date) };
                Some(Pair {
                    date,
                    weight,
                    height,
                    weight_date,
                    height_date,
                })
            })
            .collect()
    }

    /// Choose one BMI per day from measured and calculated values
    #[must_use]
    pub fn reconcile(&self, measured: &[(Day, f64)], calculated: &[(Day, f64)]) -> Vec<Reconciled> {
        let mut days: BTreeMap<Day, (Option<f64>, Option<f64>)> = BTreeMap::new();
        for &(day, value) in measured {
            days.entry(day).or_default().0.get_or_insert(value);
        }
        for &(day, value) in calculated {
            days.entry(day).or_default().1.get_or_insert(value);
        }

        days.into_iter()
            .filter_map(|(date, pair)| {
                let (value, source, discrepancy) = match pair {
                    (Some(m), Some(c)) => {
                        let diff = (m - c).abs();
                        if diff <= self.settings.agreement_tolerance {
                            (m, BmiSource::Agreed, None)
                        } else if self.is_outlier(m) {
                            (c, BmiSource::CalculatedOverOutlier, Some(diff))
                        } else {
                            (m, BmiSource::MeasuredOverCalculated, Some(diff))
                        }
                    }
                    (Some(m), None) => (m, BmiSource::Measured, None),
                    (None, Some(c)) => (c, BmiSource::Calculated, None),
                    (None, None) => return None,
                };
                Some(Reconciled {
                    date,
                    value,
                    source,
                    discrepancy,
                })
            })
            .collect()
    }

    /// Category of `bmi` measured on `day`, `None` when no reference covers a child
    #[must_use]
    pub fn categorize(&self, patient: &Patient, day: Day, bmi: f64) -> Option<BmiCategory> {
        let s = &self.settings;
        if self.is_adult(patient, day) {
            return Some(if bmi < s.adult_overweight {
                BmiCategory::Normal
            } else if bmi <= s.adult_obese {
                BmiCategory::Overweight
            } else {
                BmiCategory::Obese
            });
        }
        let age_months = f64::from(patient.age_in_days(day)) / DAYS_PER_MONTH;
        let percentile = self.reference.as_ref()?.percentile(patient.gender, age_months, bmi)?;
        Some(if percentile < s.overweight_percentile {
            BmiCategory::Normal
        } else if percentile < s.obese_percentile {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obese
        })
    }
}

fn value_text(value: f64) -> String {
    format!("{value:.2}")
}

impl Modifier for BmiCalculation {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, patient: &mut Patient, _state: &mut PatientState, ctx: &RunContext, stats: &mut ModifierStats) {
        stats.attrition.record(STEP_PATIENTS);
        let s = &self.settings;
        let as_pairs = |v: Vec<Dated>| v.into_iter().map(|d| (d.date, d.value)).collect::<Vec<_>>();
        let weights = as_pairs(self.usable(patient, &s.weight_types, s.weight_factor, stats));
        let heights = as_pairs(self.usable(patient, &s.height_types, s.height_factor, stats));
        let measured = as_pairs(self.usable(patient, &s.bmi_types, 1.0, stats));

        let pairs = self.pair(patient, &weights, &heights);
        let calculated: Vec<(Day, f64)> = pairs
            .iter()
            .filter_map(|p| {
                let bmi = p.bmi();
                if self.is_outlier(bmi) {
                    stats.counters.increment(&["outlier".into(), "calculated".into()]);
                    None
                } else {
                    Some((p.date, bmi))
                }
            })
            .collect();

        let mut derived = Vec::new();
        let mut any = false;
        for bmi in self.reconcile(&measured, &calculated) {
            if self.is_outlier(bmi.value) {
                stats.counters.increment(&["outlier".into(), "measured".into()]);
                continue;
            }
            any = true;
            stats
                .counters
                .add(&["bmi".into(), bmi.source.label().into()], bmi.value);
            if let Some(diff) = bmi.discrepancy {
                stats.counters.add(&["discrepancy".into()], diff);
            }

            let category = self.categorize(patient, bmi.date, bmi.value);
            match category {
                Some(category) => {
                    stats.counters.increment(&["category".into(), category.to_string().into()]);
                    derived.push(Measurement::new(&s.category_output_type, bmi.date, category.to_string()));
                }
                None => stats.counters.increment(&["category".into(), "no reference".into()]),
            }
            derived.push(Measurement::new(&s.bmi_output_type, bmi.date, value_text(bmi.value)));

            if s.output {
                stats.add_record(
                    OUTPUT_FILE,
                    vec![
                        patient.id.clone(),
                        ctx.format_day(bmi.date),
                        value_text(bmi.value),
                        bmi.source.label().to_string(),
                        bmi.discrepancy.map(value_text).unwrap_or_default(),
                        category.map(|c| c.to_string()).unwrap_or_default(),
                    ],
                );
            }
        }

        if !s.bsa_output_type.is_empty() {
            for pair in &pairs {
                stats.counters.add(&["bsa".into()], pair.bsa());
                derived.push(Measurement::new(&s.bsa_output_type, pair.date, value_text(pair.bsa())));
            }
        }

        if any {
            stats.attrition.record(STEP_WITH_BMI);
        }
        if !derived.is_empty() {
            patient.measurements.extend(derived);
            patient.sort_collections();
        }
    }

    fn prepare(&self, stats: &mut ModifierStats) {
        stats.attrition.declare(STEP_PATIENTS);
        stats.attrition.declare(STEP_WITH_BMI);
    }

    fn output_headers(&self) -> Vec<(String, Vec<String>)> {
        if !self.settings.output {
            return Vec::new();
        }
        vec![(
            OUTPUT_FILE.to_string(),
            ["PatientID", "Date", "BMI", "Source", "Discrepancy", "Category"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        )]
    }

    fn summary(&self, stats: &ModifierStats) -> String {
        let mut out = stats.attrition.render(NAME);
        let discrepancy = stats.counters.get(&["discrepancy".into()]);
        if discrepancy.count > 0 {
            out.push_str(&format!(
                "  disagreeing BMIs: {} (mean difference {:.2})\n",
                discrepancy.count,
                discrepancy.mean()
            ));
        }
        for (key, cell) in stats.counters.sorted_entries() {
            match key.as_slice() {
                [Dim::Text(kind), source] if kind == "bmi" => {
                    out.push_str(&format!("  BMI {source}: {} (mean {:.2})\n", cell.count, cell.mean()));
                }
                [Dim::Text(kind), category] if kind == "category" => {
                    out.push_str(&format!("  category {category}: {}\n", cell.count));
                }
                [Dim::Text(kind), source] if kind == "outlier" => {
                    out.push_str(&format!("  {source} outliers removed: {}\n", cell.count));
                }
                [Dim::Text(kind), mtype, reason] if kind == "filtered" => {
                    out.push_str(&format!("  {mtype} removed, {reason}: {}\n", cell.count));
                }
                _ => {}
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, Window};
    use crate::utils::date::to_day;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> Day {
        to_day(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn adult() -> Patient {
        Patient::new("P1", Gender::Male, day(1970, 1, 1), day(2000, 1, 1), day(2010, 1, 1))
    }

    fn calculation() -> BmiCalculation {
        BmiCalculation::from_settings(&BmiSettings::default()).unwrap()
    }

    fn run(calculation: &BmiCalculation, patient: &mut Patient) -> ModifierStats {
        let mut stats = ModifierStats::new();
        let mut state = PatientState {
            population: Some(Window::new(patient.start_date, patient.end_date)),
            cohort: None,
        };
        calculation.process(patient, &mut state, &RunContext::default(), &mut stats);
        stats
    }

    fn values(patient: &Patient, mtype: &str) -> Vec<(Day, String)> {
        patient
            .measurements
            .iter()
            .filter(|m| m.measurement_type == mtype)
            .map(|m| (m.date, m.value.clone()))
            .collect()
    }

    #[test]
    fn test_nearest_height_example() {
        let base = day(2005, 1, 1);
        let mut patient = adult();
        patient.measurements = vec![
            Measurement::new("HEIGHT", base + 95, "1.70"),
            Measurement::new("WEIGHT", base + 100, "80"),
            Measurement::new("HEIGHT", base + 100, "1.90"),
        ];
        run(&calculation(), &mut patient);
        assert_eq!(values(&patient, "BMI_RESULT"), vec![(base + 100, "22.16".to_string())]);
        assert_eq!(values(&patient, "BMI_CATEGORY"), vec![(base + 100, "normal".to_string())]);
        assert_eq!(values(&patient, "BSA"), vec![(base + 100, "2.05".to_string())]);
    }

    #[test]
    fn test_equidistant_heights_pick_earlier() {
        let base = day(2005, 1, 1);
        let patient = adult();
        let pairs = calculation().pair(&patient, &[(base + 100, 80.0)], &[(base + 110, 1.90), (base + 90, 1.80)]);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].height_date, base + 90);
        assert!((pairs[0].bmi() - 24.69).abs() < 0.01);
    }

    #[test]
    fn test_time_span_and_stage() {
        let calculation = calculation();
        let base = day(2005, 1, 1);
        assert!(calculation.pair(&adult(), &[(base, 80.0)], &[(base - 366, 1.8)]).is_empty());
        assert_eq!(calculation.pair(&adult(), &[(base, 80.0)], &[(base - 365, 1.8)]).len(), 1);

        // Born 1987-06-01: 17 on 2005-05-01, 18 from 2005-06-01.
        let teen = Patient::new("P2", Gender::Female, day(1987, 6, 1), day(2000, 1, 1), day(2010, 1, 1));
        let weight = [(day(2005, 6, 10), 60.0)];
        assert!(calculation.pair(&teen, &weight, &[(day(2005, 5, 20), 1.7)]).is_empty());
        assert_eq!(calculation.pair(&teen, &weight, &[(day(2005, 6, 5), 1.7)]).len(), 1);

        let child = Patient::new("P3", Gender::Female, day(1995, 1, 1), day(2000, 1, 1), day(2010, 1, 1));
        let pairs = calculation.pair(&child, &[(day(2005, 1, 1), 30.0)], &[(day(2005, 1, 20), 1.3)]);
        assert_eq!(pairs[0].date, day(2005, 1, 20));
        assert!(calculation.pair(&child, &[(day(2005, 1, 1), 30.0)], &[(day(2005, 3, 1), 1.3)]).is_empty());
    }

    #[test]
    fn test_same_day_reconciliation() {
        let calculation = calculation();
        let reconciled = calculation.reconcile(
            &[(1, 22.2), (2, 30.0), (3, 80.0), (5, 25.0)],
            &[(1, 22.16), (2, 27.0), (3, 27.0), (4, 24.0)],
        );
        let sources: Vec<_> = reconciled.iter().map(|r| (r.date, r.source)).collect();
        assert_eq!(
            sources,
            vec![
                (1, BmiSource::Agreed),
                (2, BmiSource::MeasuredOverCalculated),
                (3, BmiSource::CalculatedOverOutlier),
                (4, BmiSource::Calculated),
                (5, BmiSource::Measured),
            ]
        );
        assert_eq!(reconciled[1].value, 30.0);
        assert_eq!(reconciled[2].value, 27.0);
        assert!((reconciled[1].discrepancy.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_filtering_is_tallied() {
        let base = day(2005, 1, 1);
        let mut patient = adult();
        patient.measurements = vec![
            Measurement::new("WEIGHT", base, "heavy"),
            Measurement::new("WEIGHT", base, "-3"),
            Measurement::new("WEIGHT", day(2011, 1, 1), "80"),
            Measurement::new("BMI", base, "75"),
            Measurement::new("WEIGHT", base, " "),
            Measurement::new("WEIGHT", day(1969, 6, 1), "3.5"),
        ];
        let stats = run(&calculation(), &mut patient);
        let filtered = |reason: &str| {
            stats
                .counters
                .get(&["filtered".into(), "WEIGHT".into(), reason.into()])
                .count
        };
        assert_eq!(filtered("non-numeric value"), 1);
        assert_eq!(filtered("non-positive value"), 1);
        assert_eq!(filtered("outside patient time"), 1);
        assert_eq!(filtered("no value"), 1);
        assert_eq!(filtered("before birth"), 1);
        assert_eq!(stats.counters.get(&["outlier".into(), "measured".into()]).count, 1);
        assert!(values(&patient, "BMI_RESULT").is_empty());
        assert_eq!(stats.attrition.get(STEP_WITH_BMI), 0);
    }

    #[test]
    fn test_no_bmi_before_birth_outside_patient_time() {
        let calculation = BmiCalculation::from_settings(&BmiSettings {
            keep_outside_patient_time: true,
            ..Default::default()
        })
        .unwrap();
        let mut patient = Patient::new("P1", Gender::Female, 1000, 1000, 3000);
        patient.measurements = vec![
            Measurement::new("HEIGHT", 990, "0.5"),
            Measurement::new("WEIGHT", 990, "3.5"),
            Measurement::new("WEIGHT", 1500, ""),
        ];
        let stats = run(&calculation, &mut patient);
        assert!(values(&patient, "BMI_RESULT").is_empty());
        assert_eq!(
            stats.counters.get(&["filtered".into(), "HEIGHT".into(), "before birth".into()]).count,
            1
        );
        assert_eq!(
            stats.counters.get(&["filtered".into(), "WEIGHT".into(), "no value".into()]).count,
            1
        );
    }

    #[test]
    fn test_adult_categories() {
        let calculation = calculation();
        let patient = adult();
        let d = day(2005, 1, 1);
        assert_eq!(calculation.categorize(&patient, d, 24.9), Some(BmiCategory::Normal));
        assert_eq!(calculation.categorize(&patient, d, 25.0), Some(BmiCategory::Overweight));
        assert_eq!(calculation.categorize(&patient, d, 30.0), Some(BmiCategory::Overweight));
        assert_eq!(calculation.categorize(&patient, d, 30.1), Some(BmiCategory::Obese));
    }

    #[test]
    fn test_child_categories_need_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lms.csv");
        std::fs::write(&path, "sex,ageMonths,L,M,S\nF,96,-1.5,16.2,0.12\nF,144,-1.5,18.5,0.13\n").unwrap();

        let child = Patient::new("P3", Gender::Female, day(1995, 1, 1), day(2000, 1, 1), day(2010, 1, 1));
        let d = day(2005, 1, 1);
        assert_eq!(calculation().categorize(&child, d, 17.0), None);

        let with_reference = BmiCalculation::from_settings(&BmiSettings {
            lms_reference: Some(path),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(with_reference.categorize(&child, d, 16.0), Some(BmiCategory::Normal));
        assert_eq!(with_reference.categorize(&child, d, 30.0), Some(BmiCategory::Obese));
    }

    #[test]
    fn test_invalid_settings() {
        let settings = BmiSettings {
            min_bmi: 70.0,
            ..Default::default()
        };
        assert!(matches!(BmiCalculation::from_settings(&settings), Err(Error::Config { .. })));
    }
}
