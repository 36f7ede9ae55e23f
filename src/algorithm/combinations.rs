//! Combination exposure derivation
//!
//! Maps each prescription to its drug groups, lays them on a [`Timeline`] and
//! emits a synthetic prescription wherever every group of a defined
//! combination is active at once.

use itertools::Itertools;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::algorithm::drug_groups::{Combination, DrugGroups};
use crate::algorithm::timeline::Timeline;
use crate::error::Result;
use crate::models::{CombinationInfo, Patient, PatientState, Prescription};
use crate::pipeline::{Modifier, RunContext};
use crate::stats::ModifierStats;
use crate::utils::date::Day;

const NAME: &str = "PrescriptionCombinations";
const OUTPUT_FILE: &str = "combinations";

/// Settings as written in the workflow file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CombinationSettings {
    /// `"NAME;ATC1,ATC2"`
    pub drug_groups: Vec<String>,
    /// `"NAME;GROUP1,GROUP2[;minDuration]"`
    pub combinations: Vec<String>,
    /// Join back-to-back episodes of the same combination
    pub merge_combinations: bool,
    /// Keep otherwise identical episodes apart when their start flags differ
    pub distinguish_component_start: bool,
    /// Drop the prescriptions that belong to any group
    pub remove_originals: bool,
    /// Write every derived episode to the `combinations` output
    pub output: bool,
}

impl Default for CombinationSettings {
    fn default() -> Self {
        Self {
            drug_groups: Vec::new(),
            combinations: Vec::new(),
            merge_combinations: true,
            distinguish_component_start: false,
            remove_originals: false,
            output: false,
        }
    }
}

/// Derives synthetic combination prescriptions
#[derive(Debug, Clone)]
pub struct PrescriptionCombinations {
    groups: DrugGroups,
    merge: bool,
    distinguish_component_start: bool,
    remove_originals: bool,
    output: bool,
}

impl PrescriptionCombinations {
    /// Parse the settings
    pub fn from_settings(settings: &CombinationSettings) -> Result<Self> {
        let groups = DrugGroups::parse(NAME, &settings.drug_groups, &settings.combinations)?;
        if groups.combinations().is_empty() {
            return Err(crate::error::Error::config(NAME, "no combinations defined"));
        }
        Ok(Self {
            groups,
            merge: settings.merge_combinations,
            distinguish_component_start: settings.distinguish_component_start,
            remove_originals: settings.remove_originals,
            output: settings.output,
        })
    }

    /// Derive the combination prescriptions of one prescription list.
    ///
    /// Synthetic combination prescriptions in the input are ignored, so
    /// running the derivation on its own output adds nothing.
    #[must_use]
    pub fn derive(&self, prescriptions: &[Prescription]) -> Vec<Prescription> {
        let tagged: Vec<(Vec<String>, &Prescription)> = prescriptions
            .iter()
            .filter(|p| !p.is_combination())
            .map(|p| (self.groups.groups_for(&p.atc).into_vec(), p))
            .filter(|(groups, _)| !groups.is_empty())
            .collect();
        let timeline = Timeline::build(tagged.iter().map(|(g, p)| (g.as_slice(), *p)));

        let mut derived = detect(&timeline, self.groups.combinations(), self.distinguish_component_start);
        if self.merge {
            derived = merge_adjacent(derived);
        }

        derived.retain(|p| {
            self.groups
                .combinations()
                .iter()
                .find(|c| c.name == p.atc)
                .is_none_or(|c| p.duration >= c.min_duration)
        });
        derived
    }
}

/// Emit one synthetic prescription per combination instance found on the timeline
#[must_use]
pub fn detect(timeline: &Timeline, combinations: &[Combination], distinguish_component_start: bool) -> Vec<Prescription> {
    let mut seen: FxHashSet<(String, Day, i32, Option<bool>)> = FxHashSet::default();
    let mut derived = Vec::new();

    for interval in timeline.intervals() {
        for combination in combinations {
            if !interval.has_groups(&combination.groups) {
                continue;
            }

            let members = combination
                .groups
                .iter()
                .map(|g| interval.groups[g].iter())
                .multi_cartesian_product();

            for tuple in members {
                let all_components_start = tuple.iter().all(|p| p.date == interval.start);
                let key = (
                    combination.name.clone(),
                    interval.start,
                    interval.len(),
                    distinguish_component_start.then_some(all_components_start),
                );
                if !seen.insert(key) {
                    continue;
                }

                let mut prescription = Prescription::new(&combination.name, interval.start, interval.len());
                if let Some((id, prescriber_type)) = interval.prescriber() {
                    prescription = prescription.with_prescriber(id, prescriber_type.map(str::to_string));
                }
                prescription.combination = Some(CombinationInfo {
                    start_date: tuple.iter().map(|p| p.date).max().unwrap_or(interval.start),
                    all_components_start,
                    components: tuple.iter().map(|p| p.atc.clone()).collect(),
                });
                derived.push(prescription);
            }
        }
    }

    derived
}

/// Join episodes of the same combination where one ends on the day the next starts
#[must_use]
pub fn merge_adjacent(mut prescriptions: Vec<Prescription>) -> Vec<Prescription> {
    prescriptions.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.atc.cmp(&b.atc)));

    let mut merged: Vec<Prescription> = Vec::with_capacity(prescriptions.len());
    for prescription in prescriptions {
        if let Some(previous) = merged
            .iter_mut()
            .rev()
            .find(|q| q.atc == prescription.atc && q.end() == prescription.date)
        {
            if prescription.end() > previous.end() {
                previous.duration = prescription.end() - previous.date;
                continue;
            }
        }
        merged.push(prescription);
    }
    merged
}

impl Modifier for PrescriptionCombinations {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, patient: &mut Patient, _state: &mut PatientState, ctx: &RunContext, stats: &mut ModifierStats) {
        let derived = self.derive(&patient.prescriptions);
        if derived.is_empty() {
            return;
        }

        stats.attrition.record("patients with a combination");
        for prescription in &derived {
            stats
                .counters
                .add(&["combination".into(), prescription.atc.as_str().into()], f64::from(prescription.duration));
            if self.output {
                let info = prescription.combination.as_ref();
                stats.add_record(
                    OUTPUT_FILE,
                    vec![
                        patient.id.clone(),
                        prescription.atc.clone(),
                        ctx.format_day(prescription.date),
                        prescription.duration.to_string(),
                        info.map(|i| i.components.join("/")).unwrap_or_default(),
                        info.is_some_and(|i| i.all_components_start).to_string(),
                    ],
                );
            }
        }

        if self.remove_originals {
            patient
                .prescriptions
                .retain(|p| p.is_combination() || self.groups.groups_for(&p.atc).is_empty());
        }
        patient.prescriptions.extend(derived);
        patient.sort_collections();
    }

    fn prepare(&self, stats: &mut ModifierStats) {
        stats.attrition.declare("patients with a combination");
    }

    fn output_headers(&self) -> Vec<(String, Vec<String>)> {
        if !self.output {
            return Vec::new();
        }
        vec![(
            OUTPUT_FILE.to_string(),
            ["PatientID", "Combination", "Date", "Duration", "Components", "AllComponentsStart"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        )]
    }

    fn summary(&self, stats: &ModifierStats) -> String {
        let mut out = stats.attrition.render(NAME);
        for combination in self.groups.combinations() {
            let cell = stats
                .counters
                .get(&["combination".into(), combination.name.as_str().into()]);
            out.push_str(&format!(
                "  {}: {} episodes, {} days\n",
                combination.name, cell.count, cell.sum
            ));
        }
        out
    }
}
