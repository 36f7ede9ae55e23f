//! Exposure episode merging
//!
//! Prescriptions of a drug class are merged into exposure episodes when a new
//! prescription starts before the running episode's scan date, the last day
//! on which a refill still counts as a continuation. Each rule in the
//! [`AtcIndex`] carries its own gap, extension and stockpiling settings.

use serde::{Deserialize, Serialize};

use crate::algorithm::atc_index::AtcIndex;
use crate::algorithm::rules::{RuleParser, parse_all};
use crate::error::{Error, Result};
use crate::models::{Patient, PatientState, Prescription, prescription::sort_by_date_then_duration};
use crate::pipeline::{Modifier, RunContext};
use crate::stats::{Dim, ModifierStats};
use crate::utils::date::Day;

const NAME: &str = "ExposureDefinition";
const OUTPUT_FILE: &str = "exposures";

/// Settings as written in the workflow file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExposureSettings {
    /// `"ATC;gapDays;gapFraction;extDays;extFraction[;flags]"`
    pub rules: Vec<String>,
    /// Indications that win a merge, highest priority first
    pub indication_priority_high: Vec<String>,
    /// Indications consulted when neither side is in the high list
    pub indication_priority_low: Vec<String>,
    /// Write every merged episode to the `exposures` output
    pub output: bool,
}

/// Merge rule for one ATC prefix
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExposureRule {
    /// Absolute gap tolerance in days
    pub gap_days: i32,
    /// Gap tolerance as a fraction of the prescription's duration
    pub gap_fraction: f64,
    /// Absolute duration extension in days
    pub extension_days: i32,
    /// Duration extension as a fraction of the prescription's duration
    pub extension_fraction: f64,
    /// Add overlapping durations instead of taking the later end
    pub stockpile: bool,
    /// Merge regardless of dose
    pub ignore_dose: bool,
    /// Merge regardless of indication
    pub ignore_indication: bool,
    /// Merge any ATC under the rule's prefix, not only identical codes
    pub class: bool,
}

impl ExposureRule {
    fn parse(rule: &RuleParser<'_>) -> Result<(String, Self)> {
        rule.expect_fields(2, 6)?;
        let atc = rule.text(0)?.to_string();
        let mut parsed = Self {
            gap_days: rule.int(1)?,
            gap_fraction: rule.opt_float(2)?.unwrap_or(0.0),
            extension_days: rule.opt_int(3)?.unwrap_or(0),
            extension_fraction: rule.opt_float(4)?.unwrap_or(0.0),
            ..Self::default()
        };
        if parsed.gap_days < 0 || parsed.gap_fraction < 0.0 {
            return Err(rule.error("negative gap"));
        }
        if parsed.extension_days < 0 || parsed.extension_fraction < 0.0 {
            return Err(rule.error("negative extension"));
        }
        for flag in rule.list(5) {
            match flag.as_str() {
                "stockpile" => parsed.stockpile = true,
                "ignoreDose" => parsed.ignore_dose = true,
                "ignoreIndication" => parsed.ignore_indication = true,
                "class" => parsed.class = true,
                other => return Err(rule.error(format!("unknown flag \"{other}\""))),
            }
        }
        Ok((atc, parsed))
    }

    /// Days after a prescription's end during which a refill continues it
    #[must_use]
    pub fn gap(&self, duration: i32) -> i32 {
        fraction_of(duration, self.gap_fraction).max(self.gap_days)
    }

    /// Days added to a prescription's duration before merging
    #[must_use]
    pub fn extension(&self, duration: i32) -> i32 {
        fraction_of(duration, self.extension_fraction).max(self.extension_days)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn fraction_of(duration: i32, fraction: f64) -> i32 {
    (f64::from(duration) * fraction).round() as i32
}

/// An episode still open for continuation
#[derive(Debug, Clone)]
struct Running<'a> {
    prescription: Prescription,
    rule_id: usize,
    rule: &'a ExposureRule,
    scan_date: Day,
}

/// Merges prescriptions into exposure episodes
#[derive(Debug, Clone)]
pub struct ExposureDefinition {
    rules: AtcIndex<ExposureRule>,
    priority_high: Vec<String>,
    priority_low: Vec<String>,
    output: bool,
}

impl ExposureDefinition {
    /// Parse the settings
    pub fn from_settings(settings: &ExposureSettings) -> Result<Self> {
        let parsed = parse_all(NAME, &settings.rules, ExposureRule::parse)?;
        if parsed.is_empty() {
            return Err(Error::config(NAME, "no exposure rules defined"));
        }
        let mut rules = AtcIndex::new();
        for (atc, rule) in parsed {
            rules
                .insert(&atc, rule)
                .map_err(|message| Error::config(NAME, message))?;
        }
        Ok(Self {
            rules,
            priority_high: settings.indication_priority_high.clone(),
            priority_low: settings.indication_priority_low.clone(),
            output: settings.output,
        })
    }

    /// Merge a prescription list.
    ///
    /// Combination prescriptions and prescriptions no rule covers are
    /// returned untouched. Zero-duration prescriptions under a rule are
    /// dropped and tallied.
    pub fn merge(&self, prescriptions: Vec<Prescription>, stats: &mut ModifierStats) -> Vec<Prescription> {
        let mut result = Vec::with_capacity(prescriptions.len());
        let mut candidates = Vec::new();

        for prescription in prescriptions {
            if prescription.is_combination() {
                result.push(prescription);
                continue;
            }
            let Some((rule_id, rule)) = self.rules.lookup(&prescription.atc) else {
                result.push(prescription);
                continue;
            };
            if prescription.duration <= 0 {
                stats.counters.increment(&[
                    "zeroDuration".into(),
                    prescription.atc.as_str().into(),
                    prescription.indication.as_deref().unwrap_or("").into(),
                ]);
                continue;
            }

            stats.counters.add(&["original".into()], f64::from(prescription.duration));
            let gap = rule.gap(prescription.duration);
            let mut extended = prescription;
            extended.duration += rule.extension(extended.duration);
            candidates.push((extended, rule_id, rule, gap));
        }

        candidates.sort_by(|(a, ..), (b, ..)| a.date.cmp(&b.date).then(b.duration.cmp(&a.duration)));

        let mut running: Vec<Running<'_>> = Vec::new();
        let mut episodes = Vec::new();
        for (prescription, rule_id, rule, gap) in candidates {
            let (flushed, open): (Vec<_>, Vec<_>) = running
                .into_iter()
                .partition(|r| r.scan_date < prescription.date);
            episodes.extend(flushed.into_iter().map(|r| r.prescription));
            running = open;

            match running
                .iter_mut()
                .find(|r| r.rule_id == rule_id && continues(rule, &r.prescription, &prescription))
            {
                Some(entry) => self.absorb(entry, prescription, gap),
                None => {
                    let scan_date = prescription.end() + gap;
                    running.push(Running {
                        prescription,
                        rule_id,
                        rule,
                        scan_date,
                    });
                }
            }
        }
        episodes.extend(running.into_iter().map(|r| r.prescription));

        for episode in &episodes {
            stats.counters.add(&["merged".into()], f64::from(episode.duration));
        }
        result.extend(episodes);
        sort_by_date_then_duration(&mut result);
        result
    }

    fn absorb(&self, entry: &mut Running<'_>, next: Prescription, gap: i32) {
        let current = &mut entry.prescription;
        if entry.rule.stockpile {
            let end = current.end().max(next.date) + next.duration;
            current.duration = end - current.date;
            entry.scan_date = end + gap;
        } else {
            let end = current.end().max(next.end());
            current.duration = end - current.date;
            entry.scan_date = entry.scan_date.max(next.end() + gap);
        }

        if current.dose.as_deref().is_none_or(str::is_empty) {
            current.dose = next.dose;
        }
        current.indication = resolve_indication(
            current.indication.as_deref(),
            next.indication.as_deref(),
            &self.priority_high,
            &self.priority_low,
        );
    }
}

fn continues(rule: &ExposureRule, running: &Prescription, next: &Prescription) -> bool {
    (rule.class || running.atc == next.atc)
        && (rule.ignore_dose || running.dose == next.dose)
        && (rule.ignore_indication || running.indication == next.indication)
}

/// Indication kept when two episodes merge.
///
/// An empty side loses. Otherwise the high priority list decides, then the
/// low priority list, and the running episode's indication wins any
/// remaining tie.
#[must_use]
pub fn resolve_indication(running: Option<&str>, incoming: Option<&str>, high: &[String], low: &[String]) -> Option<String> {
    let running = running.filter(|s| !s.is_empty());
    let incoming = incoming.filter(|s| !s.is_empty());
    let (running, incoming) = match (running, incoming) {
        (None, None) => return None,
        (Some(r), None) => return Some(r.to_string()),
        (None, Some(i)) => return Some(i.to_string()),
        (Some(r), Some(i)) if r == i => return Some(r.to_string()),
        (Some(r), Some(i)) => (r, i),
    };

    for list in [high, low] {
        let rank = |value: &str| list.iter().position(|p| p == value);
        match (rank(running), rank(incoming)) {
            (Some(r), Some(i)) => return Some(if i < r { incoming } else { running }.to_string()),
            (Some(_), None) => return Some(running.to_string()),
            (None, Some(_)) => return Some(incoming.to_string()),
            (None, None) => {}
        }
    }
    Some(running.to_string())
}

impl Modifier for ExposureDefinition {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&self, patient: &mut Patient, _state: &mut PatientState, ctx: &RunContext, stats: &mut ModifierStats) {
        let prescriptions = std::mem::take(&mut patient.prescriptions);
        let merged = self.merge(prescriptions, stats);

        if self.output {
            for p in merged.iter().filter(|p| !p.is_combination() && self.rules.lookup(&p.atc).is_some()) {
                stats.add_record(
                    OUTPUT_FILE,
                    vec![
                        patient.id.clone(),
                        p.atc.clone(),
                        ctx.format_day(p.date),
                        p.duration.to_string(),
                        p.dose.clone().unwrap_or_default(),
                        p.indication.clone().unwrap_or_default(),
                    ],
                );
            }
        }
        patient.prescriptions = merged;
    }

    fn output_headers(&self) -> Vec<(String, Vec<String>)> {
        if !self.output {
            return Vec::new();
        }
        vec![(
            OUTPUT_FILE.to_string(),
            ["PatientID", "ATC", "Date", "Duration", "Dose", "Indication"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        )]
    }

    fn summary(&self, stats: &ModifierStats) -> String {
        let original = stats.counters.get(&["original".into()]);
        let merged = stats.counters.get(&["merged".into()]);
        let zero = stats.counters.query(&[Some("zeroDuration".into()), None, None]);
        let mut out = format!("{NAME}\n");
        out.push_str(&format!("  prescriptions before: {} ({} days)\n", original.count, original.sum));
        out.push_str(&format!("  episodes after: {} ({} days)\n", merged.count, merged.sum));
        out.push_str(&format!("  zero duration removed: {}\n", zero.count));
        for (key, cell) in stats.counters.sorted_entries() {
            if let [Dim::Text(kind), atc, indication] = key.as_slice() {
                if kind == "zeroDuration" {
                    out.push_str(&format!("    {atc} / {indication}: {}\n", cell.count));
                }
            }
        }
        out
    }
}
