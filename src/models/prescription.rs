//! Prescription model
//!
//! Raw prescriptions come from the input tables. Synthetic combination
//! prescriptions are produced by the combination resolver and carry
//! [`CombinationInfo`].

use crate::utils::date::Day;

/// Provenance of a synthetic combination prescription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinationInfo {
    /// Day on which the last of the member components began
    pub start_date: Day,
    /// Whether every contributing prescription started on the combination's start day
    pub all_components_start: bool,
    /// ATC codes of the contributing prescriptions
    pub components: Vec<String>,
}

/// A dispensing or prescribing record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prescription {
    /// ATC code, or a generated label for combinations
    pub atc: String,
    /// Start day
    pub date: Day,
    /// Duration in days
    pub duration: i32,
    /// Dose as recorded
    pub dose: Option<String>,
    /// Indication code
    pub indication: Option<String>,
    /// Prescriber identifier
    pub prescriber_id: Option<String>,
    /// Prescriber type (GP, specialist...)
    pub prescriber_type: Option<String>,
    /// Set on synthetic combination prescriptions
    pub combination: Option<CombinationInfo>,
}

impl Prescription {
    /// Create a plain prescription
    #[must_use]
    pub fn new(atc: impl Into<String>, date: Day, duration: i32) -> Self {
        Self {
            atc: atc.into(),
            date,
            duration,
            dose: None,
            indication: None,
            prescriber_id: None,
            prescriber_type: None,
            combination: None,
        }
    }

    /// Set the dose
    #[must_use]
    pub fn with_dose(mut self, dose: impl Into<String>) -> Self {
        self.dose = Some(dose.into());
        self
    }

    /// Set the indication
    #[must_use]
    pub fn with_indication(mut self, indication: impl Into<String>) -> Self {
        self.indication = Some(indication.into());
        self
    }

    /// Set the prescriber
    #[must_use]
    pub fn with_prescriber(mut self, id: impl Into<String>, prescriber_type: Option<String>) -> Self {
        self.prescriber_id = Some(id.into());
        self.prescriber_type = prescriber_type;
        self
    }

    /// First day after the prescription
    #[must_use]
    pub fn end(&self) -> Day {
        self.date + self.duration
    }

    /// Whether the ATC code starts with `prefix`
    #[must_use]
    pub fn matches_atc(&self, prefix: &str) -> bool {
        self.atc.starts_with(prefix)
    }

    /// Whether the ATC code starts with any of `prefixes`
    #[must_use]
    pub fn matches_any(&self, prefixes: &[String]) -> bool {
        prefixes.iter().any(|p| self.atc.starts_with(p.as_str()))
    }

    /// Whether the prescription covers `day`
    #[must_use]
    pub fn is_active_on(&self, day: Day) -> bool {
        self.date <= day && day < self.end()
    }

    /// Whether this is a synthetic combination prescription
    #[must_use]
    pub fn is_combination(&self) -> bool {
        self.combination.is_some()
    }

    /// Numeric dose, if the recorded dose parses
    #[must_use]
    pub fn dose_value(&self) -> Option<f64> {
        let dose = self.dose.as_deref()?.trim();
        dose.parse::<f64>()
            .or_else(|_| dose.replace(',', ".").parse::<f64>())
            .ok()
    }
}

/// Sort prescriptions by date ascending, then duration descending
pub fn sort_by_date_then_duration(prescriptions: &mut [Prescription]) {
    prescriptions.sort_by(|a, b| a.date.cmp(&b.date).then(b.duration.cmp(&a.duration)));
}
