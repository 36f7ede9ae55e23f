//! Workflow configuration
//!
//! A workflow file is JSON: the input tables, run-wide settings and the
//! ordered list of modifiers. Every modifier entry is tagged by its
//! `modifier` name and carries that modifier's settings, with rules written as
//! the usual semicolon separated strings.
//!
//! ```json
//! {
//!   "database": "IPCI",
//!   "input": { "patients": "patients.csv", "prescriptions": "prescriptions.csv" },
//!   "modifiers": [
//!     { "modifier": "PopulationDefinition", "runInPeriod": ["IPCI;365", "OTHER;180"] },
//!     { "modifier": "ExposureDefinition", "rules": ["#;0;0.5;0;0"] }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::algorithm::{
    BmiCalculation, BmiSettings, CombinationSettings, EventCohortDefinition, EventCohortSettings,
    ExposureDefinition, ExposureSettings, FixedCohortDefinition, FixedCohortSettings, MeasurementCohortDefinition,
    MeasurementCohortSettings, MeasurementCountCohortDefinition, MeasurementCountSettings, PopulationDefinition,
    PopulationSettings, PrescriptionCohortDefinition, PrescriptionCohortSettings, PrescriptionCombinations,
};
use crate::error::util::safe_read_to_string;
use crate::error::{Error, Result};
use crate::loader::InputFiles;
use crate::pipeline::{Modifier, RunContext};
use crate::utils::date::DateFormatConfig;

/// Settings of one modifier, tagged by the modifier name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "modifier")]
pub enum ModifierConfig {
    /// Population window calculator
    PopulationDefinition(PopulationSettings),
    /// Event based cohort
    EventCohortDefinition(EventCohortSettings),
    /// Prescription based cohort
    PrescriptionCohortDefinition(PrescriptionCohortSettings),
    /// Measurement based cohort
    MeasurementCohortDefinition(MeasurementCohortSettings),
    /// Fixed date cohort
    FixedCohortDefinition(FixedCohortSettings),
    /// Measurement count cohort
    MeasurementCountCohortDefinition(MeasurementCountSettings),
    /// Exposure episode merging
    ExposureDefinition(ExposureSettings),
    /// Combination prescriptions
    PrescriptionCombinations(CombinationSettings),
    /// BMI, BMI category and BSA derivation
    #[serde(rename = "BMICalculation")]
    BmiCalculation(BmiSettings),
}

impl ModifierConfig {
    /// Parse the settings into a ready modifier
    pub fn build(&self, formats: &DateFormatConfig) -> Result<Box<dyn Modifier>> {
        Ok(match self {
            Self::PopulationDefinition(s) => Box::new(PopulationDefinition::from_settings(s, formats)?),
            Self::EventCohortDefinition(s) => Box::new(EventCohortDefinition::from_settings(s)?),
            Self::PrescriptionCohortDefinition(s) => Box::new(PrescriptionCohortDefinition::from_settings(s)?),
            Self::MeasurementCohortDefinition(s) => Box::new(MeasurementCohortDefinition::from_settings(s)?),
            Self::FixedCohortDefinition(s) => Box::new(FixedCohortDefinition::from_settings(s, formats)?),
            Self::MeasurementCountCohortDefinition(s) => {
                Box::new(MeasurementCountCohortDefinition::from_settings(s, formats)?)
            }
            Self::ExposureDefinition(s) => Box::new(ExposureDefinition::from_settings(s)?),
            Self::PrescriptionCombinations(s) => Box::new(PrescriptionCombinations::from_settings(s)?),
            Self::BmiCalculation(s) => Box::new(BmiCalculation::from_settings(s)?),
        })
    }
}

/// Whole workflow description
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowConfig {
    /// Name of the source database
    pub database: String,
    /// Input tables
    pub input: InputFiles,
    /// Directory receiving the output files
    pub output_dir: PathBuf,
    /// Date parsing and output formats
    pub date_formats: DateFormatConfig,
    /// Field delimiter of CSV input
    pub delimiter: char,
    /// Process patients on the rayon pool
    pub parallel: bool,
    /// Worker threads, all cores when absent
    pub threads: Option<usize>,
    /// Modifiers in application order
    pub modifiers: Vec<ModifierConfig>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            database: String::new(),
            input: InputFiles::default(),
            output_dir: PathBuf::from("output"),
            date_formats: DateFormatConfig::default(),
            delimiter: ',',
            parallel: false,
            threads: None,
            modifiers: Vec::new(),
        }
    }
}

impl WorkflowConfig {
    /// Parse a workflow from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a workflow file; relative input and output paths resolve against its directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = safe_read_to_string(path, "reading workflow file")?;
        let mut config = Self::from_json(&text).map_err(|e| e.with_path(path))?;
        if let Some(base) = path.parent() {
            config.input = config.input.relative_to(base);
            if config.output_dir.is_relative() {
                config.output_dir = base.join(&config.output_dir);
            }
        }
        Ok(config)
    }

    /// Delimiter as a byte, which the CSV reader requires
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| Error::Other(format!("Delimiter '{}' is not an ASCII character", self.delimiter)))
    }

    /// Number of worker threads for a parallel run
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.threads.filter(|&n| n > 0).unwrap_or_else(num_cpus::get)
    }

    /// Context shared by every modifier
    #[must_use]
    pub fn run_context(&self) -> RunContext {
        RunContext {
            database: self.database.clone(),
            date_formats: self.date_formats.clone(),
        }
    }

    /// Build every modifier, failing on the first invalid one
    pub fn build_modifiers(&self) -> Result<Vec<Box<dyn Modifier>>> {
        self.modifiers.iter().map(|m| m.build(&self.date_formats)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKFLOW: &str = r##"{
        "database": "IPCI",
        "input": { "patients": "patients.csv", "prescriptions": "rx.csv" },
        "delimiter": ";",
        "modifiers": [
            { "modifier": "PopulationDefinition", "runInPeriod": ["IPCI;365"], "minimumDaysOfPatientTime": 30 },
            { "modifier": "ExposureDefinition", "rules": ["#;0;0.5;0;0"] },
            { "modifier": "BMICalculation", "adultAge": 21 }
        ]
    }"##;

    #[test]
    fn test_parse_workflow() {
        let config = WorkflowConfig::from_json(WORKFLOW).unwrap();
        assert_eq!(config.database, "IPCI");
        assert_eq!(config.delimiter_byte().unwrap(), b';');
        assert_eq!(config.input.prescriptions, Some(PathBuf::from("rx.csv")));
        assert!(!config.parallel);

        let modifiers = config.build_modifiers().unwrap();
        let names: Vec<&str> = modifiers.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["PopulationDefinition", "ExposureDefinition", "BMICalculation"]);
    }

    #[test]
    fn test_unknown_modifier_rejected() {
        let result = WorkflowConfig::from_json(r#"{ "modifiers": [ { "modifier": "Plotter" } ] }"#);
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_invalid_rule_is_config_error() {
        let config = WorkflowConfig::from_json(
            r##"{ "modifiers": [ { "modifier": "ExposureDefinition", "rules": ["#;zero"] } ] }"##,
        )
        .unwrap();
        assert!(matches!(config.build_modifiers(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_relative_paths_resolve_against_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflow.json");
        std::fs::write(&path, WORKFLOW).unwrap();
        let config = WorkflowConfig::from_file(&path).unwrap();
        assert_eq!(config.input.patients, dir.path().join("patients.csv"));
        assert_eq!(config.output_dir, dir.path().join("output"));
    }
}
