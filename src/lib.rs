//! Cohort and exposure engine for pharmacoepidemiological studies.
//!
//! Patient-level records (patients, events, prescriptions, measurements) are
//! loaded from CSV or Parquet tables and passed through an ordered list of
//! modifiers: population and cohort window calculators, exposure merging,
//! combination derivation and BMI derivation. Each modifier records attrition
//! counters and output rows; the workflow reduces them into a report, a
//! per-patient result table and intermediate CSV files.

pub mod algorithm;
pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod stats;
pub mod utils;

// Re-export the most common types for easier use
pub use config::{ModifierConfig, WorkflowConfig};
pub use error::{Error, Result};
pub use loader::{InputFiles, LoadStats, LoadedData, load_patients};
pub use models::{Event, Gender, Measurement, Patient, PatientState, Prescription, Window};
pub use pipeline::{Modifier, RunContext, RunOutcome, Workflow};
pub use stats::{CsvOutputManager, MemoryOutput, ModifierStats, OutputManager, ResultTable};
pub use utils::date::{DateFormatConfig, Day};
