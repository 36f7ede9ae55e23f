//! Modifier implementations
//!
//! Every modifier turns its workflow settings into typed rules once, then
//! runs over one patient at a time. Shared building blocks (rule parsing, the
//! ATC prefix index, drug groups and the prescription timeline) live next to
//! the modifiers that use them.

pub mod atc_index;
pub mod bmi;
pub mod cohort;
pub mod combinations;
pub mod drug_groups;
pub mod exposure;
pub mod population;
pub mod rules;
pub mod timeline;

pub use bmi::{BmiCalculation, BmiSettings};
pub use cohort::{
    EventCohortDefinition, EventCohortSettings, FixedCohortDefinition, FixedCohortSettings,
    MeasurementCohortDefinition, MeasurementCohortSettings, MeasurementCountCohortDefinition,
    MeasurementCountSettings, PrescriptionCohortDefinition, PrescriptionCohortSettings,
};
pub use combinations::{CombinationSettings, PrescriptionCombinations};
pub use exposure::{ExposureDefinition, ExposureSettings};
pub use population::{PopulationDefinition, PopulationSettings};
