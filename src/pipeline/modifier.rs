//! The modifier abstraction and the run context passed to every modifier

use std::fmt;

use crate::models::{Patient, PatientState};
use crate::stats::ModifierStats;
use crate::utils::date::{DateFormatConfig, Day, format_day};

/// Cross-cutting settings of one run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Name of the source database, used for per-database settings
    pub database: String,
    /// Date formats for rule strings and output
    pub date_formats: DateFormatConfig,
}

impl RunContext {
    /// Create a context for `database`
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            date_formats: DateFormatConfig::default(),
        }
    }

    /// Format a day for output files
    #[must_use]
    pub fn format_day(&self, day: Day) -> String {
        format_day(day, &self.date_formats.output_format)
    }
}

/// A configured processing stage applied to every patient in turn.
///
/// Modifiers hold only their parsed configuration. Everything they learn
/// during a run goes into the [`ModifierStats`] collector handed to
/// [`Modifier::process`], so one modifier can serve several threads.
pub trait Modifier: Send + Sync + fmt::Debug {
    /// Name used in logs and reports
    fn name(&self) -> &str;

    /// Apply the modifier to one patient
    fn process(
        &self,
        patient: &mut Patient,
        state: &mut PatientState,
        ctx: &RunContext,
        stats: &mut ModifierStats,
    );

    /// Register attrition steps and output headers before the first patient
    fn prepare(&self, _stats: &mut ModifierStats) {}

    /// Header rows of the output files this modifier writes
    fn output_headers(&self) -> Vec<(String, Vec<String>)> {
        Vec::new()
    }

    /// End-of-run report section
    fn summary(&self, stats: &ModifierStats) -> String {
        stats.attrition.render(self.name())
    }
}
