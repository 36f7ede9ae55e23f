//! Statistics and output collaborators
//!
//! Modifiers never print or write directly. They record counters in a
//! [`ModifierStats`] collector and rows destined for output files; the
//! workflow reduces the collectors and hands the rows to an
//! [`OutputManager`].

pub mod attrition;
pub mod histogram;
pub mod output;
pub mod results;

pub use attrition::Attrition;
pub use histogram::{Cell, Dim, Histogram, Key};
pub use output::{CsvOutputManager, MemoryOutput, OutputManager, OutputTable};
pub use results::ResultTable;

/// A row destined for a named output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    /// Output file name without extension
    pub file: String,
    /// Column values
    pub row: Vec<String>,
}

/// Everything one modifier recorded during a run
#[derive(Debug, Clone, Default)]
pub struct ModifierStats {
    /// Patient funnel
    pub attrition: Attrition,
    /// Free-form counters
    pub counters: Histogram,
    /// Rows for output files
    pub records: Vec<OutputRecord>,
}

impl ModifierStats {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a row for `file`
    pub fn add_record(&mut self, file: &str, row: Vec<String>) {
        self.records.push(OutputRecord {
            file: file.to_string(),
            row,
        });
    }

    /// Fold another collector into this one
    pub fn merge(&mut self, other: Self) {
        self.attrition.merge(other.attrition);
        self.counters.merge(other.counters);
        self.records.extend(other.records);
    }
}
