//! Keyed per-patient result table

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::stats::output::OutputManager;

/// Derived per-patient values keyed by patient id and column
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: FxHashMap<String, BTreeMap<String, String>>,
}

impl ResultTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column` for `patient_id`
    pub fn set(&mut self, patient_id: &str, column: &str, value: impl ToString) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
        self.rows
            .entry(patient_id.to_string())
            .or_default()
            .insert(column.to_string(), value.to_string());
    }

    /// Value of `column` for `patient_id`
    #[must_use]
    pub fn get(&self, patient_id: &str, column: &str) -> Option<&str> {
        self.rows.get(patient_id)?.get(column).map(String::as_str)
    }

    /// Number of patients with at least one value
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fold another table into this one; later values win
    pub fn merge(&mut self, other: Self) {
        for column in other.columns {
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
        for (id, values) in other.rows {
            self.rows.entry(id).or_default().extend(values);
        }
    }

    /// Write the table, sorted by patient id, to `file`
    pub fn write_to(&self, output: &mut dyn OutputManager, file: &str) {
        let mut header = vec!["PatientID".to_string()];
        header.extend(self.columns.iter().cloned());
        output.set_header(file, header);

        let mut ids: Vec<&String> = self.rows.keys().collect();
        ids.sort();
        for id in ids {
            let values = &self.rows[id];
            let mut row = vec![id.clone()];
            row.extend(
                self.columns
                    .iter()
                    .map(|c| values.get(c).cloned().unwrap_or_default()),
            );
            output.add_record(file, row);
        }
    }
}
