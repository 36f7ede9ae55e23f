//! Output manager collaborators
//!
//! Modifiers append rows to named output files through [`OutputManager`].
//! [`CsvOutputManager`] buffers the rows and writes one CSV file per name with
//! the Arrow CSV writer when flushed; [`MemoryOutput`] keeps them in memory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::error::Result;
use crate::error::util::safe_create_file;
use crate::utils::logging::log_operation_complete;

/// Sink for intermediate output rows
pub trait OutputManager {
    /// Set the column names of `file`
    fn set_header(&mut self, file: &str, header: Vec<String>);

    /// Append one row to `file`
    fn add_record(&mut self, file: &str, row: Vec<String>);

    /// Persist everything added so far
    fn flush(&mut self) -> Result<()>;
}

/// Rows collected for one named output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTable {
    /// Column names
    pub header: Vec<String>,
    /// Rows in insertion order
    pub rows: Vec<Vec<String>>,
}

impl OutputTable {
    fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(self.header.len())
    }

    /// Convert to an all-text record batch, padding short rows
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let width = self.width();
        let fields: Vec<Field> = (0..width)
            .map(|i| {
                let name = self
                    .header
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{i}"));
                Field::new(name, DataType::Utf8, true)
            })
            .collect();

        let columns: Vec<ArrayRef> = (0..width)
            .map(|i| {
                let values: Vec<Option<&str>> = self
                    .rows
                    .iter()
                    .map(|row| row.get(i).map(String::as_str))
                    .collect();
                Arc::new(StringArray::from(values)) as ArrayRef
            })
            .collect();

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }
}

/// Buffers rows per file and writes CSV files into a directory on flush
#[derive(Debug)]
pub struct CsvOutputManager {
    dir: PathBuf,
    tables: BTreeMap<String, OutputTable>,
}

impl CsvOutputManager {
    /// Create a manager writing into `dir`
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            tables: BTreeMap::new(),
        }
    }

    /// Path a named output will be written to
    #[must_use]
    pub fn path_for(&self, file: &str) -> PathBuf {
        self.dir.join(format!("{file}.csv"))
    }
}

impl OutputManager for CsvOutputManager {
    fn set_header(&mut self, file: &str, header: Vec<String>) {
        self.tables.entry(file.to_string()).or_default().header = header;
    }

    fn add_record(&mut self, file: &str, row: Vec<String>) {
        self.tables.entry(file.to_string()).or_default().rows.push(row);
    }

    fn flush(&mut self) -> Result<()> {
        for (name, table) in &self.tables {
            let path = self.path_for(name);
            let file = safe_create_file(&path, "output table")?;
            let batch = table.to_record_batch()?;
            let mut writer = arrow::csv::WriterBuilder::new().with_header(true).build(file);
            writer.write(&batch)?;
            log_operation_complete("wrote", &path, table.rows.len(), None);
        }
        self.tables.clear();
        Ok(())
    }
}

/// Keeps every row in memory
#[derive(Debug, Default)]
pub struct MemoryOutput {
    tables: BTreeMap<String, OutputTable>,
}

impl MemoryOutput {
    /// Create an empty in-memory sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows collected for `file`
    #[must_use]
    pub fn rows(&self, file: &str) -> &[Vec<String>] {
        self.tables.get(file).map_or(&[][..], |t| t.rows.as_slice())
    }

    /// Table collected for `file`
    #[must_use]
    pub fn table(&self, file: &str) -> Option<&OutputTable> {
        self.tables.get(file)
    }
}

impl OutputManager for MemoryOutput {
    fn set_header(&mut self, file: &str, header: Vec<String>) {
        self.tables.entry(file.to_string()).or_default().header = header;
    }

    fn add_record(&mut self, file: &str, row: Vec<String>) {
        self.tables.entry(file.to_string()).or_default().rows.push(row);
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_output_written_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = CsvOutputManager::new(dir.path());
        out.set_header("zero", vec!["ATC".to_string(), "Count".to_string()]);
        out.add_record("zero", vec!["A10BA02".to_string(), "3".to_string()]);
        out.flush().unwrap();

        let content = std::fs::read_to_string(dir.path().join("zero.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["ATC,Count", "A10BA02,3"]);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = OutputTable {
            header: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec!["1".to_string()]],
        };
        let batch = table.to_record_batch().unwrap();
        assert_eq!(batch.num_columns(), 2);
        assert!(batch.column(1).is_null(0));
    }
}
