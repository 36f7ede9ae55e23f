//! Reading input tables into all-text record batches
//!
//! Every input table is read as text: CSV columns are declared `Utf8` up
//! front and Parquet columns are cast after reading. Dates and numbers are
//! parsed by the record builders, so a bad value costs one row instead of
//! the whole file.

use std::io::Seek;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::compute::cast;
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::util::safe_open_file;
use crate::error::{Error, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Batch size used for both readers
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// On-disk format of an input table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Delimited text with a header row
    Csv,
    /// Apache Parquet
    Parquet,
}

impl TableFormat {
    /// Format implied by the file extension; anything but `.parquet` is CSV
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => Self::Parquet,
            _ => Self::Csv,
        }
    }
}

/// Read a table with every column as text
pub fn read_table(path: &Path, delimiter: u8) -> Result<Vec<RecordBatch>> {
    let start = Instant::now();
    log_operation_start("Reading table", path);

    let batches = match TableFormat::from_path(path) {
        TableFormat::Csv => read_csv(path, delimiter)?,
        TableFormat::Parquet => read_parquet(path)?,
    };

    let rows = batches.iter().map(RecordBatch::num_rows).sum();
    log_operation_complete("read", path, rows, Some(start.elapsed()));
    Ok(batches)
}

fn read_csv(path: &Path, delimiter: u8) -> Result<Vec<RecordBatch>> {
    let mut file = safe_open_file(path, "reading CSV table")?;
    let format = Format::default().with_header(true).with_delimiter(delimiter);
    let (inferred, _) = format.infer_schema(&mut file, Some(0))?;
    file.rewind()
        .map_err(|e| Error::io_error_with_source("Failed to rewind CSV table", e).with_path(path))?;

    let text_schema = Schema::new(
        inferred
            .fields()
            .iter()
            .map(|f| Field::new(f.name().trim(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    );
    let reader = ReaderBuilder::new(Arc::new(text_schema))
        .with_header(true)
        .with_delimiter(delimiter)
        .with_batch_size(DEFAULT_BATCH_SIZE)
        .build(file)?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = safe_open_file(path, "reading parquet table")?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(DEFAULT_BATCH_SIZE)
        .build()?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(to_text(&batch?)?);
    }
    Ok(batches)
}

/// Cast every non-text column of `batch` to `Utf8`
pub fn to_text(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), DataType::Utf8, true))
        .collect();
    let columns = batch
        .columns()
        .iter()
        .map(|column| {
            if column.data_type() == &DataType::Utf8 {
                Ok(Arc::clone(column))
            } else {
                cast(column, &DataType::Utf8)
            }
        })
        .collect::<std::result::Result<Vec<ArrayRef>, _>>()?;
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Named text columns of one batch
#[derive(Debug, Clone, Copy)]
pub struct TextColumns<'a> {
    table: &'a str,
    batch: &'a RecordBatch,
}

impl<'a> TextColumns<'a> {
    /// Wrap `batch` of input table `table`
    #[must_use]
    pub const fn new(table: &'a str, batch: &'a RecordBatch) -> Self {
        Self { table, batch }
    }

    /// Column `name`, matched case-insensitively, or `None` when absent
    #[must_use]
    pub fn optional(&self, name: &str) -> Option<&'a StringArray> {
        let schema = self.batch.schema_ref();
        let index = schema
            .index_of(name)
            .ok()
            .or_else(|| schema.fields().iter().position(|f| f.name().eq_ignore_ascii_case(name)))?;
        self.batch.column(index).as_any().downcast_ref::<StringArray>()
    }

    /// Column `name`, failing when the table lacks it
    pub fn required(&self, name: &str) -> Result<&'a StringArray> {
        self.optional(name).ok_or_else(|| Error::ColumnNotFound {
            column: name.to_string(),
            table: self.table.to_string(),
        })
    }

    /// Number of rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Trimmed cell value, `None` for nulls and blanks
#[must_use]
pub fn cell(column: Option<&StringArray>, row: usize) -> Option<&str> {
    let column = column?;
    if column.is_null(row) {
        return None;
    }
    Some(column.value(row).trim()).filter(|v| !v.is_empty())
}
