//! Input loading
//!
//! Reads the patients, events, prescriptions and measurements tables (CSV or
//! Parquet) in parallel and groups the records under their patients. Rows that
//! cannot be used are counted per table and reason, then skipped.

pub mod table;

use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Event, Gender, Measurement, Patient, Prescription};
use crate::stats::Histogram;
use crate::utils::date::{DateFormatConfig, Day, parse_day};
use crate::utils::logging::log_warning;

pub use table::{TableFormat, TextColumns, cell, read_table};

/// Outcome recorded for every row that made it into the model
pub const LOADED: &str = "loaded";

/// Locations of the input tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputFiles {
    /// Patients table, required
    pub patients: PathBuf,
    /// Events table
    pub events: Option<PathBuf>,
    /// Prescriptions table
    pub prescriptions: Option<PathBuf>,
    /// Measurements table
    pub measurements: Option<PathBuf>,
}

impl InputFiles {
    /// Resolve relative paths against `base`
    #[must_use]
    pub fn relative_to(&self, base: &Path) -> Self {
        let resolve = |p: &Path| if p.is_absolute() { p.to_path_buf() } else { base.join(p) };
        Self {
            patients: resolve(&self.patients),
            events: self.events.as_deref().map(resolve),
            prescriptions: self.prescriptions.as_deref().map(resolve),
            measurements: self.measurements.as_deref().map(resolve),
        }
    }
}

/// Row counts per table and outcome
#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    counters: Histogram,
}

impl LoadStats {
    fn record(&mut self, table: &str, outcome: &str) {
        self.counters.increment(&[table.into(), outcome.into()]);
    }

    /// Rows of `table` with `outcome`
    #[must_use]
    pub fn count(&self, table: &str, outcome: &str) -> u64 {
        self.counters.get(&[table.into(), outcome.into()]).count
    }

    /// Rows of `table` that were skipped
    #[must_use]
    pub fn skipped(&self, table: &str) -> u64 {
        self.counters.count_prefix(&[table.into()]) - self.count(table, LOADED)
    }

    /// Human readable report
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("Input\n");
        for (key, cell) in self.counters.sorted_entries() {
            if let [table, outcome] = key.as_slice() {
                out.push_str(&format!("  {table} {outcome}: {}\n", cell.count));
            }
        }
        out
    }
}

/// Everything loaded from the input tables
#[derive(Debug, Clone, Default)]
pub struct LoadedData {
    /// Patients in input order, records sorted by date
    pub patients: Vec<Patient>,
    /// Row counts per outcome
    pub stats: LoadStats,
}

/// Read every input table and build the patients
pub fn load_patients(files: &InputFiles, formats: &DateFormatConfig, delimiter: u8) -> Result<LoadedData> {
    let paths = [
        Some(files.patients.as_path()),
        files.events.as_deref(),
        files.prescriptions.as_deref(),
        files.measurements.as_deref(),
    ];
    let mut tables = paths
        .par_iter()
        .map(|path| path.map(|p| read_table(p, delimiter)).transpose())
        .collect::<Result<Vec<Option<Vec<RecordBatch>>>>>()?
        .into_iter();
    let mut next = || tables.next().flatten().unwrap_or_default();
    let (patient_batches, event_batches, prescription_batches, measurement_batches) =
        (next(), next(), next(), next());

    let mut stats = LoadStats::default();
    let mut patients = Vec::new();
    let mut index: FxHashMap<String, usize> = FxHashMap::default();

    for batch in &patient_batches {
        for outcome in patient_rows(batch, formats)? {
            match outcome {
                Ok(patient) => {
                    if index.contains_key(&patient.id) {
                        stats.record("patients", "duplicate patient");
                        continue;
                    }
                    index.insert(patient.id.clone(), patients.len());
                    patients.push(patient);
                    stats.record("patients", LOADED);
                }
                Err(reason) => stats.record("patients", reason),
            }
        }
    }

    attach(&event_batches, "events", &index, &mut stats, |b| event_rows(b, formats), |p, e| {
        patients[p].events.push(e);
    })?;
    attach(
        &prescription_batches,
        "prescriptions",
        &index,
        &mut stats,
        |b| prescription_rows(b, formats),
        |p, rx| patients[p].prescriptions.push(rx),
    )?;
    attach(
        &measurement_batches,
        "measurements",
        &index,
        &mut stats,
        |b| measurement_rows(b, formats),
        |p, m| patients[p].measurements.push(m),
    )?;

    patients.par_iter_mut().for_each(Patient::sort_collections);

    for table in ["patients", "events", "prescriptions", "measurements"] {
        let skipped = stats.skipped(table);
        if skipped > 0 {
            log_warning(&format!("Skipped {skipped} rows of the {table} table"), None);
        }
    }
    Ok(LoadedData { patients, stats })
}

type RowOutcome<T> = std::result::Result<(String, T), &'static str>;

fn attach<T>(
    batches: &[RecordBatch],
    table: &str,
    index: &FxHashMap<String, usize>,
    stats: &mut LoadStats,
    rows: impl Fn(&RecordBatch) -> Result<Vec<RowOutcome<T>>>,
    mut push: impl FnMut(usize, T),
) -> Result<()> {
    for batch in batches {
        for outcome in rows(batch)? {
            match outcome {
                Ok((id, record)) => match index.get(&id) {
                    Some(&patient) => {
                        push(patient, record);
                        stats.record(table, LOADED);
                    }
                    None => stats.record(table, "unknown patient"),
                },
                Err(reason) => stats.record(table, reason),
            }
        }
    }
    Ok(())
}

fn date_cell(value: Option<&str>, formats: &DateFormatConfig) -> std::result::Result<Day, &'static str> {
    let value = value.ok_or("missing date")?;
    parse_day(value, formats).ok_or("invalid date")
}

fn patient_rows(batch: &RecordBatch, formats: &DateFormatConfig) -> Result<Vec<std::result::Result<Patient, &'static str>>> {
    let columns = TextColumns::new("patients", batch);
    let id = columns.required("PatientID")?;
    let gender = columns.optional("Gender");
    let birth = columns.required("BirthDate")?;
    let start = columns.required("StartDate")?;
    let end = columns.required("EndDate")?;

    Ok((0..columns.num_rows())
        .map(|row| {
            let id = cell(Some(id), row).ok_or("missing patient id")?;
            let birth = date_cell(cell(Some(birth), row), formats)?;
            let start = date_cell(cell(Some(start), row), formats)?;
            let end = date_cell(cell(Some(end), row), formats)?;
            if end < start {
                return Err("end before start");
            }
            let gender = cell(gender, row).map(Gender::from).unwrap_or_default();
            Ok(Patient::new(id, gender, birth, start, end))
        })
        .collect())
}

fn event_rows(batch: &RecordBatch, formats: &DateFormatConfig) -> Result<Vec<RowOutcome<Event>>> {
    let columns = TextColumns::new("events", batch);
    let id = columns.required("PatientID")?;
    let event_type = columns.required("EventType")?;
    let date = columns.required("Date")?;
    let code = columns.optional("Code");

    Ok((0..columns.num_rows())
        .map(|row| {
            let id = cell(Some(id), row).ok_or("missing patient id")?;
            let event_type = cell(Some(event_type), row).ok_or("missing event type")?;
            let date = date_cell(cell(Some(date), row), formats)?;
            let mut event = Event::new(event_type, date);
            if let Some(code) = cell(code, row) {
                event = event.with_code(code);
            }
            Ok((id.to_string(), event))
        })
        .collect())
}

fn prescription_rows(batch: &RecordBatch, formats: &DateFormatConfig) -> Result<Vec<RowOutcome<Prescription>>> {
    let columns = TextColumns::new("prescriptions", batch);
    let id = columns.required("PatientID")?;
    let date = columns.required("Date")?;
    let atc = columns.required("ATC")?;
    let duration = columns.required("Duration")?;
    let dose = columns.optional("Dose");
    let indication = columns.optional("Indication");
    let prescriber_id = columns.optional("PrescriberId");
    let prescriber_type = columns.optional("PrescriberType");

    Ok((0..columns.num_rows())
        .map(|row| {
            let id = cell(Some(id), row).ok_or("missing patient id")?;
            let date = date_cell(cell(Some(date), row), formats)?;
            let atc = cell(Some(atc), row).ok_or("missing ATC")?;
            let duration = cell(Some(duration), row)
                .and_then(parse_duration)
                .ok_or("invalid duration")?;

            let mut prescription = Prescription::new(atc, date, duration);
            if let Some(dose) = cell(dose, row) {
                prescription = prescription.with_dose(dose);
            }
            if let Some(indication) = cell(indication, row) {
                prescription = prescription.with_indication(indication);
            }
            if let Some(prescriber) = cell(prescriber_id, row) {
                prescription = prescription.with_prescriber(prescriber, cell(prescriber_type, row).map(str::to_string));
            }
            Ok((id.to_string(), prescription))
        })
        .collect())
}

#[allow(clippy::cast_possible_truncation)]
fn parse_duration(text: &str) -> Option<i32> {
    text.parse::<i32>().ok().or_else(|| {
        text.parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && d.abs() < f64::from(i32::MAX))
            .map(|d| d.round() as i32)
    })
}

fn measurement_rows(batch: &RecordBatch, formats: &DateFormatConfig) -> Result<Vec<RowOutcome<Measurement>>> {
    let columns = TextColumns::new("measurements", batch);
    let id = columns.required("PatientID")?;
    let measurement_type = columns.required("MeasurementType")?;
    let date = columns.required("Date")?;
    let value = columns.optional("Value");
    let unit = columns.optional("Unit");

    Ok((0..columns.num_rows())
        .map(|row| {
            let id = cell(Some(id), row).ok_or("missing patient id")?;
            let measurement_type = cell(Some(measurement_type), row).ok_or("missing measurement type")?;
            let date = date_cell(cell(Some(date), row), formats)?;
            let mut measurement = Measurement::new(measurement_type, date, cell(value, row).unwrap_or_default());
            if let Some(unit) = cell(unit, row) {
                measurement = measurement.with_unit(unit);
            }
            Ok((id.to_string(), measurement))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_groups_records_by_patient() {
        let dir = tempfile::tempdir().unwrap();
        let files = InputFiles {
            patients: write(
                dir.path(),
                "patients.csv",
                "PatientID,Gender,BirthDate,StartDate,EndDate\n\
                 P1,M,1950-01-01,2000-01-01,2010-01-01\n\
                 P2,F,1960-05-05,2001-01-01,2011-01-01\n\
                 P3,F,not a date,2001-01-01,2011-01-01\n\
                 P1,M,1950-01-01,2000-01-01,2010-01-01\n",
            ),
            prescriptions: Some(write(
                dir.path(),
                "prescriptions.csv",
                "PatientID,Date,ATC,Duration,Dose\n\
                 P1,2005-03-01,A10BA02,30,1\n\
                 P1,2005-01-01,A10BA02,30.0,\n\
                 P9,2005-01-01,A10BA02,30,1\n\
                 P2,2005-01-01,C07AB02,abc,1\n",
            )),
            events: Some(write(
                dir.path(),
                "events.csv",
                "PatientID,EventType,Date,Code\nP2,MI,2006-06-06,I21\n",
            )),
            measurements: None,
        };

        let loaded = load_patients(&files, &DateFormatConfig::default(), b',').unwrap();
        assert_eq!(loaded.patients.len(), 2);

        let p1 = &loaded.patients[0];
        assert_eq!(p1.gender, Gender::Male);
        assert_eq!(p1.prescriptions.len(), 2);
        assert!(p1.prescriptions[0].date < p1.prescriptions[1].date);
        assert_eq!(p1.prescriptions[0].dose, None);
        assert_eq!(loaded.patients[1].events[0].code.as_deref(), Some("I21"));

        let stats = &loaded.stats;
        assert_eq!(stats.count("patients", "invalid date"), 1);
        assert_eq!(stats.count("patients", "duplicate patient"), 1);
        assert_eq!(stats.count("prescriptions", "unknown patient"), 1);
        assert_eq!(stats.count("prescriptions", "invalid duration"), 1);
        assert_eq!(stats.skipped("prescriptions"), 2);
    }

    #[test]
    fn test_missing_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let files = InputFiles {
            patients: write(dir.path(), "patients.csv", "PatientID,BirthDate\nP1,1950-01-01\n"),
            ..Default::default()
        };
        let result = load_patients(&files, &DateFormatConfig::default(), b',');
        assert!(matches!(result, Err(crate::error::Error::ColumnNotFound { .. })));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30"), Some(30));
        assert_eq!(parse_duration("29.6"), Some(30));
        assert_eq!(parse_duration("thirty"), None);
    }
}
