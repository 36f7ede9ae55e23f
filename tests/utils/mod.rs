use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use jerboa::utils::date::to_day;
use jerboa::{
    Day, Gender, InputFiles, Modifier, Patient, PatientState, Prescription, RunContext, RunOutcome, Window,
    Workflow,
};

/// Day count of a calendar date
#[must_use]
pub fn day(y: i32, m: u32, d: u32) -> Day {
    to_day(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

/// Adult patient observed from 2000-01-01 to 2010-01-01
#[must_use]
pub fn adult(id: &str) -> Patient {
    Patient::new(id, Gender::Female, day(1960, 3, 15), day(2000, 1, 1), day(2010, 1, 1))
}

/// Prescription starting `offset` days after 2000-01-01
#[must_use]
pub fn rx(atc: &str, offset: i32, duration: i32) -> Prescription {
    Prescription::new(atc, day(2000, 1, 1) + offset, duration)
}

/// State with both windows set to `window`
#[must_use]
pub fn state(window: Window) -> PatientState {
    PatientState {
        population: Some(window),
        cohort: Some(window),
    }
}

/// Run `modifiers` sequentially over `patients`
pub fn run(modifiers: Vec<Box<dyn Modifier>>, ctx: RunContext, patients: &mut [Patient]) -> RunOutcome {
    Workflow::new(modifiers, ctx).run(patients).unwrap()
}

/// Write `content` to `dir/name`
pub fn write_table(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Small set of input tables covering every table type
pub fn write_fixture_tables(dir: &Path) -> InputFiles {
    InputFiles {
        patients: write_table(
            dir,
            "patients.csv",
            "PatientID,Gender,BirthDate,StartDate,EndDate\n\
             P1,M,1950-01-01,2000-01-01,2010-01-01\n\
             P2,F,1955-06-15,2000-01-01,2010-01-01\n\
             P3,F,1990-02-01,2009-06-01,2009-08-01\n\
             P4,M,1948-11-30,2001-01-01,2010-01-01\n",
        ),
        events: Some(write_table(
            dir,
            "events.csv",
            "PatientID,EventType,Date,Code\n\
             P1,MI,2006-05-01,I21\n\
             P2,MI,2003-01-01,I21\n",
        )),
        prescriptions: Some(write_table(
            dir,
            "prescriptions.csv",
            "PatientID,Date,ATC,Duration,Dose,Indication\n\
             P1,2003-01-01,A10BA02,30,1,\n\
             P1,2003-01-31,A10BA02,30,1,\n\
             P1,2003-03-02,A10BA02,30,2,\n\
             P2,2002-01-01,A10BA02,90,1,\n\
             P2,2002-02-01,A10BB01,30,1,\n\
             P4,2001-02-01,A10BA02,60,1,\n\
             P9,2003-01-01,A10BA02,30,1,\n",
        )),
        measurements: Some(write_table(
            dir,
            "measurements.csv",
            "PatientID,MeasurementType,Date,Value,Unit\n\
             P1,WEIGHT,2004-01-10,80,kg\n\
             P1,HEIGHT,2004-01-10,1.90,m\n\
             P2,WEIGHT,2004-01-10,95,kg\n\
             P2,HEIGHT,2003-06-01,1.65,m\n",
        )),
    }
}
