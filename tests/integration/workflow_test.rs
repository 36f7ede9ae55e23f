use std::fs;

use jerboa::{CsvOutputManager, Workflow, WorkflowConfig, load_patients};

use crate::utils::write_fixture_tables;

const WORKFLOW: &str = r##"{
    "database": "TEST",
    "input": {
        "patients": "patients.csv",
        "events": "events.csv",
        "prescriptions": "prescriptions.csv",
        "measurements": "measurements.csv"
    },
    "outputDir": "out",
    "modifiers": [
        { "modifier": "PopulationDefinition", "minimumDaysOfPatientTime": 365 },
        { "modifier": "ExposureDefinition", "rules": ["#;0;0;0;0"], "output": true },
        { "modifier": "PrescriptionCohortDefinition", "drugsOfInterest": ["A10BA"], "naivePeriod": 365 },
        { "modifier": "BMICalculation", "output": true }
    ]
}"##;

fn read_csv(path: &std::path::Path) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| l.split(',').map(str::to_string).collect())
        .collect()
}

fn run_workflow(parallel: bool) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    write_fixture_tables(dir.path());
    let path = dir.path().join("workflow.json");
    fs::write(&path, WORKFLOW).unwrap();

    let config = WorkflowConfig::from_file(&path).unwrap();
    let mut data = load_patients(&config.input, &config.date_formats, config.delimiter_byte().unwrap()).unwrap();
    assert_eq!(data.patients.len(), 4);
    assert_eq!(data.stats.count("prescriptions", "unknown patient"), 1);

    let workflow = Workflow::new(config.build_modifiers().unwrap(), config.run_context()).with_parallelism(parallel, 2);
    let outcome = workflow.run(&mut data.patients).unwrap();

    let population = &outcome.stats[0].attrition;
    assert_eq!(population.get("patients"), 4);
    assert_eq!(population.get("insufficient patient time"), 1);
    assert_eq!(population.get("in population"), 3);

    let cohort = &outcome.stats[2].attrition;
    assert_eq!(cohort.get("in cohort"), 2);
    assert_eq!(cohort.get("not in population"), 1);

    let mut output = CsvOutputManager::new(&config.output_dir);
    workflow.write_outputs(&outcome, &mut output).unwrap();
    (dir, workflow.report(&outcome))
}

#[test]
fn test_end_to_end_sequential() {
    let (dir, report) = run_workflow(false);
    let out = dir.path().join("out");

    let results = read_csv(&out.join("results.csv"));
    assert_eq!(
        results[0],
        vec!["PatientID", "PopulationStart", "PopulationEnd", "CohortStart", "CohortEnd", "CohortTime"]
    );
    assert_eq!(results.len(), 5);
    let p1 = results.iter().find(|r| r[0] == "P1").unwrap();
    assert_eq!(p1[3], "2003-01-01");
    let p3 = results.iter().find(|r| r[0] == "P3").unwrap();
    assert_eq!(p3[5], "0");

    // P1's first two scripts merge; the third has another dose and stays apart
    let exposures = read_csv(&out.join("exposures.csv"));
    assert_eq!(exposures.iter().filter(|r| r[0] == "P1").count(), 2);
    assert_eq!(exposures.len(), 1 + 5);

    let bmi = read_csv(&out.join("bmi.csv"));
    let p1_bmi = bmi.iter().find(|r| r[0] == "P1").unwrap();
    assert_eq!(p1_bmi[2], "22.16");
    let p2_bmi = bmi.iter().find(|r| r[0] == "P2").unwrap();
    assert_eq!(p2_bmi[5], "obese");

    assert!(report.contains("PrescriptionCohortDefinition"));
    assert!(report.contains("not naive"));
}

#[test]
fn test_end_to_end_parallel() {
    let (dir, _) = run_workflow(true);
    let results = read_csv(&dir.path().join("out").join("results.csv"));
    assert_eq!(results.len(), 5);
}
