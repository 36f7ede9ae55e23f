use jerboa::algorithm::{PopulationDefinition, PopulationSettings};
use jerboa::{DateFormatConfig, Gender, Patient, RunContext, Window};

use crate::utils::{adult, day, run};

fn definition(settings: &PopulationSettings) -> PopulationDefinition {
    PopulationDefinition::from_settings(settings, &DateFormatConfig::default()).unwrap()
}

#[test]
fn test_child_inclusion_scenario() {
    let birth = day(2005, 1, 1);
    let child = Patient::new("C1", Gender::Male, birth, birth + 10, birth + 2000);
    let settings = PopulationSettings {
        run_in_period: vec!["30".to_string()],
        child_inclusion_period: 365,
        ..Default::default()
    };

    // Too young at start: no run-in
    assert_eq!(definition(&settings).window(&child, "").unwrap(), Window::new(birth + 10, birth + 2000));

    let to_birth = PopulationSettings {
        child_to_birth_date: true,
        ..settings.clone()
    };
    assert_eq!(definition(&to_birth).window(&child, "").unwrap(), Window::new(birth, birth + 2000));

    // Adults get the run-in
    let grown = adult("A1");
    assert_eq!(
        definition(&settings).window(&grown, "").unwrap().start,
        grown.start_date + 30
    );
}

#[test]
fn test_minimum_patient_time_holds_for_every_included_patient() {
    let settings = PopulationSettings {
        run_in_period: vec!["IPCI;365".to_string(), "OTHER;30".to_string()],
        minimum_days_of_patient_time: 400,
        study_start: Some("2001-01-01".to_string()),
        max_age: Some(65),
        ..Default::default()
    };
    let mut patients: Vec<Patient> = (0..40)
        .map(|i| {
            Patient::new(
                format!("P{i}"),
                Gender::Female,
                day(1930 + i, 1 + (i as u32 % 12), 1),
                day(2000, 1, 1) + i * 30,
                day(2003, 1, 1) + i * 45,
            )
        })
        .collect();

    let outcome = run(
        vec![Box::new(definition(&settings))],
        RunContext::new("IPCI"),
        &mut patients,
    );
    let included: Vec<Window> = outcome.states.iter().filter_map(|s| s.population).collect();
    assert!(!included.is_empty());
    assert!(included.len() < patients.len());
    for window in included {
        assert!(window.len() >= 400, "{window} shorter than the minimum");
    }
    for (state, _) in outcome.states.iter().zip(&patients) {
        assert_eq!(state.population, state.cohort);
    }
}

#[test]
fn test_attrition_report_lists_every_step() {
    let settings = PopulationSettings {
        minimum_days_of_patient_time: 5000,
        ..Default::default()
    };
    let mut patients = vec![adult("P1")];
    let outcome = run(vec![Box::new(definition(&settings))], RunContext::default(), &mut patients);
    let report = jerboa::Workflow::new(vec![Box::new(definition(&settings))], RunContext::default()).report(&outcome);
    assert!(report.contains("insufficient patient time"));
    assert!(report.contains("in population"));
    assert_eq!(outcome.states[0].population, None);
}
