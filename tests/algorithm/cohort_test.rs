use jerboa::algorithm::{
    CombinationSettings, EventCohortDefinition, EventCohortSettings, FixedCohortDefinition, FixedCohortSettings,
    PrescriptionCohortDefinition, PrescriptionCohortSettings, PrescriptionCombinations,
};
use jerboa::{DateFormatConfig, Event, Modifier, RunContext, Window};

use crate::utils::{adult, day, run, rx};

fn prescription_cohort(settings: PrescriptionCohortSettings) -> Box<dyn Modifier> {
    Box::new(PrescriptionCohortDefinition::from_settings(&settings).unwrap())
}

fn a10ba(extra: PrescriptionCohortSettings) -> PrescriptionCohortSettings {
    PrescriptionCohortSettings {
        drugs_of_interest: vec!["A10BA".to_string()],
        ..extra
    }
}

#[test]
fn test_drug_exclusion_window_around_start() {
    let base = day(2000, 1, 1);
    let settings = a10ba(PrescriptionCohortSettings {
        drug_exclusions: vec!["R03BB06;-100;200".to_string()],
        ..Default::default()
    });

    let cases = [
        (rx("R03BB06", 650, 10), false),
        (rx("R03BB06", 395, 10), false),
        (rx("R03BB06", 700, 30), true),
        (rx("R03BB06", 390, 10), true),
    ];
    for (exclusion, kept) in cases {
        let mut patient = adult("P1");
        patient.prescriptions = vec![rx("A10BA02", 500, 30), exclusion.clone()];
        patient.sort_collections();
        let outcome = run(vec![prescription_cohort(settings.clone())], RunContext::default(), &mut [patient]);
        assert_eq!(
            outcome.states[0].cohort.is_some(),
            kept,
            "exclusion at {} for {} days",
            exclusion.date - base,
            exclusion.duration
        );
        if kept {
            assert_eq!(outcome.states[0].cohort.unwrap().start, base + 500);
        }
    }
}

#[test]
fn test_naive_period_is_respected() {
    let base = day(2000, 1, 1);
    let mut patients = vec![adult("P1"), adult("P2")];
    for patient in &mut patients {
        patient.prescriptions = vec![rx("A10BA02", 400, 30), rx("A10BA02", 600, 30), rx("A10BA02", 1000, 30)];
    }

    let strict = a10ba(PrescriptionCohortSettings {
        naive_period: 365,
        ..Default::default()
    });
    let outcome = run(vec![prescription_cohort(strict.clone())], RunContext::default(), &mut patients[..1]);
    assert_eq!(outcome.states[0].cohort.map(|w| w.start), Some(base + 400));

    // 600 - 430 < 365, 1000 - 630 >= 365
    let mut shifted = patients[1].clone();
    shifted.prescriptions.insert(0, rx("A10BA07", 300, 30));
    let extended = PrescriptionCohortSettings {
        extended_search: true,
        ..strict.clone()
    };
    let outcome = run(vec![prescription_cohort(extended)], RunContext::default(), &mut [shifted.clone()]);
    let start = outcome.states[0].cohort.map(|w| w.start).unwrap();
    assert!(start == base + 1000, "accepted start {}", start - base);

    let outcome = run(vec![prescription_cohort(strict)], RunContext::default(), &mut [shifted]);
    assert_eq!(outcome.states[0].cohort, None);
}

#[test]
fn test_chained_cohorts_narrow_the_window() {
    let mut patient = adult("P1");
    patient.events.push(Event::new("MI", day(2004, 1, 1)));
    patient.prescriptions = vec![rx("C07AB02", 365 * 3, 60)];

    let event = EventCohortDefinition::from_settings(&EventCohortSettings {
        events: vec!["MI;0".to_string()],
        ..Default::default()
    })
    .unwrap();
    let fixed = FixedCohortDefinition::from_settings(
        &FixedCohortSettings {
            chain_cohort_definitions: true,
            cohort_end_date: Some("2006-01-01".to_string()),
            ..Default::default()
        },
        &DateFormatConfig::default(),
    )
    .unwrap();

    let outcome = run(vec![Box::new(event), Box::new(fixed)], RunContext::default(), &mut [patient]);
    assert_eq!(
        outcome.states[0].cohort,
        Some(Window::new(day(2004, 1, 1), day(2006, 1, 1)))
    );
    assert_eq!(outcome.stats[1].attrition.get("in cohort"), 1);
}

#[test]
fn test_combination_prescriptions_start_a_cohort() {
    let base = day(2000, 1, 1);
    let mut patient = adult("P1");
    patient.prescriptions = vec![rx("A10BA02", 100, 90), rx("A10BH01", 130, 90)];

    let combinations = PrescriptionCombinations::from_settings(&CombinationSettings {
        drug_groups: vec!["MET;A10BA".to_string(), "DPP4;A10BH".to_string()],
        combinations: vec!["MET_DPP4;MET,DPP4".to_string()],
        ..Default::default()
    })
    .unwrap();
    let cohort = prescription_cohort(PrescriptionCohortSettings {
        drugs_of_interest: vec!["MET_DPP4".to_string()],
        ..Default::default()
    });

    let outcome = run(vec![Box::new(combinations), cohort], RunContext::default(), std::slice::from_mut(&mut patient));
    assert_eq!(outcome.states[0].cohort.map(|w| w.start), Some(base + 130));
    assert!(patient.prescriptions.iter().any(|p| p.atc == "MET_DPP4" && p.duration == 60));
}
