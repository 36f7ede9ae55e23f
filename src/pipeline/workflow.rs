//! The patient pass
//!
//! A [`Workflow`] owns the built modifiers and the run context. Every patient
//! starts with its observation period as population and cohort window and is
//! handed to the modifiers in order. Each worker keeps its own set of
//! collectors; they are merged when the pass ends.
//!
//! Cancellation is cooperative. The stop flag is checked before each patient,
//! and a stopped run returns [`Error::Cancelled`] without writing anything.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::models::{Patient, PatientState};
use crate::pipeline::{Modifier, RunContext};
use crate::stats::{ModifierStats, OutputManager, ResultTable};
use crate::utils::date::Day;
use crate::utils::logging::{create_main_progress_bar, finish_progress_bar, log_modifier_complete};

/// Name of the per-patient result file
pub const RESULTS_FILE: &str = "results";

/// Everything a finished pass produced
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Final window state per patient, in input order
    pub states: Vec<PatientState>,
    /// One collector per modifier, in modifier order
    pub stats: Vec<ModifierStats>,
    /// Per-patient windows and cohort time
    pub results: ResultTable,
    /// Time spent in each modifier, summed over workers
    pub elapsed: Vec<Duration>,
}

/// Per-worker accumulator
#[derive(Debug)]
struct Collector {
    stats: Vec<ModifierStats>,
    elapsed: Vec<Duration>,
    results: ResultTable,
    processed: usize,
}

impl Collector {
    fn new(modifiers: &[Box<dyn Modifier>]) -> Self {
        let stats = modifiers
            .iter()
            .map(|m| {
                let mut stats = ModifierStats::new();
                m.prepare(&mut stats);
                stats
            })
            .collect();
        Self {
            stats,
            elapsed: vec![Duration::ZERO; modifiers.len()],
            results: ResultTable::new(),
            processed: 0,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (mine, theirs) in self.stats.iter_mut().zip(other.stats) {
            mine.merge(theirs);
        }
        for (mine, theirs) in self.elapsed.iter_mut().zip(other.elapsed) {
            *mine += theirs;
        }
        self.results.merge(other.results);
        self.processed += other.processed;
        self
    }
}

/// Configured modifiers plus the settings of one run
#[derive(Debug)]
pub struct Workflow {
    modifiers: Vec<Box<dyn Modifier>>,
    ctx: RunContext,
    parallel: bool,
    threads: usize,
    cancel: Arc<AtomicBool>,
    progress: bool,
}

impl Workflow {
    /// Sequential workflow over `modifiers`
    #[must_use]
    pub fn new(modifiers: Vec<Box<dyn Modifier>>, ctx: RunContext) -> Self {
        Self {
            modifiers,
            ctx,
            parallel: false,
            threads: num_cpus::get(),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: false,
        }
    }

    /// Process patients on a rayon pool of `threads` workers
    #[must_use]
    pub fn with_parallelism(mut self, parallel: bool, threads: usize) -> Self {
        self.parallel = parallel;
        self.threads = threads.max(1);
        self
    }

    /// Show a progress bar during the pass
    #[must_use]
    pub const fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Flag that stops the run when set
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Configured modifiers
    #[must_use]
    pub fn modifiers(&self) -> &[Box<dyn Modifier>] {
        &self.modifiers
    }

    /// Run context handed to every modifier
    #[must_use]
    pub const fn context(&self) -> &RunContext {
        &self.ctx
    }

    fn initial_state(patient: &Patient) -> PatientState {
        let observation = patient.observation();
        let window = (!observation.is_empty()).then_some(observation);
        PatientState {
            population: window,
            cohort: window,
        }
    }

    fn process_patient(&self, patient: &mut Patient, state: &mut PatientState, collector: &mut Collector) {
        for (i, modifier) in self.modifiers.iter().enumerate() {
            let start = Instant::now();
            modifier.process(patient, state, &self.ctx, &mut collector.stats[i]);
            collector.elapsed[i] += start.elapsed();
        }
        self.record_result(&patient.id, state, &mut collector.results);
        collector.processed += 1;
    }

    fn record_result(&self, id: &str, state: &PatientState, results: &mut ResultTable) {
        // Every column is set for every patient so the column order never depends on the worker.
        let day = |d: Option<Day>| d.map(|d| self.ctx.format_day(d)).unwrap_or_default();
        results.set(id, "PopulationStart", day(state.population.map(|w| w.start)));
        results.set(id, "PopulationEnd", day(state.population.map(|w| w.end)));
        results.set(id, "CohortStart", day(state.cohort.map(|w| w.start)));
        results.set(id, "CohortEnd", day(state.cohort.map(|w| w.end)));
        results.set(id, "CohortTime", state.cohort_time());
    }

    /// Run every patient through the modifiers
    pub fn run(&self, patients: &mut [Patient]) -> Result<RunOutcome> {
        let started = Instant::now();
        let mut states: Vec<PatientState> = patients.iter().map(Self::initial_state).collect();
        let pb = self
            .progress
            .then(|| create_main_progress_bar(patients.len() as u64, Some("Processing patients")));

        let collector = if self.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .build()
                .map_err(|e| Error::Other(format!("Failed to build thread pool: {e}")))?;
            pool.install(|| {
                patients
                    .par_iter_mut()
                    .zip(states.par_iter_mut())
                    .fold(
                        || Collector::new(&self.modifiers),
                        |mut collector, (patient, state)| {
                            if !self.cancel.load(Ordering::Relaxed) {
                                self.process_patient(patient, state, &mut collector);
                                if let Some(pb) = &pb {
                                    pb.inc(1);
                                }
                            }
                            collector
                        },
                    )
                    .reduce(|| Collector::new(&self.modifiers), Collector::merge)
            })
        } else {
            let mut collector = Collector::new(&self.modifiers);
            for (patient, state) in patients.iter_mut().zip(states.iter_mut()) {
                if self.cancel.load(Ordering::Relaxed) {
                    break;
                }
                self.process_patient(patient, state, &mut collector);
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
            }
            collector
        };

        if let Some(pb) = &pb {
            finish_progress_bar(pb, Some("Patients processed"));
        }
        if self.cancel.load(Ordering::Relaxed) {
            log::warn!("Run cancelled after {} of {} patients", collector.processed, patients.len());
            return Err(Error::Cancelled {
                processed: collector.processed,
            });
        }

        for (modifier, elapsed) in self.modifiers.iter().zip(&collector.elapsed) {
            log_modifier_complete(modifier.name(), collector.processed, *elapsed);
        }
        log::info!("Processed {} patients in {:?}", collector.processed, started.elapsed());

        Ok(RunOutcome {
            states,
            stats: collector.stats,
            results: collector.results,
            elapsed: collector.elapsed,
        })
    }

    /// Hand every output row and the result table to `output`, then flush it
    pub fn write_outputs(&self, outcome: &RunOutcome, output: &mut dyn OutputManager) -> Result<()> {
        for modifier in &self.modifiers {
            for (file, header) in modifier.output_headers() {
                output.set_header(&file, header);
            }
        }
        for stats in &outcome.stats {
            for record in &stats.records {
                output.add_record(&record.file, record.row.clone());
            }
        }
        outcome.results.write_to(output, RESULTS_FILE);
        output.flush()
    }

    /// End-of-run report with one section per modifier
    #[must_use]
    pub fn report(&self, outcome: &RunOutcome) -> String {
        let mut out = String::new();
        for (modifier, stats) in self.modifiers.iter().zip(&outcome.stats) {
            out.push_str(&modifier.summary(stats));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, Window};
    use crate::stats::MemoryOutput;

    #[derive(Debug)]
    struct ShiftStart(i32);

    impl Modifier for ShiftStart {
        fn name(&self) -> &str {
            "ShiftStart"
        }

        fn process(&self, _patient: &mut Patient, state: &mut PatientState, _ctx: &RunContext, stats: &mut ModifierStats) {
            stats.attrition.record("seen");
            if let Some(cohort) = state.cohort.as_mut() {
                cohort.start += self.0;
            }
            stats.add_record("shifted", vec![cohort_text(state)]);
        }

        fn prepare(&self, stats: &mut ModifierStats) {
            stats.attrition.declare("seen");
        }
    }

    fn cohort_text(state: &PatientState) -> String {
        state.cohort.map(|c| c.to_string()).unwrap_or_default()
    }

    fn patients(n: usize) -> Vec<Patient> {
        (0..n)
            .map(|i| Patient::new(format!("P{i:03}"), Gender::Unknown, 700_000, 730_000, 731_000))
            .collect()
    }

    #[test]
    fn test_modifiers_apply_in_order() {
        let workflow = Workflow::new(vec![Box::new(ShiftStart(10)), Box::new(ShiftStart(5))], RunContext::default());
        let mut patients = patients(3);
        let outcome = workflow.run(&mut patients).unwrap();
        assert_eq!(outcome.states[0].cohort, Some(Window::new(730_015, 731_000)));
        assert_eq!(outcome.stats[0].attrition.get("seen"), 3);
        assert_eq!(outcome.results.get("P001", "CohortTime"), Some("985"));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let build = || vec![Box::new(ShiftStart(10)) as Box<dyn Modifier>];
        let mut sequential_patients = patients(500);
        let mut parallel_patients = patients(500);
        let sequential = Workflow::new(build(), RunContext::default()).run(&mut sequential_patients).unwrap();
        let parallel = Workflow::new(build(), RunContext::default())
            .with_parallelism(true, 4)
            .run(&mut parallel_patients)
            .unwrap();

        assert_eq!(sequential.states, parallel.states);
        assert_eq!(parallel.stats[0].attrition.get("seen"), 500);
        assert_eq!(parallel.stats[0].records.len(), 500);
        assert_eq!(sequential.results.len(), parallel.results.len());
    }

    #[test]
    fn test_cancelled_run() {
        let workflow = Workflow::new(vec![Box::new(ShiftStart(1))], RunContext::default());
        workflow.cancel_flag().store(true, Ordering::Relaxed);
        let mut patients = patients(10);
        assert!(matches!(workflow.run(&mut patients), Err(Error::Cancelled { processed: 0 })));
    }

    #[test]
    fn test_outputs_and_report() {
        let workflow = Workflow::new(vec![Box::new(ShiftStart(1))], RunContext::default());
        let mut patients = patients(2);
        let outcome = workflow.run(&mut patients).unwrap();
        let mut output = MemoryOutput::new();
        workflow.write_outputs(&outcome, &mut output).unwrap();
        assert_eq!(output.rows("shifted").len(), 2);
        let results = output.table(RESULTS_FILE).unwrap();
        assert_eq!(results.header[0], "PatientID");
        assert_eq!(results.rows.len(), 2);
        assert!(workflow.report(&outcome).contains("ShiftStart"));
    }
}
