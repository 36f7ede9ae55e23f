use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use jerboa::error::util::safe_create_file;
use jerboa::{CsvOutputManager, Workflow, WorkflowConfig, load_patients};

/// Jerboa - cohort and exposure engine
#[derive(Parser, Debug)]
#[command(name = "jerboa")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "JERBOA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the input tables and run the workflow
    Run {
        /// Workflow file
        workflow: PathBuf,
        /// Override the output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Process patients in parallel
        #[arg(long)]
        parallel: bool,
        /// Worker threads for a parallel run
        #[arg(long)]
        threads: Option<usize>,
        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// Check the workflow file and every modifier's settings
    Validate {
        /// Workflow file
        workflow: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = cli.log_level.as_deref().unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Validate { workflow } => {
            let config = WorkflowConfig::from_file(&workflow)?;
            for modifier in config.build_modifiers()? {
                info!("{} settings are valid", modifier.name());
            }
            info!("Workflow {} is valid", workflow.display());
            Ok(())
        }
        Commands::Run {
            workflow,
            output,
            parallel,
            threads,
            quiet,
        } => {
            let mut config = WorkflowConfig::from_file(&workflow)?;
            if let Some(output) = output {
                config.output_dir = output;
            }
            config.parallel |= parallel;
            if threads.is_some() {
                config.threads = threads;
            }
            run(&config, !quiet)
        }
    }
}

fn run(config: &WorkflowConfig, progress: bool) -> Result<()> {
    let start = Instant::now();
    // Settings errors surface before any table is read.
    let modifiers = config.build_modifiers()?;
    let mut data = load_patients(&config.input, &config.date_formats, config.delimiter_byte()?)
        .context("Failed to load input tables")?;
    info!("Loaded {} patients", data.patients.len());

    let workflow = Workflow::new(modifiers, config.run_context())
        .with_parallelism(config.parallel, config.thread_count())
        .with_progress(progress);
    let outcome = workflow.run(&mut data.patients)?;

    let mut output = CsvOutputManager::new(&config.output_dir);
    workflow.write_outputs(&outcome, &mut output)?;

    let report = format!("{}\n{}", data.stats.render(), workflow.report(&outcome));
    let report_path = config.output_dir.join("report.txt");
    let mut file = safe_create_file(&report_path, "run report")?;
    std::io::Write::write_all(&mut file, report.as_bytes())
        .with_context(|| format!("Failed to write {}", report_path.display()))?;
    println!("{report}");

    info!("Workflow finished in {:?}", start.elapsed());
    Ok(())
}
