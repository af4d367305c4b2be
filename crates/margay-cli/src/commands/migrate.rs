//! `margay migrate`: the full pipeline.

use std::path::PathBuf;
use std::process::ExitCode;

use miette::IntoDiagnostic;

use margay_engine::{MigrationConfig, MigrationOrchestrator};

pub fn run(
    input: Vec<PathBuf>,
    output: PathBuf,
    config_path: Option<PathBuf>,
    max_retries: u32,
    parallel: bool,
    verbose: bool,
) -> miette::Result<ExitCode> {
    let mut config = load_config(config_path)?;
    config.max_retries = max_retries;
    config.parallel_execution = parallel;
    config.output_dir = output;
    config.verbose = config.verbose || verbose;

    let mut orchestrator = MigrationOrchestrator::new(config).into_diagnostic()?;
    let report = orchestrator.migrate_all(&input);

    println!("\n{}\n", report.summary());

    if report.failed_programs == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!(
            "warning: {} programs failed to convert",
            report.failed_programs
        );
        Ok(ExitCode::FAILURE)
    }
}

fn load_config(config_path: Option<PathBuf>) -> miette::Result<MigrationConfig> {
    match config_path {
        Some(path) => MigrationConfig::load(&path).into_diagnostic(),
        None => {
            // conventional location, silently absent otherwise
            let default_path = PathBuf::from("config/config.yaml");
            if default_path.exists() {
                MigrationConfig::load(&default_path).into_diagnostic()
            } else {
                Ok(MigrationConfig::default())
            }
        }
    }
}
