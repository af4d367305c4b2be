//! `margay report`: render a past run's report.

use std::path::PathBuf;
use std::process::ExitCode;

use miette::{miette, IntoDiagnostic};

use margay_model::MigrationReport;

pub fn run(input: PathBuf, output: PathBuf, format: String) -> miette::Result<ExitCode> {
    let text = std::fs::read_to_string(&input).into_diagnostic()?;
    let report: MigrationReport = serde_json::from_str(&text).into_diagnostic()?;

    match format.as_str() {
        "text" => {
            println!("{}", report.summary());
            for result in &report.conversion_results {
                println!("  {}: {}", result.program_id, result.summary());
            }
        }
        "json" => {
            std::fs::create_dir_all(&output).into_diagnostic()?;
            let path = output.join("migration_report.json");
            let json = serde_json::to_string_pretty(&report).into_diagnostic()?;
            std::fs::write(&path, json).into_diagnostic()?;
            println!("Report written to {}", path.display());
        }
        other => return Err(miette!("unknown report format `{other}` (expected text or json)")),
    }

    Ok(ExitCode::SUCCESS)
}
