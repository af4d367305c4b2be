//! Report persistence.

use std::path::{Path, PathBuf};

use margay_model::MigrationReport;

/// Write the JSON report under `<output_dir>/reports/`.
pub fn write_report(report: &MigrationReport, output_dir: &Path) -> std::io::Result<PathBuf> {
    let reports_dir = output_dir.join("reports");
    std::fs::create_dir_all(&reports_dir)?;
    let path = reports_dir.join("migration_report.json");
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(&path, json)?;
    Ok(path)
}
