//! Migration engine.
//!
//! Drives the whole loop in dependency order: parse the C sources, build
//! the include graph, compute the conversion order, and for each program
//! run generate → baseline → translate → run → validate with retries,
//! finishing with the aggregate migration report.

pub mod config;
pub mod orchestrator;
pub mod report;

pub use config::{ConverterConfig, GeminiSection, MigrationConfig, RateLimitSection};
pub use orchestrator::MigrationOrchestrator;
pub use report::write_report;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Analyzer(#[from] margay_analyzer::AnalyzerError),
    #[error(transparent)]
    Graph(#[from] margay_graph::GraphError),
    #[error(transparent)]
    Translate(#[from] margay_translate::TranslateError),
    #[error("failed to read configuration {path}: {message}")]
    Config { path: String, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
