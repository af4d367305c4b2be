//! C source analyzer.
//!
//! Drives the tree-sitter C grammar to turn `.c`/`.h` files into the
//! pipeline's structural model: functions with signatures and raw bodies,
//! includes partitioned into system and user headers, call sites, macros,
//! structs, enums, and globals. Also provides the project-level scan used to
//! build the include dependency graph, and the `main`-stripping source
//! surgery shared by the symbolic driver and the C runner.
//!
//! Unreadable files and parse failures are reported but never fatal: the
//! file is skipped and the scan continues. A parse tree with errors is still
//! consumed best-effort; the analyzer never fabricates entities.

pub mod parser;
pub mod project;
pub mod source;

pub use parser::CAnalyzer;
pub use project::{file_info_of, find_c_files, FileInfo, ProjectData};
pub use source::{cyclomatic_estimate, strip_main};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "incompatible tree-sitter C grammar ABI: {0}. \
         Rebuild with matching tree-sitter and tree-sitter-c versions."
    )]
    Grammar(String),
    #[error("parser returned no tree for {path}")]
    Parse { path: PathBuf },
}
