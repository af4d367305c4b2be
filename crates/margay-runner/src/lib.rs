//! Test-harness runners for both sides of the migration.
//!
//! The C runner links the generated harness against the original source
//! (with its `main` stripped) and records the baseline; the C# runner
//! normalizes the translated code into a single `ConvertedCode` class,
//! materializes a console project, builds, and runs. Both parse the same
//! line-oriented output protocol:
//!
//! ```text
//! Test <name>: result = <literal>
//! Test <name>: completed
//! Test <name>: ERROR - <message>      (C# only)
//! === Test Summary ===
//! ```
//!
//! Failure taxonomy: a compile failure marks every test in the suite
//! `error("Compilation failed")`; a timeout marks every test
//! `error("Execution timeout")`; a test with no parseable output line is an
//! `error` with the full stdout/stderr retained.

pub mod c_runner;
pub mod csharp_runner;
pub mod exec;
pub mod normalize;
pub mod protocol;

pub use c_runner::CTestRunner;
pub use csharp_runner::CSharpTestRunner;
pub use exec::{run_with_timeout, ExecError, ExecOutput};
pub use normalize::normalize_csharp_code;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("compiler not found: {0}")]
    CompilerMissing(String),
    #[error("compilation failed:\n{0}")]
    Compile(String),
    #[error("failed to create project at {path}: {message}")]
    Project { path: PathBuf, message: String },
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Exec(#[from] exec::ExecError),
}
