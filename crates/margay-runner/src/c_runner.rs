//! Compile-and-run baseline collection against the original C source.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use indexmap::IndexMap;

use margay_analyzer::strip_main;
use margay_model::{CProgram, TestResult, TestSuite};

use crate::exec::{probe_tool, run_with_timeout, ExecError};
use crate::protocol::{mark_all_error, parse_harness_output, HarnessOutput};
use crate::RunnerError;

const COMPILE_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs generated C harnesses with the system C compiler.
pub struct CTestRunner {
    gcc_path: String,
    run_timeout: Duration,
    compiler_flags: Vec<String>,
}

impl Default for CTestRunner {
    fn default() -> Self {
        CTestRunner::new("gcc", 30)
    }
}

impl CTestRunner {
    pub fn new(gcc_path: impl Into<String>, run_timeout_secs: u64) -> Self {
        CTestRunner {
            gcc_path: gcc_path.into(),
            run_timeout: Duration::from_secs(run_timeout_secs),
            // C99, all warnings, math library linked
            compiler_flags: vec![
                "-std=c99".to_string(),
                "-Wall".to_string(),
                "-lm".to_string(),
            ],
        }
    }

    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.compiler_flags = flags;
        self
    }

    /// Probe the compiler once up front.
    pub fn verify_compiler(&self) -> bool {
        let found = probe_tool(&self.gcc_path, "--version");
        if found {
            tracing::info!(compiler = %self.gcc_path, "C compiler found");
        } else {
            tracing::error!(compiler = %self.gcc_path, "C compiler not found");
        }
        found
    }

    /// Compile sources into one binary.
    pub fn compile(&self, sources: &[PathBuf], output: &Path) -> Result<(), RunnerError> {
        let mut command = Command::new(&self.gcc_path);
        command.args(sources);
        command.arg("-o").arg(output);
        command.args(&self.compiler_flags);

        tracing::debug!(compiler = %self.gcc_path, ?sources, "compiling C harness");
        let result = run_with_timeout(&mut command, COMPILE_TIMEOUT);
        match result {
            Ok(out) if out.success() => Ok(()),
            Ok(out) => Err(RunnerError::Compile(out.stderr)),
            Err(ExecError::Spawn { program, .. }) => Err(RunnerError::CompilerMissing(program)),
            Err(e) => Err(RunnerError::Exec(e)),
        }
    }

    /// Compile the harness next to the `main`-stripped original, execute,
    /// and parse the output protocol. Infrastructure failures surface as
    /// per-test `error` results rather than aborting the run.
    pub fn run_tests(
        &self,
        program: &CProgram,
        suite: &TestSuite,
        harness_code: &str,
    ) -> IndexMap<String, TestResult> {
        let work_dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return mark_all_error(suite, &format!("failed to create work directory: {e}"));
            }
        };

        let harness_file = work_dir.path().join("test_harness.c");
        let source_file = work_dir.path().join("original.c");
        let binary_file = work_dir.path().join("test.out");

        if let Err(e) = std::fs::write(&harness_file, harness_code) {
            return mark_all_error(suite, &format!("failed to write harness: {e}"));
        }
        if let Err(e) = std::fs::write(&source_file, strip_main(&program.source_code)) {
            return mark_all_error(suite, &format!("failed to write source: {e}"));
        }

        if let Err(e) = self.compile(&[harness_file, source_file], &binary_file) {
            tracing::error!(program_id = %program.program_id, error = %e, "C compilation failed");
            return mark_all_error(suite, "Compilation failed");
        }

        tracing::info!(program_id = %program.program_id, tests = suite.len(), "running C tests");
        match run_with_timeout(&mut Command::new(&binary_file), self.run_timeout) {
            Ok(output) => {
                tracing::info!(
                    program_id = %program.program_id,
                    elapsed_ms = output.duration.as_millis() as u64,
                    "C tests completed"
                );
                parse_harness_output(
                    suite,
                    &HarnessOutput {
                        stdout: output.stdout,
                        stderr: output.stderr,
                        exit_code: output.exit_code,
                        duration: output.duration,
                    },
                )
            }
            Err(ExecError::Timeout { timeout, .. }) => {
                tracing::error!(program_id = %program.program_id, "C test execution timeout");
                mark_all_error(
                    suite,
                    &format!("Execution timeout ({}s)", timeout.as_secs()),
                )
            }
            Err(e) => mark_all_error(suite, &format!("Execution error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap as Map;
    use margay_model::{TestCase, TestCategory, TestStatus};

    fn one_test_suite() -> TestSuite {
        let mut suite = TestSuite::new("prog", None);
        suite.add(TestCase::new(
            "sum_boundary_1",
            "prog",
            "sum",
            Map::new(),
            TestCategory::Boundary,
        ));
        suite
    }

    #[test]
    fn missing_compiler_marks_all_tests_error() {
        let runner = CTestRunner::new("margay-no-such-gcc", 5);
        let program = CProgram {
            program_id: "prog".to_string(),
            source_code: "int sum(int a, int b) { return a + b; }".to_string(),
            ..CProgram::default()
        };
        let suite = one_test_suite();
        let results = runner.run_tests(&program, &suite, "int main(void) { return 0; }");
        assert!(results
            .values()
            .all(|r| r.status == TestStatus::Error
                && r.error_message.as_deref() == Some("Compilation failed")));
    }

    // Requires a system C compiler; run with `cargo test -- --ignored`.
    #[test]
    #[ignore]
    fn end_to_end_baseline_for_trivial_sum() {
        let runner = CTestRunner::default();
        let program = CProgram {
            program_id: "prog".to_string(),
            source_code:
                "int sum(int a, int b) { return a + b; }\nint main(void) { return sum(1, 2); }\n"
                    .to_string(),
            ..CProgram::default()
        };
        let suite = one_test_suite();
        let harness = "#include <stdio.h>\nint sum(int a, int b);\nint main(void) {\n    int a = 2; int b = 3;\n    int result = sum(a, b);\n    printf(\"Test sum_boundary_1: result = %d\\n\", result);\n    return 0;\n}\n";
        let results = runner.run_tests(&program, &suite, harness);
        let result = results.values().next().unwrap();
        assert_eq!(result.status, TestStatus::Passed);
    }
}
