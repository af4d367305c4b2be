//! Parser for the harness output protocol, shared by both runners.

use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;

use margay_model::{OutputValue, TestResult, TestSuite};

/// Raw capture of one harness execution.
#[derive(Debug, Clone)]
pub struct HarnessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

/// Parse one run's stdout into per-test results.
///
/// Matching is by test label, not position, so interleaved or reordered
/// output is tolerated. Per-test verdicts:
/// - a parsed `result =` / `completed` line passes the test,
/// - an `ERROR -` line fails it with the harness message,
/// - no line at all is a failure on non-zero exit, otherwise an `error`
///   (the harness ran but produced nothing parseable for this test).
pub fn parse_harness_output(
    suite: &TestSuite,
    output: &HarnessOutput,
) -> IndexMap<String, TestResult> {
    let mut results = IndexMap::new();

    for test_case in &suite.test_cases {
        let mut result = TestResult::pending(test_case.id.clone());
        result.started_at = Some(Utc::now());
        result.standard_output = output.stdout.clone();
        result.standard_error = output.stderr.clone();
        result.exit_code = output.exit_code;
        result.execution_time = output.duration;

        let label = format!("Test {}:", test_case.name);
        let mut outputs: IndexMap<String, OutputValue> = IndexMap::new();
        let mut harness_error: Option<String> = None;

        for line in output.stdout.lines() {
            let Some(rest) = line.trim_start().strip_prefix(&label) else {
                continue;
            };
            let rest = rest.trim();
            if let Some(literal) = rest.strip_prefix("result =") {
                outputs.insert(
                    "return_value".to_string(),
                    OutputValue::parse_literal(literal),
                );
            } else if rest.starts_with("completed") {
                outputs.insert("completed".to_string(), OutputValue::Completed);
            } else if let Some(message) = rest.strip_prefix("ERROR -") {
                harness_error = Some(message.trim().to_string());
            }
        }

        if let Some(message) = harness_error {
            result.mark_failure(message, Some(outputs));
        } else if !outputs.is_empty() {
            result.mark_success(outputs);
        } else if output.exit_code != Some(0) {
            result.mark_failure("no output found and non-zero exit code", None);
        } else {
            result.mark_error("no parseable output for test");
        }

        results.insert(test_case.id.clone(), result);
    }

    results
}

/// Mark every test in the suite with the same infrastructure error.
pub fn mark_all_error(suite: &TestSuite, message: &str) -> IndexMap<String, TestResult> {
    let mut results = IndexMap::new();
    for test_case in &suite.test_cases {
        let mut result = TestResult::pending(test_case.id.clone());
        result.mark_error(message);
        results.insert(test_case.id.clone(), result);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use margay_model::{TestCase, TestCategory, TestStatus};

    fn suite_with(names: &[&str]) -> TestSuite {
        let mut suite = TestSuite::new("prog", None);
        for name in names {
            suite.add(TestCase::new(
                *name,
                "prog",
                "sum",
                IndexMap::new(),
                TestCategory::Boundary,
            ));
        }
        suite
    }

    fn output(stdout: &str, exit_code: i32) -> HarnessOutput {
        HarnessOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(exit_code),
            duration: Duration::from_millis(10),
        }
    }

    #[test]
    fn integer_result_round_trips_exactly() {
        let suite = suite_with(&["sum_boundary_1"]);
        let out = output("Test sum_boundary_1: result = -2147483648\n", 0);
        let results = parse_harness_output(&suite, &out);
        let result = &results[&suite.test_cases[0].id];
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(
            result.outputs["return_value"],
            OutputValue::Int(-2147483648)
        );
    }

    #[test]
    fn float_result_parses_by_dot_rule() {
        let suite = suite_with(&["avg_boundary_1"]);
        let out = output("Test avg_boundary_1: result = 0.30000000000000004\n", 0);
        let results = parse_harness_output(&suite, &out);
        assert_eq!(
            results[&suite.test_cases[0].id].outputs["return_value"],
            OutputValue::Float(0.30000000000000004)
        );
    }

    #[test]
    fn completed_marks_void_tests() {
        let suite = suite_with(&["tick_boundary_1"]);
        let out = output("Test tick_boundary_1: completed\n", 0);
        let results = parse_harness_output(&suite, &out);
        let result = &results[&suite.test_cases[0].id];
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(result.outputs["completed"], OutputValue::Completed);
    }

    #[test]
    fn harness_error_line_fails_the_test() {
        let suite = suite_with(&["div_edge_1"]);
        let out = output(
            "Test div_edge_1: ERROR - Attempted to divide by zero.\n",
            0,
        );
        let results = parse_harness_output(&suite, &out);
        let result = &results[&suite.test_cases[0].id];
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Attempted to divide by zero.")
        );
    }

    #[test]
    fn matching_is_by_label_not_position() {
        let suite = suite_with(&["a_boundary_1", "b_boundary_1"]);
        let out = output(
            "Test b_boundary_1: result = 2\nnoise line\nTest a_boundary_1: result = 1\n",
            0,
        );
        let results = parse_harness_output(&suite, &out);
        assert_eq!(
            results[&suite.test_cases[0].id].outputs["return_value"],
            OutputValue::Int(1)
        );
        assert_eq!(
            results[&suite.test_cases[1].id].outputs["return_value"],
            OutputValue::Int(2)
        );
    }

    #[test]
    fn missing_line_with_clean_exit_is_an_error() {
        let suite = suite_with(&["ghost_boundary_1"]);
        let out = output("=== Test Summary ===\nPassed: 0\nFailed: 0\n", 0);
        let results = parse_harness_output(&suite, &out);
        assert_eq!(results[&suite.test_cases[0].id].status, TestStatus::Error);
    }

    #[test]
    fn partial_output_with_crash_keeps_parsed_lines() {
        let suite = suite_with(&["ok_boundary_1", "crash_boundary_1"]);
        let out = output("Test ok_boundary_1: result = 7\n", 139);
        let results = parse_harness_output(&suite, &out);
        assert_eq!(
            results[&suite.test_cases[0].id].status,
            TestStatus::Passed
        );
        assert_eq!(
            results[&suite.test_cases[1].id].status,
            TestStatus::Failed
        );
    }

    #[test]
    fn stdout_and_stderr_are_retained_on_error() {
        let suite = suite_with(&["t_boundary_1"]);
        let mut out = output("garbage", 1);
        out.stderr = "segfault".to_string();
        let results = parse_harness_output(&suite, &out);
        let result = &results[&suite.test_cases[0].id];
        assert_eq!(result.standard_output, "garbage");
        assert_eq!(result.standard_error, "segfault");
    }

    #[test]
    fn mark_all_error_covers_every_test() {
        let suite = suite_with(&["a", "b", "c"]);
        let results = mark_all_error(&suite, "Compilation failed");
        assert_eq!(results.len(), 3);
        assert!(results
            .values()
            .all(|r| r.status == TestStatus::Error
                && r.error_message.as_deref() == Some("Compilation failed")));
    }
}
