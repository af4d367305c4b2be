//! Pairwise comparison of C and C# test outputs.
//!
//! For every test case the two result sets are joined by test id and their
//! output maps compared over the union of keys. Non-float values compare
//! strictly; floats compare under an absolute tolerance scaled by operand
//! magnitude once it exceeds 1. NaN matches NaN and infinities match when
//! their signs do. A type mismatch between two numeric values promotes both
//! to float; any other mismatch is critical.

use indexmap::IndexMap;

use margay_model::{OutputDifference, OutputValue, TestResult, TestSuite, ValidationResult};

/// Comparison thresholds.
#[derive(Debug, Clone, Copy)]
pub struct ValidatorOptions {
    /// Base absolute tolerance for float comparison.
    pub float_tolerance: f64,
    /// Reserved for stricter double-only comparisons.
    pub double_tolerance: f64,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        ValidatorOptions {
            float_tolerance: 1e-6,
            double_tolerance: 1e-12,
        }
    }
}

/// Compares baseline and translated outputs test by test.
#[derive(Debug, Default, Clone)]
pub struct OutputValidator {
    options: ValidatorOptions,
}

impl OutputValidator {
    pub fn new(options: ValidatorOptions) -> Self {
        OutputValidator { options }
    }

    /// Validate every test in the suite.
    ///
    /// `is_match` holds exactly when at least one output was compared and
    /// none differed; `matching + different == total` always.
    pub fn validate(
        &self,
        suite: &TestSuite,
        c_results: &IndexMap<String, TestResult>,
        csharp_results: &IndexMap<String, TestResult>,
    ) -> Vec<ValidationResult> {
        let mut validations = Vec::with_capacity(suite.test_cases.len());

        for test_case in &suite.test_cases {
            let mut validation = ValidationResult::new(test_case.id.clone());

            let (Some(c_result), Some(cs_result)) = (
                c_results.get(&test_case.id),
                csharp_results.get(&test_case.id),
            ) else {
                validation.differences.push(OutputDifference {
                    variable_name: "test_execution".to_string(),
                    c_value: presence(c_results.get(&test_case.id)),
                    csharp_value: presence(csharp_results.get(&test_case.id)),
                    description: "test did not execute on both sides".to_string(),
                    tolerance: None,
                    is_critical: true,
                });
                validations.push(validation);
                continue;
            };

            // union of keys, C-side order first
            let mut keys: Vec<&String> = c_result.outputs.keys().collect();
            for key in cs_result.outputs.keys() {
                if !c_result.outputs.contains_key(key) {
                    keys.push(key);
                }
            }
            validation.total_outputs = keys.len();

            for key in keys {
                match (c_result.outputs.get(key), cs_result.outputs.get(key)) {
                    (None, Some(cs_value)) => {
                        validation.different_outputs += 1;
                        validation.differences.push(OutputDifference {
                            variable_name: key.clone(),
                            c_value: "<missing>".to_string(),
                            csharp_value: cs_value.to_string(),
                            description: "output missing in C".to_string(),
                            tolerance: None,
                            is_critical: true,
                        });
                    }
                    (Some(c_value), None) => {
                        validation.different_outputs += 1;
                        validation.differences.push(OutputDifference {
                            variable_name: key.clone(),
                            c_value: c_value.to_string(),
                            csharp_value: "<missing>".to_string(),
                            description: "output missing in C#".to_string(),
                            tolerance: None,
                            is_critical: true,
                        });
                    }
                    (Some(c_value), Some(cs_value)) => {
                        match self.compare_values(key, c_value, cs_value) {
                            Comparison::Match => validation.matching_outputs += 1,
                            Comparison::MatchWithin(difference) => {
                                validation.matching_outputs += 1;
                                validation.differences.push(difference);
                            }
                            Comparison::Differ(difference) => {
                                validation.different_outputs += 1;
                                validation.differences.push(difference);
                            }
                        }
                    }
                    (None, None) => {}
                }
            }

            validation.is_match =
                validation.different_outputs == 0 && validation.total_outputs > 0;
            validations.push(validation);
        }

        let passed = validations.iter().filter(|v| v.is_match).count();
        tracing::info!(
            passed,
            total = validations.len(),
            "validation completed"
        );
        validations
    }

    fn compare_values(&self, key: &str, c_value: &OutputValue, cs_value: &OutputValue) -> Comparison {
        match (c_value, cs_value) {
            (OutputValue::Float(_), _) | (_, OutputValue::Float(_)) => {
                // promote when the other side is numeric too
                match (c_value.as_f64(), cs_value.as_f64()) {
                    (Some(a), Some(b)) => self.compare_floats(key, a, b),
                    _ => Comparison::Differ(type_mismatch(key, c_value, cs_value)),
                }
            }
            (OutputValue::Int(a), OutputValue::Int(b)) => {
                if a == b {
                    Comparison::Match
                } else {
                    Comparison::Differ(plain_mismatch(key, c_value, cs_value))
                }
            }
            (OutputValue::Text(a), OutputValue::Text(b)) => {
                if a == b {
                    Comparison::Match
                } else {
                    Comparison::Differ(plain_mismatch(key, c_value, cs_value))
                }
            }
            (OutputValue::Completed, OutputValue::Completed) => Comparison::Match,
            _ => Comparison::Differ(type_mismatch(key, c_value, cs_value)),
        }
    }

    fn compare_floats(&self, key: &str, a: f64, b: f64) -> Comparison {
        if a.is_nan() && b.is_nan() {
            return Comparison::Match;
        }
        if a.is_infinite() && b.is_infinite() {
            return if a.is_sign_positive() == b.is_sign_positive() {
                Comparison::Match
            } else {
                Comparison::Differ(OutputDifference {
                    variable_name: key.to_string(),
                    c_value: a.to_string(),
                    csharp_value: b.to_string(),
                    description: "infinities of opposite sign".to_string(),
                    tolerance: None,
                    is_critical: true,
                })
            };
        }

        let diff = (a - b).abs();
        let magnitude = a.abs().max(b.abs());
        let tolerance = if magnitude > 1.0 {
            magnitude * self.options.float_tolerance
        } else {
            self.options.float_tolerance
        };

        if diff <= tolerance {
            if diff > 0.0 {
                Comparison::MatchWithin(OutputDifference {
                    variable_name: key.to_string(),
                    c_value: a.to_string(),
                    csharp_value: b.to_string(),
                    description: format!("float difference within tolerance: {diff:.2e}"),
                    tolerance: Some(tolerance),
                    is_critical: false,
                })
            } else {
                Comparison::Match
            }
        } else {
            Comparison::Differ(OutputDifference {
                variable_name: key.to_string(),
                c_value: a.to_string(),
                csharp_value: b.to_string(),
                description: format!(
                    "float difference exceeds tolerance: {diff:.2e} > {tolerance:.2e}"
                ),
                tolerance: Some(tolerance),
                is_critical: true,
            })
        }
    }
}

enum Comparison {
    Match,
    MatchWithin(OutputDifference),
    Differ(OutputDifference),
}

fn presence(result: Option<&TestResult>) -> String {
    if result.is_some() { "present" } else { "missing" }.to_string()
}

fn plain_mismatch(key: &str, c_value: &OutputValue, cs_value: &OutputValue) -> OutputDifference {
    OutputDifference {
        variable_name: key.to_string(),
        c_value: c_value.to_string(),
        csharp_value: cs_value.to_string(),
        description: "values do not match".to_string(),
        tolerance: None,
        is_critical: true,
    }
}

fn type_mismatch(key: &str, c_value: &OutputValue, cs_value: &OutputValue) -> OutputDifference {
    OutputDifference {
        variable_name: key.to_string(),
        c_value: c_value.to_string(),
        csharp_value: cs_value.to_string(),
        description: "output types do not match".to_string(),
        tolerance: None,
        is_critical: true,
    }
}

/// Human-readable diff report over a validation run.
pub fn render_report(validations: &[ValidationResult]) -> String {
    let total = validations.len();
    let passed = validations.iter().filter(|v| v.is_match).count();
    let failed = total - passed;

    let mut lines = Vec::new();
    lines.push("=".repeat(70));
    lines.push("VALIDATION REPORT".to_string());
    lines.push("=".repeat(70));
    lines.push(String::new());
    lines.push("Summary:".to_string());
    lines.push(format!("  Total tests: {total}"));
    if total > 0 {
        lines.push(format!(
            "  Passed: {passed} ({:.1}%)",
            passed as f64 / total as f64 * 100.0
        ));
        lines.push(format!(
            "  Failed: {failed} ({:.1}%)",
            failed as f64 / total as f64 * 100.0
        ));
    }
    lines.push(String::new());

    if failed > 0 {
        lines.push("Failed Tests:".to_string());
        lines.push("-".repeat(70));
        for validation in validations.iter().filter(|v| !v.is_match) {
            lines.push(String::new());
            lines.push(format!("Test: {}", validation.test_case_id));
            lines.push(format!("  {}", validation.summary()));
            if !validation.differences.is_empty() {
                lines.push("  Differences:".to_string());
                for difference in &validation.differences {
                    lines.push(format!("    - {difference}"));
                }
            }
        }
        lines.push(String::new());
    }
    lines.push("=".repeat(70));
    lines.join("\n")
}
