//! Test cases, execution results, and output validation records.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::value::{CValue, OutputValue};

/// Strategy that produced a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    Boundary,
    Edge,
    Random,
    Symbolic,
    Functional,
}

impl TestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestCategory::Boundary => "boundary",
            TestCategory::Edge => "edge",
            TestCategory::Random => "random",
            TestCategory::Symbolic => "symbolic",
            TestCategory::Functional => "functional",
        }
    }
}

impl fmt::Display for TestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated test: a named set of inputs for one function.
///
/// Every key of `inputs` is a parameter name of the named function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    pub program_id: String,
    pub function_name: String,
    pub inputs: IndexMap<String, CValue>,
    pub expected_outputs: Option<IndexMap<String, OutputValue>>,
    pub actual_outputs: Option<IndexMap<String, OutputValue>>,
    pub description: String,
    pub category: TestCategory,
    pub created_at: DateTime<Utc>,
}

impl TestCase {
    pub fn new(
        name: impl Into<String>,
        program_id: impl Into<String>,
        function_name: impl Into<String>,
        inputs: IndexMap<String, CValue>,
        category: TestCategory,
    ) -> Self {
        TestCase {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            program_id: program_id.into(),
            function_name: function_name.into(),
            inputs,
            expected_outputs: None,
            actual_outputs: None,
            description: String::new(),
            category,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Execution state of one test on one side of the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
    Error,
}

impl TestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TestStatus::Passed | TestStatus::Failed | TestStatus::Skipped | TestStatus::Error
        )
    }
}

/// What one harness run produced for one test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_case_id: String,
    pub status: TestStatus,
    pub success: bool,
    pub error_message: Option<String>,
    pub outputs: IndexMap<String, OutputValue>,
    #[serde(with = "duration_millis")]
    pub execution_time: Duration,
    pub standard_output: String,
    pub standard_error: String,
    pub exit_code: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TestResult {
    pub fn pending(test_case_id: impl Into<String>) -> Self {
        TestResult {
            test_case_id: test_case_id.into(),
            status: TestStatus::Pending,
            success: false,
            error_message: None,
            outputs: IndexMap::new(),
            execution_time: Duration::ZERO,
            standard_output: String::new(),
            standard_error: String::new(),
            exit_code: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn mark_success(&mut self, outputs: IndexMap<String, OutputValue>) {
        self.status = TestStatus::Passed;
        self.success = true;
        self.outputs = outputs;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failure(
        &mut self,
        error: impl Into<String>,
        outputs: Option<IndexMap<String, OutputValue>>,
    ) {
        self.status = TestStatus::Failed;
        self.success = false;
        self.error_message = Some(error.into());
        if let Some(outputs) = outputs {
            self.outputs = outputs;
        }
        self.completed_at = Some(Utc::now());
    }

    /// Compilation failure, timeout, or other infrastructure fault.
    pub fn mark_error(&mut self, error: impl Into<String>) {
        self.status = TestStatus::Error;
        self.success = false;
        self.error_message = Some(error.into());
        self.completed_at = Some(Utc::now());
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_secs_f64() * 1000.0).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64((millis / 1000.0).max(0.0)))
    }
}

/// One differing (or tolerated) output between the C and C# runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDifference {
    pub variable_name: String,
    pub c_value: String,
    pub csharp_value: String,
    pub description: String,
    pub tolerance: Option<f64>,
    pub is_critical: bool,
}

impl fmt::Display for OutputDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: C={} vs C#={}{}",
            self.variable_name,
            self.c_value,
            self.csharp_value,
            if self.is_critical {
                ""
            } else {
                " (within tolerance)"
            }
        )
    }
}

/// Pairwise comparison verdict for one test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub test_case_id: String,
    pub is_match: bool,
    pub differences: Vec<OutputDifference>,
    pub total_outputs: usize,
    pub matching_outputs: usize,
    pub different_outputs: usize,
    pub validated_at: DateTime<Utc>,
}

impl ValidationResult {
    pub fn new(test_case_id: impl Into<String>) -> Self {
        ValidationResult {
            test_case_id: test_case_id.into(),
            is_match: false,
            differences: Vec::new(),
            total_outputs: 0,
            matching_outputs: 0,
            different_outputs: 0,
            validated_at: Utc::now(),
        }
    }

    pub fn match_percentage(&self) -> f64 {
        if self.total_outputs == 0 {
            0.0
        } else {
            self.matching_outputs as f64 / self.total_outputs as f64 * 100.0
        }
    }

    pub fn has_critical_differences(&self) -> bool {
        self.differences.iter().any(|d| d.is_critical)
    }

    pub fn summary(&self) -> String {
        if self.is_match {
            format!("all outputs match ({} values)", self.total_outputs)
        } else {
            let critical = self.differences.iter().filter(|d| d.is_critical).count();
            format!(
                "{} differences found ({critical} critical) out of {} outputs",
                self.differences.len(),
                self.total_outputs
            )
        }
    }
}

/// All test cases generated for one program (optionally one function).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSuite {
    pub program_id: String,
    pub function_name: Option<String>,
    pub test_cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(program_id: impl Into<String>, function_name: Option<String>) -> Self {
        TestSuite {
            program_id: program_id.into(),
            function_name,
            test_cases: Vec::new(),
        }
    }

    pub fn add(&mut self, test_case: TestCase) {
        self.test_cases.push(test_case);
    }

    pub fn by_id(&self, test_id: &str) -> Option<&TestCase> {
        self.test_cases.iter().find(|t| t.id == test_id)
    }

    pub fn len(&self) -> usize {
        self.test_cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test_cases.is_empty()
    }

    pub fn for_function<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TestCase> {
        self.test_cases.iter().filter(move |t| t.function_name == name)
    }
}
