//! Per-program conversion outcomes and the whole-run migration report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one program through the pipeline.
///
/// pending → in_progress → (success | failed) are the states the retry loop
/// drives; partial and skipped are recorded for programs the loop never
/// accepted or never attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Partial,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssueKind {
    SyntaxError,
    TypeMismatch,
    UnsupportedFeature,
    CompilationError,
    RuntimeError,
    TestFailure,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueSeverity::Error => write!(f, "ERROR"),
            IssueSeverity::Warning => write!(f, "WARNING"),
            IssueSeverity::Info => write!(f, "INFO"),
        }
    }
}

/// One problem surfaced while converting a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionIssue {
    pub kind: ConversionIssueKind,
    pub severity: IssueSeverity,
    pub message: String,
    pub source_location: Option<String>,
    pub line_number: Option<usize>,
    pub suggestion: Option<String>,
}

impl fmt::Display for ConversionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loc = match (&self.source_location, self.line_number) {
            (Some(l), Some(n)) => format!(" at {l}:{n}"),
            (Some(l), None) => format!(" at {l}"),
            _ => String::new(),
        };
        write!(f, "[{}]{loc}: {}", self.severity, self.message)
    }
}

/// Metrics collected for one program's conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionMetrics {
    pub lines_of_code_c: usize,
    pub lines_of_code_csharp: usize,
    pub functions_converted: usize,
    pub functions_total: usize,
    pub structs_converted: usize,
    pub structs_total: usize,
    pub tests_total: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub test_pass_rate: f64,
    pub parsing_time_seconds: f64,
    pub conversion_time_seconds: f64,
    pub testing_time_seconds: f64,
    pub total_time_seconds: f64,
}

impl ConversionMetrics {
    pub fn recompute_pass_rate(&mut self) {
        if self.tests_total > 0 {
            self.test_pass_rate = self.tests_passed as f64 / self.tests_total as f64 * 100.0;
        }
    }
}

/// Outcome of converting one program, including the produced C# code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub program_id: String,
    pub status: ConversionStatus,
    pub source_file: String,
    pub target_file: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub csharp_code: String,
    pub issues: Vec<ConversionIssue>,
    pub metrics: ConversionMetrics,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl ConversionResult {
    pub fn new(program_id: impl Into<String>, max_retries: u32) -> Self {
        ConversionResult {
            program_id: program_id.into(),
            status: ConversionStatus::Pending,
            source_file: String::new(),
            target_file: String::new(),
            csharp_code: String::new(),
            issues: Vec::new(),
            metrics: ConversionMetrics::default(),
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries,
        }
    }

    pub fn add_issue(
        &mut self,
        kind: ConversionIssueKind,
        severity: IssueSeverity,
        message: impl Into<String>,
    ) {
        self.issues.push(ConversionIssue {
            kind,
            severity,
            message: message.into(),
            source_location: None,
            line_number: None,
            suggestion: None,
        });
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .count()
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn mark_success(&mut self) {
        self.status = ConversionStatus::Success;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error_message: impl Into<String>) {
        self.status = ConversionStatus::Failed;
        self.add_issue(
            ConversionIssueKind::TestFailure,
            IssueSeverity::Error,
            error_message,
        );
        self.completed_at = Some(Utc::now());
    }

    pub fn summary(&self) -> String {
        let errors = self.error_count();
        let warnings = self.warning_count();
        let mut summary = if self.status == ConversionStatus::Success {
            let mut s = "conversion successful".to_string();
            if warnings > 0 {
                s.push_str(&format!(" ({warnings} warnings)"));
            }
            s
        } else {
            let mut s = format!("conversion failed: {errors} errors");
            if warnings > 0 {
                s.push_str(&format!(", {warnings} warnings"));
            }
            s
        };
        if self.metrics.test_pass_rate > 0.0 {
            summary.push_str(&format!(
                " | tests: {:.1}% passed",
                self.metrics.test_pass_rate
            ));
        }
        summary
    }
}

/// Aggregate over every program in a migration run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationReport {
    pub total_programs: usize,
    pub converted_programs: usize,
    pub failed_programs: usize,
    pub skipped_programs: usize,
    pub conversion_results: Vec<ConversionResult>,
    pub total_loc_c: usize,
    pub total_loc_csharp: usize,
    pub total_functions: usize,
    pub total_tests: usize,
    pub total_tests_passed: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_duration_seconds: f64,
}

impl MigrationReport {
    pub fn add_result(&mut self, result: ConversionResult) {
        self.total_loc_c += result.metrics.lines_of_code_c;
        self.total_loc_csharp += result.metrics.lines_of_code_csharp;
        self.total_functions += result.metrics.functions_total;
        self.total_tests += result.metrics.tests_total;
        self.total_tests_passed += result.metrics.tests_passed;
        match result.status {
            ConversionStatus::Success => self.converted_programs += 1,
            ConversionStatus::Failed => self.failed_programs += 1,
            ConversionStatus::Skipped => self.skipped_programs += 1,
            _ => {}
        }
        self.conversion_results.push(result);
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_programs == 0 {
            0.0
        } else {
            self.converted_programs as f64 / self.total_programs as f64 * 100.0
        }
    }

    pub fn test_pass_rate(&self) -> f64 {
        if self.total_tests == 0 {
            0.0
        } else {
            self.total_tests_passed as f64 / self.total_tests as f64 * 100.0
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Migration Summary\n\
             =================\n\
             Programs: {}/{} converted ({:.1}%)\n\
             Failed: {}\n\
             Functions: {}\n\
             Lines of Code: {} (C) -> {} (C#)\n\
             Tests: {}/{} passed ({:.1}%)\n\
             Duration: {:.2} seconds",
            self.converted_programs,
            self.total_programs,
            self.success_rate(),
            self.failed_programs,
            self.total_functions,
            self.total_loc_c,
            self.total_loc_csharp,
            self.total_tests_passed,
            self.total_tests,
            self.test_pass_rate(),
            self.total_duration_seconds,
        )
    }
}
