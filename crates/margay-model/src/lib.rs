//! Source model for the margay migration pipeline.
//!
//! Passive value containers shared by every pipeline stage: the parsed C
//! program and its parts, generated test cases and their results, output
//! comparisons, and the per-program / whole-run conversion reports.
//!
//! Entities are created by the analyzer and the generators, mutated only by
//! their owning component, and observed read-only everywhere else.

pub mod conversion;
pub mod program;
pub mod test_case;
pub mod value;

pub use conversion::{
    ConversionIssue, ConversionIssueKind, ConversionMetrics, ConversionResult, ConversionStatus,
    IssueSeverity, MigrationReport,
};
pub use program::{
    CDefine, CEnum, CFunction, CInclude, CProgram, CStruct, CVariable,
};
pub use test_case::{
    OutputDifference, TestCase, TestCategory, TestResult, TestStatus, TestSuite, ValidationResult,
};
pub use value::{CValue, OutputValue};
