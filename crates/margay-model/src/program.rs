//! Parsed representation of a C translation unit.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A variable, struct member, or function parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CVariable {
    pub name: String,
    /// Base type token with pointer stars stripped (`int`, `unsigned char`, ...).
    pub data_type: String,
    pub pointer_level: u32,
    pub is_const: bool,
    pub is_static: bool,
    pub is_extern: bool,
    pub initial_value: Option<String>,
    pub array_size: Option<usize>,
    pub struct_name: Option<String>,
    pub line_number: usize,
}

impl CVariable {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        CVariable {
            name: name.into(),
            data_type: data_type.into(),
            ..CVariable::default()
        }
    }

    pub fn with_pointer_level(mut self, level: u32) -> Self {
        self.pointer_level = level;
        self
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer_level > 0
    }

    /// Type token with pointer stars re-attached (`int**`).
    pub fn full_type(&self) -> String {
        let stars = "*".repeat(self.pointer_level as usize);
        format!("{}{stars}", self.data_type)
    }
}

/// A function definition, with its raw body text retained for translation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CFunction {
    pub name: String,
    pub return_type: String,
    pub parameters: Vec<CVariable>,
    /// Full definition text, braces included.
    pub body: String,
    pub is_static: bool,
    pub is_inline: bool,
    pub called_functions: Vec<String>,
    pub line_start: usize,
    pub line_end: usize,
    /// Cyclomatic estimate: 1 + branch tokens in the body.
    pub complexity: u32,
}

impl CFunction {
    pub fn returns_void(&self) -> bool {
        self.return_type.eq_ignore_ascii_case("void")
    }

    pub fn parameter(&self, name: &str) -> Option<&CVariable> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CStruct {
    pub name: String,
    pub members: Vec<CVariable>,
    pub is_typedef: bool,
    pub line_number: usize,
}

/// Enum values keep declaration order; implicit values auto-increment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CEnum {
    pub name: String,
    pub values: IndexMap<String, i64>,
    pub line_number: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CDefine {
    pub name: String,
    pub value: String,
    pub is_function_macro: bool,
    pub parameters: Vec<String>,
    pub line_number: usize,
}

/// `#include` directive, split by delimiter style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CInclude {
    pub file_name: String,
    /// `<...>` includes are system headers; `"..."` are project headers.
    pub is_system: bool,
    pub line_number: usize,
}

impl CInclude {
    pub fn system(file_name: impl Into<String>) -> Self {
        CInclude {
            file_name: file_name.into(),
            is_system: true,
            line_number: 0,
        }
    }

    pub fn user(file_name: impl Into<String>) -> Self {
        CInclude {
            file_name: file_name.into(),
            is_system: false,
            line_number: 0,
        }
    }
}

/// One C translation unit as seen by the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CProgram {
    /// Stable identifier: the file stem.
    pub program_id: String,
    pub file_path: String,
    pub source_code: String,

    pub includes: Vec<CInclude>,
    pub defines: Vec<CDefine>,
    pub variables: Vec<CVariable>,
    pub functions: Vec<CFunction>,
    pub structs: Vec<CStruct>,
    pub enums: Vec<CEnum>,

    /// Program ids of other translation units this one includes.
    pub dependencies: Vec<String>,

    pub is_converted: bool,
    pub lines_of_code: usize,
    pub complexity_score: f64,
}

impl CProgram {
    pub fn function(&self, name: &str) -> Option<&CFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn struct_by_name(&self, name: &str) -> Option<&CStruct> {
        self.structs.iter().find(|s| s.name == name)
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn user_includes(&self) -> impl Iterator<Item = &CInclude> {
        self.includes.iter().filter(|i| !i.is_system)
    }

    pub fn system_includes(&self) -> impl Iterator<Item = &CInclude> {
        self.includes.iter().filter(|i| i.is_system)
    }

    /// Average per-function cyclomatic complexity, recorded on the program.
    pub fn recompute_complexity(&mut self) -> f64 {
        let total: u32 = self.functions.iter().map(|f| f.complexity).sum();
        self.complexity_score = f64::from(total) / self.functions.len().max(1) as f64;
        self.complexity_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_function_program() -> CProgram {
        CProgram {
            program_id: "math_utils".to_string(),
            functions: vec![
                CFunction {
                    name: "add".to_string(),
                    return_type: "int".to_string(),
                    complexity: 1,
                    ..CFunction::default()
                },
                CFunction {
                    name: "clamp".to_string(),
                    return_type: "int".to_string(),
                    complexity: 3,
                    ..CFunction::default()
                },
            ],
            ..CProgram::default()
        }
    }

    #[test]
    fn pointer_flag_tracks_level() {
        let scalar = CVariable::new("a", "int");
        let ptr = CVariable::new("p", "int").with_pointer_level(2);
        assert!(!scalar.is_pointer());
        assert!(ptr.is_pointer());
        assert_eq!(ptr.full_type(), "int**");
    }

    #[test]
    fn function_lookup_by_name() {
        let program = two_function_program();
        assert!(program.function("clamp").is_some());
        assert!(program.function("missing").is_none());
        assert_eq!(program.function_names(), vec!["add", "clamp"]);
    }

    #[test]
    fn complexity_averages_over_functions() {
        let mut program = two_function_program();
        assert_eq!(program.recompute_complexity(), 2.0);
    }

    #[test]
    fn complexity_of_empty_program_is_zero() {
        let mut program = CProgram::default();
        assert_eq!(program.recompute_complexity(), 0.0);
    }

    #[test]
    fn include_partition() {
        let program = CProgram {
            includes: vec![CInclude::system("stdio.h"), CInclude::user("util.h")],
            ..CProgram::default()
        };
        assert_eq!(program.system_includes().count(), 1);
        assert_eq!(
            program.user_includes().next().unwrap().file_name,
            "util.h"
        );
    }

    #[test]
    fn void_return_detection() {
        let f = CFunction {
            return_type: "void".to_string(),
            ..CFunction::default()
        };
        assert!(f.returns_void());
    }
}
