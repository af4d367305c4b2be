//! C test harness emission.
//!
//! The harness is a standalone translation unit linked against the
//! `main`-stripped original: forward prototypes for every tested function,
//! then a `main` that declares each test's inputs as locals, invokes the
//! function, and prints one protocol line per test.

use std::collections::BTreeSet;

use margay_model::{CFunction, CProgram, TestSuite};

/// `printf` conversion for a return type. Floating returns use `%f` so the
/// printed literal always carries a `.` and parses back as a float.
fn printf_format(return_type: &str) -> (&'static str, Option<&'static str>) {
    let lower = return_type.to_ascii_lowercase();
    let unsigned = lower.contains("unsigned");
    if lower.contains("float") || lower.contains("double") {
        ("%f", Some("double"))
    } else if lower.contains("long") && unsigned {
        ("%lu", None)
    } else if lower.contains("long") {
        ("%ld", None)
    } else if unsigned {
        ("%u", None)
    } else {
        ("%d", None)
    }
}

fn prototype_of(func: &CFunction) -> String {
    let params = if func.parameters.is_empty() {
        "void".to_string()
    } else {
        func.parameters
            .iter()
            .map(|p| format!("{} {}", p.full_type(), p.name))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("{} {}({});", func.return_type, func.name, params)
}

/// Emit the C harness for a test suite.
pub fn emit_c_harness(program: &CProgram, suite: &TestSuite) -> String {
    let mut lines: Vec<String> = vec![
        "#include <stdio.h>".to_string(),
        "#include <stdlib.h>".to_string(),
        "#include <string.h>".to_string(),
        "#include <math.h>".to_string(),
        String::new(),
        format!("/* Functions under test from {} */", program.file_path),
    ];

    let mut declared: BTreeSet<&str> = BTreeSet::new();
    for test_case in &suite.test_cases {
        let Some(func) = program.function(&test_case.function_name) else {
            continue;
        };
        if func.name != "main" && declared.insert(func.name.as_str()) {
            lines.push(prototype_of(func));
        }
    }
    lines.push(String::new());

    lines.push("int main(void) {".to_string());
    lines.push("    int passed = 0;".to_string());
    lines.push("    int failed = 0;".to_string());
    lines.push(String::new());

    for test_case in &suite.test_cases {
        let Some(func) = program.function(&test_case.function_name) else {
            tracing::warn!(
                function = %test_case.function_name,
                "function not found in program, skipping test case"
            );
            continue;
        };

        lines.push(format!("    /* Test: {} */", test_case.name));
        lines.push("    {".to_string());

        for (param_name, value) in &test_case.inputs {
            if let Some(param) = func.parameter(param_name) {
                lines.push(format!(
                    "        {} {param_name} = {};",
                    param.full_type(),
                    value.to_c_literal()
                ));
            }
        }

        let args: Vec<&str> = test_case.inputs.keys().map(String::as_str).collect();
        let call_args = args.join(", ");
        if func.returns_void() {
            lines.push(format!("        {}({call_args});", func.name));
            lines.push(format!(
                "        printf(\"Test {}: completed\\n\");",
                test_case.name
            ));
        } else {
            let (format_spec, cast) = printf_format(&func.return_type);
            lines.push(format!(
                "        {} result = {}({call_args});",
                func.return_type, func.name
            ));
            let rendered = match cast {
                Some(cast) => format!("({cast})result"),
                None => "result".to_string(),
            };
            lines.push(format!(
                "        printf(\"Test {}: result = {format_spec}\\n\", {rendered});",
                test_case.name
            ));
        }
        lines.push("        passed++;".to_string());
        lines.push("    }".to_string());
        lines.push(String::new());
    }

    lines.push("    printf(\"\\n=== Test Summary ===\\n\");".to_string());
    lines.push("    printf(\"Passed: %d\\n\", passed);".to_string());
    lines.push("    printf(\"Failed: %d\\n\", failed);".to_string());
    lines.push("    return 0;".to_string());
    lines.push("}".to_string());
    lines.join("\n")
}
