//! Compile-and-run of the translated C# against the same test suite.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use indexmap::IndexMap;

use margay_model::{CProgram, CValue, TestResult, TestSuite};

use crate::exec::{probe_tool, run_with_timeout, ExecError};
use crate::normalize::normalize_csharp_code;
use crate::protocol::{mark_all_error, parse_harness_output, HarnessOutput};
use crate::RunnerError;

const BUILD_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs translated code inside a reusable dotnet console project.
///
/// The project is created once (`dotnet new console --force`) and reused on
/// later runs; only the two `.cs` files are rewritten per attempt.
pub struct CSharpTestRunner {
    dotnet_path: String,
    project_dir: PathBuf,
    run_timeout: Duration,
}

impl CSharpTestRunner {
    pub fn new(project_dir: PathBuf, run_timeout_secs: u64) -> Self {
        CSharpTestRunner {
            dotnet_path: "dotnet".to_string(),
            project_dir,
            run_timeout: Duration::from_secs(run_timeout_secs),
        }
    }

    pub fn with_dotnet_path(mut self, path: impl Into<String>) -> Self {
        self.dotnet_path = path.into();
        self
    }

    pub fn verify_compiler(&self) -> bool {
        let found = probe_tool(&self.dotnet_path, "--version");
        if found {
            tracing::info!(compiler = %self.dotnet_path, "C# toolchain found");
        } else {
            tracing::error!(compiler = %self.dotnet_path, "C# toolchain not found");
        }
        found
    }

    /// Create the console project on first use; reuse it afterwards.
    fn ensure_project(&self) -> Result<(), RunnerError> {
        let has_project = std::fs::read_dir(&self.project_dir)
            .map(|entries| {
                entries.flatten().any(|e| {
                    e.path().extension().and_then(|x| x.to_str()) == Some("csproj")
                })
            })
            .unwrap_or(false);
        if has_project {
            tracing::debug!(dir = %self.project_dir.display(), "reusing existing dotnet project");
            return Ok(());
        }

        std::fs::create_dir_all(&self.project_dir).map_err(|source| RunnerError::Io {
            path: self.project_dir.clone(),
            source,
        })?;

        let mut command = Command::new(&self.dotnet_path);
        command
            .args(["new", "console", "--force", "--output"])
            .arg(&self.project_dir);
        tracing::info!(dir = %self.project_dir.display(), "creating dotnet console project");
        let output = run_with_timeout(&mut command, BUILD_TIMEOUT)?;
        if !output.success() {
            return Err(RunnerError::Project {
                path: self.project_dir.clone(),
                message: output.stderr,
            });
        }

        // the console template ships a Main; ours lives in the harness
        let template_main = self.project_dir.join("Program.cs");
        if template_main.exists() {
            let _ = std::fs::remove_file(template_main);
        }
        Ok(())
    }

    fn write_sources(&self, harness_code: &str, converted_code: &str) -> Result<(), RunnerError> {
        if let Ok(entries) = std::fs::read_dir(&self.project_dir) {
            for entry in entries.flatten() {
                if entry.path().extension().and_then(|x| x.to_str()) == Some("cs") {
                    let _ = std::fs::remove_file(entry.path());
                }
            }
        }
        for (name, content) in [
            ("Program.cs", harness_code),
            ("ConvertedCode.cs", converted_code),
        ] {
            let path = self.project_dir.join(name);
            std::fs::write(&path, content).map_err(|source| RunnerError::Io { path, source })?;
        }
        Ok(())
    }

    fn build(&self) -> Result<(), RunnerError> {
        let mut command = Command::new(&self.dotnet_path);
        command.arg("build").current_dir(&self.project_dir);
        let output = run_with_timeout(&mut command, BUILD_TIMEOUT)?;
        if output.success() {
            Ok(())
        } else {
            Err(RunnerError::Compile(format!(
                "{}\n{}",
                output.stdout, output.stderr
            )))
        }
    }

    /// Normalize, materialize, build, run, and parse.
    pub fn run_tests(
        &self,
        program: &CProgram,
        suite: &TestSuite,
        csharp_code: &str,
        harness_code: &str,
    ) -> IndexMap<String, TestResult> {
        let converted = normalize_csharp_code(csharp_code, "ConvertedCode");

        if let Err(e) = self.ensure_project() {
            tracing::error!(error = %e, "failed to prepare dotnet project");
            return mark_all_error(suite, "C# compilation failed");
        }
        if let Err(e) = self.write_sources(harness_code, &converted) {
            return mark_all_error(suite, &format!("failed to write sources: {e}"));
        }

        if let Err(e) = self.build() {
            tracing::error!(program_id = %program.program_id, error = %e, "C# compilation failed");
            return mark_all_error(suite, "C# compilation failed");
        }

        tracing::info!(program_id = %program.program_id, tests = suite.len(), "running C# tests");
        let mut command = Command::new(&self.dotnet_path);
        command
            .args(["run", "--no-build", "--project"])
            .arg(&self.project_dir);
        match run_with_timeout(&mut command, self.run_timeout) {
            Ok(output) => parse_harness_output(
                suite,
                &HarnessOutput {
                    stdout: output.stdout,
                    stderr: output.stderr,
                    exit_code: output.exit_code,
                    duration: output.duration,
                },
            ),
            Err(ExecError::Timeout { timeout, .. }) => {
                tracing::error!(program_id = %program.program_id, "C# test execution timeout");
                mark_all_error(
                    suite,
                    &format!("C# execution timeout ({}s)", timeout.as_secs()),
                )
            }
            Err(e) => mark_all_error(suite, &format!("C# execution error: {e}")),
        }
    }

    /// Emit the C# harness: a `Program` class whose `Main` calls each tested
    /// method on `ConvertedCode` and prints the protocol lines.
    pub fn generate_harness(&self, program: &CProgram, suite: &TestSuite) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.push("using System;".to_string());
        lines.push(String::new());
        lines.push("public class Program".to_string());
        lines.push("{".to_string());
        lines.push("    public static void Main(string[] args)".to_string());
        lines.push("    {".to_string());
        lines.push("        int passed = 0;".to_string());
        lines.push("        int failed = 0;".to_string());
        lines.push(String::new());

        for test_case in &suite.test_cases {
            let Some(func) = program.function(&test_case.function_name) else {
                tracing::warn!(
                    function = %test_case.function_name,
                    "function not found in program, skipping test case"
                );
                continue;
            };

            lines.push(format!("        // Test: {}", test_case.name));
            lines.push("        try".to_string());
            lines.push("        {".to_string());

            for (param_name, value) in &test_case.inputs {
                if let Some(param) = func.parameter(param_name) {
                    let cs_type = csharp_type(&param.data_type, param.pointer_level);
                    let literal = csharp_literal(&cs_type, value);
                    lines.push(format!("            {cs_type} {param_name} = {literal};"));
                }
            }

            let args: Vec<&str> = test_case.inputs.keys().map(String::as_str).collect();
            let call_args = args.join(", ");
            if func.returns_void() {
                lines.push(format!(
                    "            ConvertedCode.{}({call_args});",
                    func.name
                ));
                lines.push(format!(
                    "            Console.WriteLine(\"Test {}: completed\");",
                    test_case.name
                ));
            } else {
                let ret_type = csharp_type(&func.return_type, 0);
                lines.push(format!(
                    "            {ret_type} result = ConvertedCode.{}({call_args});",
                    func.name
                ));
                lines.push(format!(
                    "            Console.WriteLine(\"Test {}: result = \" + result);",
                    test_case.name
                ));
            }
            lines.push("            passed++;".to_string());
            lines.push("        }".to_string());
            lines.push("        catch (Exception ex)".to_string());
            lines.push("        {".to_string());
            lines.push(format!(
                "            Console.WriteLine(\"Test {}: ERROR - \" + ex.Message);",
                test_case.name
            ));
            lines.push("            failed++;".to_string());
            lines.push("        }".to_string());
            lines.push(String::new());
        }

        lines.push("        Console.WriteLine(\"\\n=== Test Summary ===\");".to_string());
        lines.push("        Console.WriteLine(\"Passed: \" + passed);".to_string());
        lines.push("        Console.WriteLine(\"Failed: \" + failed);".to_string());
        lines.push("    }".to_string());
        lines.push("}".to_string());
        lines.join("\n")
    }
}

/// Scalar C type to the C# type the harness declares.
fn csharp_type(data_type: &str, pointer_level: u32) -> String {
    if pointer_level > 0 {
        return "IntPtr".to_string();
    }
    match data_type.to_ascii_lowercase().as_str() {
        "int" | "signed int" => "int",
        "long" | "long int" | "long long" => "long",
        "short" | "short int" => "short",
        "char" => "sbyte",
        "unsigned int" | "unsigned" => "uint",
        "unsigned long" | "unsigned long long" => "ulong",
        "unsigned short" => "ushort",
        "unsigned char" => "byte",
        "float" => "float",
        "double" | "long double" => "double",
        "void" => "void",
        "size_t" => "ulong",
        "_bool" | "bool" => "bool",
        other => return other.to_string(),
    }
    .to_string()
}

/// Literal rendering aware of the declared C# type (`float` needs a suffix
/// and its own infinity constants).
fn csharp_literal(cs_type: &str, value: &CValue) -> String {
    match (cs_type, value) {
        ("IntPtr", CValue::Null) => "IntPtr.Zero".to_string(),
        ("float", CValue::Float(f)) if f.is_infinite() => {
            if *f > 0.0 {
                "float.PositiveInfinity".to_string()
            } else {
                "float.NegativeInfinity".to_string()
            }
        }
        ("float", CValue::Float(_)) => format!("{}f", value.to_csharp_literal()),
        _ => value.to_csharp_literal(),
    }
}
