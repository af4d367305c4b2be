//! Driver for the external symbolic-execution engine (KLEE).
//!
//! Per function: emit a harness that declares every parameter (pointer
//! parameters get a small typed buffer), mark the memory symbolic, call the
//! function once, compile harness and `main`-stripped source to LLVM
//! bitcode, link, run the engine under a time/test budget, and decode its
//! per-path artifacts back into typed inputs via the companion dumper tool.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use indexmap::IndexMap;
use thiserror::Error;

use margay_analyzer::strip_main;
use margay_model::{CFunction, CProgram, CValue};
use margay_runner::exec::{probe_tool, run_with_timeout, ExecError};

#[derive(Debug, Error)]
pub enum SymbolicError {
    #[error("symbolic engine `{0}` is not available")]
    Unavailable(String),
    #[error("harness compilation failed: {0}")]
    Compile(String),
    #[error("bitcode linking failed: {0}")]
    Link(String),
    #[error("engine produced no output directory")]
    NoOutput,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Tool paths and budgets for one engine invocation.
#[derive(Debug, Clone)]
pub struct SymbolicConfig {
    pub clang_path: String,
    pub engine_path: String,
    pub dumper_path: String,
    pub linker_path: String,
    /// `--max-time` budget handed to the engine, in seconds.
    pub max_time_secs: u64,
    /// `--max-tests` budget handed to the engine.
    pub max_tests: usize,
    /// Elements allocated for each pointer parameter's backing buffer.
    pub pointer_buffer_len: usize,
    pub extra_clang_args: Vec<String>,
    pub extra_engine_args: Vec<String>,
}

impl Default for SymbolicConfig {
    fn default() -> Self {
        fn env_or(key: &str, default: &str) -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        }
        SymbolicConfig {
            clang_path: env_or("MARGAY_CLANG", "clang"),
            engine_path: env_or("MARGAY_KLEE", "klee"),
            dumper_path: env_or("MARGAY_KTEST_TOOL", "ktest-tool"),
            linker_path: env_or("MARGAY_LLVM_LINK", "llvm-link"),
            max_time_secs: 60,
            max_tests: 100,
            pointer_buffer_len: 8,
            extra_clang_args: Vec::new(),
            extra_engine_args: Vec::new(),
        }
    }
}

/// One path artifact decoded to typed inputs.
#[derive(Debug, Clone)]
pub struct SymbolicTestCase {
    pub test_id: usize,
    pub inputs: IndexMap<String, CValue>,
}

pub struct SymbolicEngine {
    config: SymbolicConfig,
}

const COMPILE_TIMEOUT: Duration = Duration::from_secs(30);

impl SymbolicEngine {
    pub fn new(config: SymbolicConfig) -> Self {
        SymbolicEngine { config }
    }

    pub fn config(&self) -> &SymbolicConfig {
        &self.config
    }

    /// Probe the engine for `--version`.
    pub fn is_available(&self) -> bool {
        let available = probe_tool(&self.config.engine_path, "--version");
        if !available {
            tracing::warn!(engine = %self.config.engine_path, "symbolic engine not found");
        }
        available
    }

    /// Generate inputs for one function by exploring its paths.
    pub fn generate(
        &self,
        function: &CFunction,
        program: &CProgram,
    ) -> Result<Vec<SymbolicTestCase>, SymbolicError> {
        if !self.is_available() {
            return Err(SymbolicError::Unavailable(self.config.engine_path.clone()));
        }

        let work_dir = tempfile::tempdir()?;
        tracing::debug!(dir = %work_dir.path().display(), "symbolic work directory");

        let harness_file = work_dir.path().join("harness.c");
        let source_file = work_dir.path().join("orig.c");
        std::fs::write(&harness_file, self.emit_harness(function, program))?;
        std::fs::write(&source_file, strip_main(&program.source_code))?;

        let include_dirs = user_include_dirs(program);
        let bitcode = self.compile_and_link(work_dir.path(), &harness_file, &source_file, &include_dirs)?;
        let output_dir = self.run_engine(work_dir.path(), &bitcode)?;
        let cases = self.parse_artifacts(&output_dir, function)?;

        tracing::info!(
            function = %function.name,
            cases = cases.len(),
            "symbolic engine produced test cases"
        );
        Ok(cases)
    }

    /// Harness: declare, bind buffers for pointers, mark symbolic, call once.
    pub fn emit_harness(&self, function: &CFunction, program: &CProgram) -> String {
        let buffer_len = self.config.pointer_buffer_len;
        let mut lines: Vec<String> = vec![
            "#include <klee/klee.h>".to_string(),
            "#include <assert.h>".to_string(),
            "#include <stdio.h>".to_string(),
            "#include <stdlib.h>".to_string(),
            String::new(),
        ];

        for include in program.user_includes() {
            lines.push(format!("#include \"{}\"", include.file_name));
        }
        if program.user_includes().next().is_some() {
            lines.push(String::new());
        }

        let param_decls = function
            .parameters
            .iter()
            .map(|p| format!("{} {}", p.full_type(), p.name))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!(
            "{} {}({});",
            function.return_type, function.name, param_decls
        ));
        lines.push(String::new());

        lines.push("int main(void) {".to_string());
        for param in &function.parameters {
            if param.is_pointer() {
                let buf = format!("{}_buf", param.name);
                lines.push(format!("    {} {buf}[{buffer_len}];", param.data_type));
                lines.push(format!(
                    "    {} {} = ({}){buf};",
                    param.full_type(),
                    param.name,
                    param.full_type()
                ));
            } else {
                lines.push(format!("    {} {};", param.full_type(), param.name));
            }
        }
        lines.push(String::new());

        for param in &function.parameters {
            if param.is_pointer() {
                lines.push(format!(
                    "    klee_make_symbolic({}, sizeof(*{}) * {buffer_len}, \"{}\");",
                    param.name, param.name, param.name
                ));
            } else {
                lines.push(format!(
                    "    klee_make_symbolic(&{}, sizeof({}), \"{}\");",
                    param.name, param.name, param.name
                ));
            }
        }
        lines.push(String::new());

        let call_args = function
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if function.returns_void() {
            lines.push(format!("    {}({call_args});", function.name));
        } else {
            lines.push(format!(
                "    {} result = {}({call_args});",
                function.return_type, function.name
            ));
            lines.push("    (void)result;".to_string());
        }
        lines.push("    return 0;".to_string());
        lines.push("}".to_string());
        lines.join("\n")
    }

    fn compile_and_link(
        &self,
        work_dir: &Path,
        harness: &Path,
        source: &Path,
        include_dirs: &[String],
    ) -> Result<PathBuf, SymbolicError> {
        let harness_bc = work_dir.join("harness.bc");
        let source_bc = work_dir.join("orig.bc");
        let combined = work_dir.join("combined.bc");

        for (input, output) in [(harness, &harness_bc), (source, &source_bc)] {
            let mut command = Command::new(&self.config.clang_path);
            command.args([
                "-emit-llvm",
                "-c",
                "-g",
                "-O0",
                "-Xclang",
                "-disable-O0-optnone",
            ]);
            for dir in include_dirs {
                command.arg("-I").arg(dir);
            }
            command.args(&self.config.extra_clang_args);
            command.arg(input).arg("-o").arg(output);

            let result = run_with_timeout(&mut command, COMPILE_TIMEOUT)?;
            if !result.success() {
                return Err(SymbolicError::Compile(result.stderr));
            }
        }

        let mut link = Command::new(&self.config.linker_path);
        link.arg(&harness_bc)
            .arg(&source_bc)
            .arg("-o")
            .arg(&combined);
        let result = run_with_timeout(&mut link, COMPILE_TIMEOUT)?;
        if !result.success() {
            return Err(SymbolicError::Link(result.stderr));
        }
        Ok(combined)
    }

    fn run_engine(&self, work_dir: &Path, bitcode: &Path) -> Result<PathBuf, SymbolicError> {
        let mut command = Command::new(&self.config.engine_path);
        command
            .arg("--optimize")
            .arg("--max-time")
            .arg(self.config.max_time_secs.to_string())
            .arg("--max-tests")
            .arg(self.config.max_tests.to_string())
            .arg("--libc=uclibc")
            .arg("--posix-runtime");
        command.args(&self.config.extra_engine_args);
        // relative path with cwd pinned: some engine installs resolve
        // output directories against the working directory
        command.arg(bitcode.file_name().unwrap_or(bitcode.as_os_str()));
        command.current_dir(work_dir);

        let budget = Duration::from_secs(self.config.max_time_secs + 10);
        match run_with_timeout(&mut command, budget) {
            Ok(output) => {
                tracing::debug!(exit = ?output.exit_code, "engine finished");
            }
            Err(ExecError::Timeout { .. }) => {
                // partial results are still worth parsing
                tracing::warn!(
                    budget_secs = self.config.max_time_secs,
                    "engine hit its time budget, collecting partial artifacts"
                );
            }
            Err(e) => return Err(e.into()),
        }

        latest_output_dir(work_dir).ok_or(SymbolicError::NoOutput)
    }

    fn parse_artifacts(
        &self,
        output_dir: &Path,
        function: &CFunction,
    ) -> Result<Vec<SymbolicTestCase>, SymbolicError> {
        let mut artifact_files: Vec<PathBuf> = std::fs::read_dir(output_dir)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("ktest"))
            .collect();
        artifact_files.sort();

        let mut cases = Vec::new();
        for (idx, file) in artifact_files.iter().enumerate() {
            let mut command = Command::new(&self.config.dumper_path);
            command.arg(file);
            let output = match run_with_timeout(&mut command, Duration::from_secs(5)) {
                Ok(out) if out.success() => out,
                Ok(_) | Err(_) => {
                    tracing::warn!(file = %file.display(), "failed to decode artifact, skipping");
                    continue;
                }
            };
            let inputs = parse_dumper_output(&output.stdout, function);
            if !inputs.is_empty() {
                cases.push(SymbolicTestCase {
                    test_id: idx + 1,
                    inputs,
                });
            }
        }
        Ok(cases)
    }
}

fn latest_output_dir(work_dir: &Path) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(work_dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("klee-out-"))
                    .unwrap_or(false)
        })
        .collect();
    dirs.sort();
    dirs.pop()
}

/// Directories of user includes, for `-I` flags.
fn user_include_dirs(program: &CProgram) -> Vec<String> {
    let mut dirs: Vec<String> = Vec::new();
    for include in program.user_includes() {
        if let Some(idx) = include.file_name.rfind('/') {
            let dir = include.file_name[..idx].to_string();
            if !dir.is_empty() && !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
    }
    dirs
}

/// Decode the dumper's text dump into typed inputs.
///
/// Every dump line is prefixed `object N:`; per object the `name:` line
/// quotes the parameter and the `hex :` line carries the raw little-endian
/// bytes. Only the `name:` line updates the tracked object, so the
/// intervening `size:`/`data:` lines cannot clobber it before the hex line
/// arrives.
pub fn parse_dumper_output(text: &str, function: &CFunction) -> IndexMap<String, CValue> {
    let mut inputs = IndexMap::new();
    let mut current_object: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.contains(": name:") {
            current_object = line.split('\'').nth(1).map(str::to_string);
            continue;
        }
        let Some(pos) = line.find(": hex") else {
            continue;
        };
        let Some(object) = current_object.take() else {
            continue;
        };
        let hex_part = line[pos + ": hex".len()..]
            .trim_start()
            .trim_start_matches(':')
            .trim();
        let hex: String = hex_part
            .trim_start_matches("0x")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if let Some(param) = function.parameter(&object) {
            inputs.insert(object, hex_to_value(&hex, &param.data_type));
        }
    }
    inputs
}

/// Map hex bytes to a typed value using standard little-endian widths
/// (char=1, short=2, int=4, long=8, float=4, double=8). Unknown types fall
/// back to integer.
pub fn hex_to_value(hex: &str, data_type: &str) -> CValue {
    let bytes = match decode_hex(hex) {
        Some(bytes) => bytes,
        None => return CValue::Int(0),
    };
    let lower = data_type.to_ascii_lowercase();
    let unsigned = lower.contains("unsigned");

    let take = |n: usize| -> Option<&[u8]> {
        if bytes.len() >= n {
            Some(&bytes[..n])
        } else {
            None
        }
    };

    if lower.contains("double") {
        return take(8)
            .map(|b| CValue::Float(f64::from_le_bytes(b.try_into().unwrap_or([0; 8]))))
            .unwrap_or(CValue::Float(0.0));
    }
    if lower.contains("float") {
        return take(4)
            .map(|b| {
                CValue::Float(f64::from(f32::from_le_bytes(b.try_into().unwrap_or([0; 4]))))
            })
            .unwrap_or(CValue::Float(0.0));
    }
    if lower.contains("char") {
        return match take(1) {
            Some(b) if unsigned => CValue::UInt(u64::from(b[0])),
            Some(b) => CValue::Int(i64::from(b[0] as i8)),
            None => CValue::Int(0),
        };
    }
    if lower.contains("short") {
        return match take(2) {
            Some(b) if unsigned => {
                CValue::UInt(u64::from(u16::from_le_bytes(b.try_into().unwrap_or([0; 2]))))
            }
            Some(b) => CValue::Int(i64::from(i16::from_le_bytes(b.try_into().unwrap_or([0; 2])))),
            None => CValue::Int(0),
        };
    }
    if lower.contains("long") {
        return match take(8) {
            Some(b) if unsigned => {
                CValue::UInt(u64::from_le_bytes(b.try_into().unwrap_or([0; 8])))
            }
            Some(b) => CValue::Int(i64::from_le_bytes(b.try_into().unwrap_or([0; 8]))),
            None => CValue::Int(0),
        };
    }
    if lower.contains("int") {
        return match take(4) {
            Some(b) if unsigned => {
                CValue::UInt(u64::from(u32::from_le_bytes(b.try_into().unwrap_or([0; 4]))))
            }
            Some(b) => CValue::Int(i64::from(i32::from_le_bytes(b.try_into().unwrap_or([0; 4])))),
            None => CValue::Int(0),
        };
    }
    // unknown type: whole buffer as an integer
    let mut value: u64 = 0;
    for (i, byte) in bytes.iter().take(8).enumerate() {
        value |= u64::from(*byte) << (8 * i);
    }
    CValue::Int(value as i64)
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use margay_model::CVariable;

    fn function_with(params: Vec<CVariable>) -> CFunction {
        CFunction {
            name: "probe".to_string(),
            return_type: "int".to_string(),
            parameters: params,
            ..CFunction::default()
        }
    }

    // ---------------------------------------------------------------
    // Harness emission
    // ---------------------------------------------------------------

    #[test]
    fn scalar_parameters_are_declared_and_marked_symbolic() {
        let engine = SymbolicEngine::new(SymbolicConfig::default());
        let function = function_with(vec![CVariable::new("a", "int")]);
        let program = CProgram {
            source_code: "int probe(int a) { return a; }".to_string(),
            ..CProgram::default()
        };
        let harness = engine.emit_harness(&function, &program);
        assert!(harness.contains("#include <klee/klee.h>"));
        assert!(harness.contains("int probe(int a);"));
        assert!(harness.contains("    int a;"));
        assert!(harness.contains("klee_make_symbolic(&a, sizeof(a), \"a\");"));
        assert!(harness.contains("int result = probe(a);"));
    }

    #[test]
    fn pointer_parameters_bind_a_typed_buffer() {
        let engine = SymbolicEngine::new(SymbolicConfig::default());
        let function = function_with(vec![CVariable::new("data", "int").with_pointer_level(1)]);
        let program = CProgram::default();
        let harness = engine.emit_harness(&function, &program);
        assert!(harness.contains("int data_buf[8];"));
        assert!(harness.contains("int* data = (int*)data_buf;"));
        assert!(harness.contains("klee_make_symbolic(data, sizeof(*data) * 8, \"data\");"));
    }

    #[test]
    fn buffer_length_is_configurable() {
        let config = SymbolicConfig {
            pointer_buffer_len: 32,
            ..SymbolicConfig::default()
        };
        let engine = SymbolicEngine::new(config);
        let function = function_with(vec![CVariable::new("data", "char").with_pointer_level(1)]);
        let harness = engine.emit_harness(&function, &CProgram::default());
        assert!(harness.contains("char data_buf[32];"));
        assert!(harness.contains("sizeof(*data) * 32"));
    }

    #[test]
    fn void_functions_call_without_binding_result() {
        let engine = SymbolicEngine::new(SymbolicConfig::default());
        let mut function = function_with(vec![]);
        function.return_type = "void".to_string();
        let harness = engine.emit_harness(&function, &CProgram::default());
        assert!(harness.contains("    probe();"));
        assert!(!harness.contains("result"));
    }

    // ---------------------------------------------------------------
    // Artifact decoding
    // ---------------------------------------------------------------

    const DUMP: &str = "\
ktest file : 'test000001.ktest'
args       : ['combined.bc']
num objects: 2
object 0: name: 'a'
object 0: size: 4
object 0: data: b'\\x2a\\x00\\x00\\x00'
object 0: hex : 0x2a000000
object 0: int : 42
object 1: name: 'b'
object 1: size: 4
object 1: data: b'\\xff\\xff\\xff\\xff'
object 1: hex : 0xffffffff
object 1: int : -1
";

    #[test]
    fn dumper_output_decodes_named_objects() {
        let function = function_with(vec![
            CVariable::new("a", "int"),
            CVariable::new("b", "int"),
        ]);
        let inputs = parse_dumper_output(DUMP, &function);
        assert_eq!(inputs["a"], CValue::Int(42));
        assert_eq!(inputs["b"], CValue::Int(-1));
    }

    #[test]
    fn objects_without_matching_parameter_are_dropped() {
        let function = function_with(vec![CVariable::new("a", "int")]);
        let inputs = parse_dumper_output(DUMP, &function);
        assert_eq!(inputs.len(), 1);
        assert!(inputs.contains_key("a"));
    }

    #[test]
    fn bytes_literal_names_also_decode() {
        // newer dumper versions quote names as b'a'
        let dump = "\
object 0: name: b'a'
object 0: size: 4
object 0: data: b'\\x07\\x00\\x00\\x00'
object 0: hex : 0x07000000
";
        let function = function_with(vec![CVariable::new("a", "int")]);
        let inputs = parse_dumper_output(dump, &function);
        assert_eq!(inputs["a"], CValue::Int(7));
    }

    #[test]
    fn hex_decoding_respects_widths_and_signs() {
        assert_eq!(hex_to_value("2a000000", "int"), CValue::Int(42));
        assert_eq!(hex_to_value("ffffffff", "int"), CValue::Int(-1));
        assert_eq!(hex_to_value("ffffffff", "unsigned int"), CValue::UInt(4294967295));
        assert_eq!(hex_to_value("80", "char"), CValue::Int(-128));
        assert_eq!(hex_to_value("ff", "unsigned char"), CValue::UInt(255));
        assert_eq!(hex_to_value("0080", "short"), CValue::Int(-32768));
        assert_eq!(
            hex_to_value("ffffffffffffffff", "unsigned long"),
            CValue::UInt(u64::MAX)
        );
    }

    #[test]
    fn float_bytes_decode_little_endian() {
        // 1.0f = 0x3f800000 little-endian
        assert_eq!(hex_to_value("0000803f", "float"), CValue::Float(1.0));
        // 1.0 = 0x3ff0000000000000 little-endian
        assert_eq!(hex_to_value("000000000000f03f", "double"), CValue::Float(1.0));
    }

    #[test]
    fn unknown_type_falls_back_to_integer() {
        assert_eq!(hex_to_value("07000000", "mystery_t"), CValue::Int(7));
    }

    #[test]
    fn truncated_or_invalid_hex_yields_zero() {
        assert_eq!(hex_to_value("f", "int"), CValue::Int(0));
        assert_eq!(hex_to_value("zz", "int"), CValue::Int(0));
    }

    #[test]
    fn include_dirs_derive_from_user_includes() {
        let program = CProgram {
            includes: vec![
                margay_model::CInclude::user("lib/util.h"),
                margay_model::CInclude::user("simple.h"),
                margay_model::CInclude::system("stdio.h"),
            ],
            ..CProgram::default()
        };
        assert_eq!(user_include_dirs(&program), vec!["lib"]);
    }
}
