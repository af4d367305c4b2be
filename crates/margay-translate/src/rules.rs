//! Deterministic rule-based fallback translator.
//!
//! A fixed type table plus textual call rewrites. No semantic analysis:
//! this path exists so the pipeline can still produce compilable C# when
//! the LLM is unavailable or its output fails validation.

use regex::Regex;
use std::sync::OnceLock;

use margay_model::{CDefine, CEnum, CFunction, CProgram, CStruct, CVariable};

use crate::{TranslateError, Translator};

/// C-to-C# type mapping.
pub struct TypeMapper;

impl TypeMapper {
    /// Map a C type token (qualifiers stripped) to its C# counterpart.
    ///
    /// Single pointers map to `ref T`; deeper indirection maps to `IntPtr`.
    /// The `ref` choice is wrong for C arrays passed as pointers and is
    /// kept deliberately; see DESIGN.md.
    pub fn map_type(c_type: &str, pointer_level: u32) -> String {
        let cleaned = c_type
            .replace("const ", "")
            .replace("static ", "")
            .replace("extern ", "");
        let cleaned = cleaned.trim();

        let base = match cleaned {
            "int" | "signed int" | "signed" => "int",
            "short" | "short int" => "short",
            "long" | "long int" | "long long" => "long",
            "char" => "byte",
            "unsigned int" | "unsigned" => "uint",
            "unsigned short" => "ushort",
            "unsigned long" | "unsigned long long" => "ulong",
            "unsigned char" => "byte",
            "float" => "float",
            "double" | "long double" => "double",
            "void" => "void",
            "bool" | "_Bool" => "bool",
            "size_t" => "ulong",
            "ssize_t" => "long",
            other => other,
        };

        match pointer_level {
            0 => base.to_string(),
            1 => format!("ref {base}"),
            _ => "IntPtr".to_string(),
        }
    }
}

/// Rule-based converter producing a single `ConvertedCode` class.
#[derive(Debug, Default, Clone)]
pub struct RuleTranslator;

impl RuleTranslator {
    pub fn new() -> Self {
        RuleTranslator
    }

    fn convert_define(&self, define: &CDefine) -> String {
        if define.is_function_macro {
            return format!("    // macro {} requires manual conversion", define.name);
        }
        let value = define.value.trim();
        let numeric = !value.is_empty()
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || c == '.' || c == '-');
        if numeric {
            if value.contains('.') {
                return format!("    public const double {} = {value};", define.name);
            }
            return format!("    public const int {} = {value};", define.name);
        }
        if value.starts_with('"') && value.ends_with('"') {
            return format!("    public const string {} = {value};", define.name);
        }
        format!("    // #define {} {value}", define.name)
    }

    fn convert_enum(&self, enum_def: &CEnum) -> Vec<String> {
        let mut lines = vec![
            format!("    public enum {}", enum_def.name),
            "    {".to_string(),
        ];
        for (name, value) in &enum_def.values {
            lines.push(format!("        {name} = {value},"));
        }
        lines.push("    }".to_string());
        lines
    }

    fn convert_struct(&self, struct_def: &CStruct) -> Vec<String> {
        let mut lines = vec![
            "    [StructLayout(LayoutKind.Sequential)]".to_string(),
            format!("    public struct {}", struct_def.name),
            "    {".to_string(),
        ];
        for member in &struct_def.members {
            let cs_type = TypeMapper::map_type(&member.data_type, member.pointer_level);
            lines.push(format!("        public {cs_type} {};", member.name));
        }
        lines.push("    }".to_string());
        lines
    }

    fn convert_global(&self, var: &CVariable) -> String {
        let cs_type = TypeMapper::map_type(&var.data_type, var.pointer_level);
        let init = var
            .initial_value
            .as_ref()
            .map(|v| format!(" = {v}"))
            .unwrap_or_default();
        if var.is_const {
            format!("    public const {cs_type} {}{init};", var.name)
        } else {
            format!("    public static {cs_type} {}{init};", var.name)
        }
    }

    fn convert_function(&self, func: &CFunction) -> Vec<String> {
        let return_type = TypeMapper::map_type(&func.return_type, 0);
        let params = func
            .parameters
            .iter()
            .map(|p| {
                format!(
                    "{} {}",
                    TypeMapper::map_type(&p.data_type, p.pointer_level),
                    p.name
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut lines = vec![
            format!("    public static {return_type} {}({params})", func.name),
            "    {".to_string(),
        ];
        for line in convert_body(&func.body) {
            lines.push(format!("        {line}"));
        }
        lines.push("    }".to_string());
        lines
    }
}

impl Translator for RuleTranslator {
    // the fixed table needs no prior-conversion context
    fn convert_with_context(
        &self,
        program: &CProgram,
        _context: &[String],
    ) -> Result<String, TranslateError> {
        tracing::info!(program_id = %program.program_id, "rule-based conversion");

        let mut lines = vec![
            "using System;".to_string(),
            "using System.Runtime.InteropServices;".to_string(),
            String::new(),
            "public class ConvertedCode".to_string(),
            "{".to_string(),
        ];

        if !program.defines.is_empty() {
            lines.push("    // constants from #define".to_string());
            for define in &program.defines {
                lines.push(self.convert_define(define));
            }
            lines.push(String::new());
        }

        for enum_def in &program.enums {
            lines.extend(self.convert_enum(enum_def));
            lines.push(String::new());
        }

        for struct_def in &program.structs {
            lines.extend(self.convert_struct(struct_def));
            lines.push(String::new());
        }

        if !program.variables.is_empty() {
            for var in &program.variables {
                lines.push(self.convert_global(var));
            }
            lines.push(String::new());
        }

        for func in &program.functions {
            if func.name == "main" {
                continue;
            }
            lines.extend(self.convert_function(func));
            lines.push(String::new());
        }

        lines.push("}".to_string());
        Ok(lines.join("\n"))
    }

    fn available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

/// Textual rewrites of well-known C calls and tokens.
fn convert_body(body: &str) -> Vec<String> {
    static REWRITES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    let rewrites = REWRITES.get_or_init(|| {
        [
            (r"\bprintf\b", "Console.WriteLine"),
            (r"\bscanf\b", "Console.ReadLine"),
            (r"\bmalloc\b", "new"),
            (r"\bfree\b", "// GC handles"),
            (r"\bNULL\b", "null"),
            (r"\bnullptr\b", "null"),
        ]
        .iter()
        .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), *replacement))
        .collect()
    });

    let mut text = strip_outer_braces(body).to_string();
    for (pattern, replacement) in rewrites {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }

    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Body text arrives as the full definition; keep only what is inside the
/// outermost braces.
fn strip_outer_braces(body: &str) -> &str {
    let trimmed = body.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(open), Some(close)) if close > open => trimmed[open + 1..close].trim(),
        _ => trimmed,
    }
}
