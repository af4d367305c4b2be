//! Normalization of AI-produced C# into a single `ConvertedCode` class.
//!
//! Model output arrives in many shapes: fenced in markdown, wrapped in its
//! own class (sometimes several, sometimes nested), with duplicated methods
//! across chunks, with or without `static`. The compiler needs exactly one
//! top-level class whose members are all static, so everything is rebuilt:
//! fences stripped, `using` directives lifted and de-duplicated, class
//! wrappers removed with brace tracking, members re-indented one level,
//! methods de-duplicated by `(name, parameter list)` ignoring access
//! modifiers, and `static` appended where missing.

use regex::Regex;
use std::sync::OnceLock;

fn using_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^using\s+[\w.]+\s*;").unwrap())
}

fn class_decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:public|private|internal|protected)?\s*(?:static\s+)?(?:partial\s+)?class\s+\w+")
            .unwrap()
    })
}

fn method_signature_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+)\s*\(([^)]*)\)").unwrap())
}

pub fn strip_markdown_fences(code: &str) -> String {
    code.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rebuild arbitrary AI output into one well-formed static class.
pub fn normalize_csharp_code(code: &str, target_class: &str) -> String {
    let code = strip_markdown_fences(code);

    let mut usings: Vec<String> = Vec::new();
    for line in code.lines() {
        let trimmed = line.trim();
        if using_re().is_match(trimmed) && !usings.iter().any(|u| u == trimmed) {
            usings.push(trimmed.to_string());
        }
    }
    if usings.is_empty() {
        usings.push("using System;".to_string());
        usings.push("using System.Runtime.InteropServices;".to_string());
    }

    let members = unwrap_class_bodies(&code);
    let members = dedup_methods(&members);
    let members = ensure_static_methods(&members);

    let mut out = usings;
    out.push(String::new());
    out.push(format!("public class {target_class}"));
    out.push("{".to_string());
    out.extend(reindent(&members));
    out.push("}".to_string());
    out.join("\n")
}

/// Drop class declaration lines and the braces they open, keeping members.
fn unwrap_class_bodies(code: &str) -> Vec<String> {
    #[derive(PartialEq)]
    enum Frame {
        Class,
        Other,
    }

    let mut kept: Vec<String> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut pending_class_brace = false;

    for line in code.lines() {
        let trimmed = line.trim();

        if using_re().is_match(trimmed) || trimmed.starts_with("namespace ") {
            continue;
        }

        if class_decl_re().is_match(trimmed) {
            if trimmed.contains('{') {
                stack.push(Frame::Class);
            } else {
                pending_class_brace = true;
            }
            continue;
        }

        if pending_class_brace && trimmed == "{" {
            pending_class_brace = false;
            stack.push(Frame::Class);
            continue;
        }

        if trimmed == "}" {
            match stack.pop() {
                Some(Frame::Class) => continue,
                Some(Frame::Other) => {
                    kept.push(line.to_string());
                    continue;
                }
                None => continue,
            }
        }

        for _ in 0..line.matches('{').count() {
            stack.push(Frame::Other);
        }
        let closes = line.matches('}').count();
        for _ in 0..closes {
            stack.pop();
        }

        // avoid piling blank lines when wrappers are removed
        if trimmed.is_empty() && kept.last().map(|l| l.trim().is_empty()).unwrap_or(true) {
            continue;
        }
        kept.push(line.to_string());
    }

    kept
}

fn is_method_declaration(trimmed: &str) -> bool {
    (trimmed.starts_with("public")
        || trimmed.starts_with("private")
        || trimmed.starts_with("protected")
        || trimmed.starts_with("internal"))
        && trimmed.contains('(')
        && trimmed.contains(')')
        && !trimmed.contains(" class ")
}

/// Key a method by name and parameter list, access modifiers ignored.
fn method_key(declaration: &str) -> Option<String> {
    let cleaned = declaration
        .split_whitespace()
        .filter(|word| {
            !matches!(
                *word,
                "public" | "private" | "protected" | "internal" | "static"
            )
        })
        .collect::<Vec<_>>()
        .join(" ");
    method_signature_re()
        .captures(&cleaned)
        .map(|caps| format!("{}({})", &caps[1], caps[2].trim()))
}

/// Keep the first definition of each `(name, parameters)` pair.
fn dedup_methods(lines: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out: Vec<String> = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if is_method_declaration(trimmed) {
            let mut end = i;
            let mut depth: i64 = 0;
            let mut opened = false;
            while end < lines.len() {
                depth += lines[end].matches('{').count() as i64;
                depth -= lines[end].matches('}').count() as i64;
                if lines[end].contains('{') {
                    opened = true;
                }
                if opened && depth <= 0 {
                    break;
                }
                end += 1;
            }
            let end = end.min(lines.len() - 1);
            let key = method_key(trimmed);
            let duplicate = match &key {
                Some(k) => seen.contains(k),
                None => false,
            };
            if !duplicate {
                if let Some(k) = key {
                    seen.push(k);
                }
                out.extend(lines[i..=end].iter().cloned());
            }
            i = end + 1;
        } else {
            out.push(lines[i].clone());
            i += 1;
        }
    }

    out
}

fn ensure_static_methods(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|line| {
            let trimmed = line.trim();
            if is_method_declaration(trimmed) && !trimmed.split_whitespace().any(|w| w == "static")
            {
                for modifier in ["public", "private", "protected", "internal"] {
                    let prefix = format!("{modifier} ");
                    if trimmed.starts_with(&prefix) {
                        return line.replacen(&prefix, &format!("{modifier} static "), 1);
                    }
                }
            }
            line.clone()
        })
        .collect()
}

/// Shift members to one indentation level under the class header.
fn reindent(lines: &[String]) -> Vec<String> {
    let min_indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                let relative = line.len() - line.trim_start().len() - min_indent;
                format!("    {}{}", " ".repeat(relative), line.trim_start())
            }
        })
        .collect()
}
