//! Source-text surgery shared by the symbolic driver and the C runner.

use regex::Regex;
use std::sync::OnceLock;

fn main_definition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(int|void)\s+main\s*\(").unwrap())
}

/// Remove the `main` definition from a translation unit.
///
/// Both test harnesses link the original source next to a synthetic `main`,
/// so the original one must go. The scan is line-wise: a line matching
/// `int|void main(` starts the drop, and lines are skipped while the brace
/// depth opened on that line stays positive. Runs of three or more blank
/// lines left behind are collapsed to one.
pub fn strip_main(source: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut in_main = false;
    let mut depth: i32 = 0;

    for line in source.lines() {
        if !in_main && main_definition_re().is_match(line) {
            in_main = true;
            depth = brace_delta(line);
            continue;
        }
        if in_main {
            depth += brace_delta(line);
            if depth <= 0 {
                in_main = false;
            }
            continue;
        }
        kept.push(line);
    }

    collapse_blank_runs(&kept)
}

fn brace_delta(line: &str) -> i32 {
    let opens = line.matches('{').count() as i32;
    let closes = line.matches('}').count() as i32;
    opens - closes
}

fn collapse_blank_runs(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut blank_run = 0;
    for line in lines {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Cyclomatic estimate over raw body text: 1 + branch tokens.
pub fn cyclomatic_estimate(body: &str) -> u32 {
    static KEYWORD_RE: OnceLock<Regex> = OnceLock::new();
    let keyword_re =
        KEYWORD_RE.get_or_init(|| Regex::new(r"\b(if|for|while|case)\b").unwrap());

    let keywords = keyword_re.find_iter(body).count();
    let ands = body.matches("&&").count();
    let ors = body.matches("||").count();
    let ternaries = body.matches('?').count();
    1 + (keywords + ands + ors + ternaries) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_a_trailing_main() {
        let source = "int sum(int a, int b) {\n    return a + b;\n}\n\nint main(void) {\n    return sum(1, 2);\n}\n";
        let stripped = strip_main(source);
        assert!(stripped.contains("int sum"));
        assert!(!stripped.contains("main"));
    }

    #[test]
    fn strips_main_with_nested_braces() {
        let source = "int id(int x) { return x; }\nint main() {\n    if (id(1)) {\n        { return 1; }\n    }\n    return 0;\n}\nint after(void) { return 2; }\n";
        let stripped = strip_main(source);
        assert!(stripped.contains("int id"));
        assert!(stripped.contains("int after"));
        assert!(!stripped.contains("main"));
    }

    #[test]
    fn void_main_is_also_removed() {
        let source = "void main() {\n    int x = 0;\n}\nint keep(void) { return 1; }\n";
        let stripped = strip_main(source);
        assert!(!stripped.contains("main"));
        assert!(stripped.contains("keep"));
    }

    #[test]
    fn source_without_main_is_unchanged_in_content() {
        let source = "int sum(int a, int b) {\n    return a + b;\n}\n";
        assert_eq!(strip_main(source), source);
    }

    #[test]
    fn does_not_strip_functions_that_mention_main() {
        // `mainframe` must survive: the match is anchored on the word boundary
        // of the `main(` call shape.
        let source = "int mainframe_check(int x) { return x; }\n";
        let stripped = strip_main(source);
        assert!(stripped.contains("mainframe_check"));
    }

    #[test]
    fn blank_runs_collapse() {
        let source = "int a(void) { return 1; }\n\n\n\nint main() {\n    return 0;\n}\n\n\n\nint b(void) { return 2; }\n";
        let stripped = strip_main(source);
        assert!(!stripped.contains("\n\n\n"));
        assert!(stripped.contains("int a"));
        assert!(stripped.contains("int b"));
    }

    #[test]
    fn estimate_counts_branches() {
        assert_eq!(cyclomatic_estimate("return a + b;"), 1);
        assert_eq!(cyclomatic_estimate("if (a) { return 1; } return 0;"), 2);
        assert_eq!(
            cyclomatic_estimate("if (a && b) { for (;;) {} } return a ? 1 : 0;"),
            5
        );
    }
}
