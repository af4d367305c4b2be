//! Tree-sitter walkers extracting program entities from the concrete tree.

use std::path::Path;

use indexmap::IndexMap;
use tree_sitter::{Node, Parser, Tree};

use margay_model::{CDefine, CEnum, CFunction, CInclude, CProgram, CStruct, CVariable};

use crate::source::cyclomatic_estimate;
use crate::AnalyzerError;

/// Tree-sitter backed C analyzer.
///
/// Construction is fallible: a grammar compiled against a different
/// tree-sitter ABI is reported as [`AnalyzerError::Grammar`] instead of
/// panicking inside the parser.
pub struct CAnalyzer {
    parser: Parser,
}

impl CAnalyzer {
    pub fn new() -> Result<Self, AnalyzerError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c::LANGUAGE.into())
            .map_err(|e| AnalyzerError::Grammar(e.to_string()))?;
        Ok(CAnalyzer { parser })
    }

    /// Parse a file, returning the tree and the decoded source.
    pub fn parse_file(&mut self, path: &Path) -> Result<(Tree, String), AnalyzerError> {
        let bytes = std::fs::read(path).map_err(|source| AnalyzerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = String::from_utf8_lossy(&bytes).into_owned();
        let tree = self.parse_source(&source).ok_or_else(|| AnalyzerError::Parse {
            path: path.to_path_buf(),
        })?;
        Ok((tree, source))
    }

    pub fn parse_source(&mut self, source: &str) -> Option<Tree> {
        self.parser.parse(source, None)
    }

    /// Parse one translation unit into the full program model.
    pub fn analyze_file(&mut self, path: &Path) -> Result<CProgram, AnalyzerError> {
        let (tree, source) = self.parse_file(path)?;
        let root = tree.root_node();
        if root.has_error() {
            tracing::warn!(path = %path.display(), "parse tree has errors, continuing best-effort");
        }

        let program_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();

        let mut program = CProgram {
            program_id,
            file_path: path.display().to_string(),
            lines_of_code: source.lines().count(),
            includes: extract_includes(root, &source),
            defines: extract_defines(root, &source),
            functions: extract_functions(root, &source),
            structs: extract_structs(root, &source),
            enums: extract_enums(root, &source),
            variables: extract_globals(root, &source),
            source_code: source,
            ..CProgram::default()
        };
        program.recompute_complexity();
        Ok(program)
    }
}

fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// Depth-first search for the first `identifier` token under a declarator.
fn find_identifier<'a>(node: Node<'_>, source: &'a str) -> Option<&'a str> {
    if node.kind() == "identifier" {
        return Some(node_text(node, source));
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_identifier(child, source) {
            return Some(found);
        }
    }
    None
}

fn is_type_node(kind: &str) -> bool {
    matches!(
        kind,
        "primitive_type"
            | "type_identifier"
            | "sized_type_specifier"
            | "struct_specifier"
            | "enum_specifier"
            | "union_specifier"
    )
}

/// Type text with an inline body removed (`struct point { ... }` -> `struct point`).
fn type_text(node: Node<'_>, source: &str) -> String {
    let text = node_text(node, source);
    match text.find('{') {
        Some(idx) => text[..idx].trim().to_string(),
        None => text.trim().to_string(),
    }
}

// ----------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------

pub fn extract_functions(root: Node<'_>, source: &str) -> Vec<CFunction> {
    let mut out = Vec::new();
    collect_functions(root, source, &mut out);
    out
}

fn collect_functions(node: Node<'_>, source: &str, out: &mut Vec<CFunction>) {
    if node.kind() == "function_definition" {
        if let Some(func) = extract_function(node, source) {
            out.push(func);
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_functions(child, source, out);
    }
}

fn extract_function(node: Node<'_>, source: &str) -> Option<CFunction> {
    let mut name = None;
    let mut return_type = "void".to_string();
    let mut parameters = Vec::new();
    let mut is_static = false;
    let mut is_inline = false;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let kind = child.kind();
        if is_type_node(kind) {
            return_type = type_text(child, source);
        } else if kind == "storage_class_specifier" {
            match node_text(child, source) {
                "static" => is_static = true,
                "inline" => is_inline = true,
                _ => {}
            }
        } else if matches!(kind, "function_declarator" | "pointer_declarator" | "declarator") {
            if name.is_none() {
                name = find_identifier(child, source).map(str::to_string);
            }
            if let Some(declarator) = find_function_declarator(child) {
                if let Some(param_list) = declarator.child_by_field_name("parameters") {
                    parameters = extract_parameters(param_list, source);
                }
            }
        }
    }

    let name = name?;
    let body = node_text(node, source).to_string();
    let called_functions = extract_calls(node, source);
    let complexity = cyclomatic_estimate(&body);

    Some(CFunction {
        name,
        return_type,
        parameters,
        line_start: line_of(node),
        line_end: node.end_position().row + 1,
        is_static,
        is_inline,
        called_functions,
        complexity,
        body,
    })
}

/// Descend through pointer declarators to the `function_declarator`, so
/// pointer-returning functions still surface their parameter list.
fn find_function_declarator(node: Node<'_>) -> Option<Node<'_>> {
    if node.kind() == "function_declarator" {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_function_declarator(child) {
            return Some(found);
        }
    }
    None
}

fn extract_parameters(param_list: Node<'_>, source: &str) -> Vec<CVariable> {
    let mut parameters = Vec::new();

    let mut cursor = param_list.walk();
    for child in param_list.children(&mut cursor) {
        if child.kind() != "parameter_declaration" {
            continue;
        }

        let mut data_type = String::new();
        let mut param_name: Option<String> = None;
        let mut pointer_level: u32 = 0;
        let mut is_const = false;
        let mut array_size = None;

        let mut inner = child.walk();
        for part in child.children(&mut inner) {
            let kind = part.kind();
            if is_type_node(kind) {
                data_type = type_text(part, source);
            } else if kind == "type_qualifier" && node_text(part, source) == "const" {
                is_const = true;
            } else if kind == "pointer_declarator" {
                let mut level = 0;
                let mut current = Some(part);
                while let Some(n) = current {
                    if n.kind() == "pointer_declarator" {
                        level += 1;
                    }
                    current = descend_declarator(n);
                    if let Some(n) = current {
                        if n.kind() == "identifier" {
                            param_name = Some(node_text(n, source).to_string());
                            break;
                        }
                    }
                }
                pointer_level = level;
                if param_name.is_none() {
                    param_name = find_identifier(part, source).map(str::to_string);
                }
            } else if kind == "identifier" {
                param_name = Some(node_text(part, source).to_string());
            } else if kind == "array_declarator" {
                // array-typed parameter: `int a[8]` decays to one pointer level
                param_name = find_identifier(part, source).map(str::to_string);
                pointer_level = pointer_level.max(1);
                if let Some(size) = part.child_by_field_name("size") {
                    array_size = node_text(size, source).parse::<usize>().ok();
                }
            }
        }

        // `void` parameter list and variadic `...` carry no parameter
        if data_type.is_empty() || (data_type == "void" && param_name.is_none()) {
            continue;
        }

        let name = param_name.unwrap_or_else(|| format!("param{}", parameters.len()));
        parameters.push(CVariable {
            name,
            data_type,
            pointer_level,
            is_const,
            array_size,
            line_number: line_of(child),
            ..CVariable::default()
        });
    }

    parameters
}

/// First named child of a declarator chain, skipping the `*` token.
fn descend_declarator(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor)
        .find(|c| c.is_named());
    result
}

// ----------------------------------------------------------------------
// Calls
// ----------------------------------------------------------------------

pub fn extract_calls(node: Node<'_>, source: &str) -> Vec<String> {
    let mut calls = Vec::new();
    collect_calls(node, source, &mut calls);
    calls
}

fn collect_calls(node: Node<'_>, source: &str, out: &mut Vec<String>) {
    if node.kind() == "call_expression" {
        if let Some(function) = node.child_by_field_name("function") {
            out.push(node_text(function, source).to_string());
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(child, source, out);
    }
}

// ----------------------------------------------------------------------
// Includes
// ----------------------------------------------------------------------

pub fn extract_includes(root: Node<'_>, source: &str) -> Vec<CInclude> {
    let mut includes = Vec::new();
    collect_includes(root, source, &mut includes);
    includes
}

fn collect_includes(node: Node<'_>, source: &str, out: &mut Vec<CInclude>) {
    if node.kind() == "preproc_include" {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "system_lib_string" => {
                    let header = node_text(child, source)
                        .trim()
                        .trim_matches(|c| c == '<' || c == '>')
                        .trim()
                        .to_string();
                    out.push(CInclude {
                        file_name: header,
                        is_system: true,
                        line_number: line_of(node),
                    });
                }
                "string_literal" => {
                    let header = node_text(child, source)
                        .trim()
                        .trim_matches('"')
                        .trim()
                        .to_string();
                    out.push(CInclude {
                        file_name: header,
                        is_system: false,
                        line_number: line_of(node),
                    });
                }
                _ => {}
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_includes(child, source, out);
    }
}

// ----------------------------------------------------------------------
// Defines
// ----------------------------------------------------------------------

pub fn extract_defines(root: Node<'_>, source: &str) -> Vec<CDefine> {
    let mut defines = Vec::new();
    collect_defines(root, source, &mut defines);
    defines
}

fn collect_defines(node: Node<'_>, source: &str, out: &mut Vec<CDefine>) {
    match node.kind() {
        "preproc_def" => {
            if let Some(name) = node.child_by_field_name("name") {
                let value = node
                    .child_by_field_name("value")
                    .map(|v| node_text(v, source).trim().to_string())
                    .unwrap_or_default();
                out.push(CDefine {
                    name: node_text(name, source).to_string(),
                    value,
                    is_function_macro: false,
                    parameters: Vec::new(),
                    line_number: line_of(node),
                });
            }
        }
        "preproc_function_def" => {
            if let Some(name) = node.child_by_field_name("name") {
                let parameters = node
                    .child_by_field_name("parameters")
                    .map(|p| {
                        node_text(p, source)
                            .trim_matches(|c| c == '(' || c == ')')
                            .split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_default();
                let value = node
                    .child_by_field_name("value")
                    .map(|v| node_text(v, source).trim().to_string())
                    .unwrap_or_default();
                out.push(CDefine {
                    name: node_text(name, source).to_string(),
                    value,
                    is_function_macro: true,
                    parameters,
                    line_number: line_of(node),
                });
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_defines(child, source, out);
    }
}

// ----------------------------------------------------------------------
// Structs and enums
// ----------------------------------------------------------------------

pub fn extract_structs(root: Node<'_>, source: &str) -> Vec<CStruct> {
    let mut structs = Vec::new();
    collect_structs(root, source, false, &mut structs);
    structs
}

fn collect_structs(node: Node<'_>, source: &str, in_typedef: bool, out: &mut Vec<CStruct>) {
    let typedef_here = in_typedef || node.kind() == "type_definition";
    if node.kind() == "struct_specifier" {
        if let Some(body) = node.child_by_field_name("body") {
            let name = node
                .child_by_field_name("name")
                .map(|n| node_text(n, source).to_string())
                .or_else(|| typedef_name(node, source))
                .unwrap_or_default();
            if !name.is_empty() {
                out.push(CStruct {
                    name,
                    members: extract_struct_members(body, source),
                    is_typedef: typedef_here,
                    line_number: line_of(node),
                });
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_structs(child, source, typedef_here, out);
    }
}

/// For `typedef struct { ... } name;` the name lives on the enclosing
/// type_definition, after the specifier.
fn typedef_name(struct_node: Node<'_>, source: &str) -> Option<String> {
    let parent = struct_node.parent()?;
    if parent.kind() != "type_definition" {
        return None;
    }
    let mut cursor = parent.walk();
    parent
        .children(&mut cursor)
        .filter(|c| c.kind() == "type_identifier")
        .last()
        .map(|n| node_text(n, source).to_string())
}

fn extract_struct_members(body: Node<'_>, source: &str) -> Vec<CVariable> {
    let mut members = Vec::new();
    let mut cursor = body.walk();
    for field in body.children(&mut cursor) {
        if field.kind() != "field_declaration" {
            continue;
        }
        let mut data_type = String::new();
        let mut name = String::new();
        let mut pointer_level = 0;
        let mut array_size = None;

        let mut inner = field.walk();
        for part in field.children(&mut inner) {
            let kind = part.kind();
            if is_type_node(kind) {
                data_type = type_text(part, source);
            } else if kind == "field_identifier" {
                name = node_text(part, source).to_string();
            } else if kind == "pointer_declarator" {
                pointer_level = count_pointer_depth(part);
                name = find_field_identifier(part, source).unwrap_or_default();
            } else if kind == "array_declarator" {
                name = find_field_identifier(part, source).unwrap_or_default();
                if let Some(size) = part.child_by_field_name("size") {
                    array_size = node_text(size, source).parse::<usize>().ok();
                }
            }
        }

        if !name.is_empty() && !data_type.is_empty() {
            members.push(CVariable {
                name,
                data_type,
                pointer_level,
                array_size,
                line_number: line_of(field),
                ..CVariable::default()
            });
        }
    }
    members
}

fn count_pointer_depth(node: Node<'_>) -> u32 {
    let mut depth = 0;
    let mut current = Some(node);
    while let Some(n) = current {
        if n.kind() == "pointer_declarator" {
            depth += 1;
            current = descend_declarator(n);
        } else {
            break;
        }
    }
    depth
}

fn find_field_identifier(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() == "field_identifier" {
        return Some(node_text(node, source).to_string());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_field_identifier(child, source) {
            return Some(found);
        }
    }
    None
}

pub fn extract_enums(root: Node<'_>, source: &str) -> Vec<CEnum> {
    let mut enums = Vec::new();
    collect_enums(root, source, &mut enums);
    enums
}

fn collect_enums(node: Node<'_>, source: &str, out: &mut Vec<CEnum>) {
    if node.kind() == "enum_specifier" {
        if let Some(body) = node.child_by_field_name("body") {
            let name = node
                .child_by_field_name("name")
                .map(|n| node_text(n, source).to_string())
                .unwrap_or_default();
            if !name.is_empty() {
                let mut values = IndexMap::new();
                let mut next_value: i64 = 0;
                let mut cursor = body.walk();
                for entry in body.children(&mut cursor) {
                    if entry.kind() != "enumerator" {
                        continue;
                    }
                    let Some(variant) = entry.child_by_field_name("name") else {
                        continue;
                    };
                    if let Some(value) = entry.child_by_field_name("value") {
                        if let Ok(parsed) = node_text(value, source).trim().parse::<i64>() {
                            next_value = parsed;
                        }
                    }
                    values.insert(node_text(variant, source).to_string(), next_value);
                    next_value += 1;
                }
                out.push(CEnum {
                    name,
                    values,
                    line_number: line_of(node),
                });
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_enums(child, source, out);
    }
}

// ----------------------------------------------------------------------
// Globals
// ----------------------------------------------------------------------

/// Top-level variable declarations (function prototypes excluded).
pub fn extract_globals(root: Node<'_>, source: &str) -> Vec<CVariable> {
    let mut globals = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() != "declaration" {
            continue;
        }
        if find_function_declarator(child).is_some() {
            continue;
        }

        let mut data_type = String::new();
        let mut is_static = false;
        let mut is_extern = false;
        let mut is_const = false;
        let mut name = String::new();
        let mut pointer_level = 0;
        let mut initial_value = None;
        let mut array_size = None;

        let mut inner = child.walk();
        for part in child.children(&mut inner) {
            let kind = part.kind();
            if is_type_node(kind) {
                data_type = type_text(part, source);
            } else if kind == "storage_class_specifier" {
                match node_text(part, source) {
                    "static" => is_static = true,
                    "extern" => is_extern = true,
                    _ => {}
                }
            } else if kind == "type_qualifier" && node_text(part, source) == "const" {
                is_const = true;
            } else if kind == "identifier" {
                name = node_text(part, source).to_string();
            } else if kind == "pointer_declarator" {
                pointer_level = count_pointer_depth(part);
                name = find_identifier(part, source).unwrap_or_default().to_string();
            } else if kind == "array_declarator" {
                name = find_identifier(part, source).unwrap_or_default().to_string();
                if let Some(size) = part.child_by_field_name("size") {
                    array_size = node_text(size, source).parse::<usize>().ok();
                }
            } else if kind == "init_declarator" {
                if let Some(declarator) = part.child_by_field_name("declarator") {
                    if declarator.kind() == "pointer_declarator" {
                        pointer_level = count_pointer_depth(declarator);
                    }
                    name = find_identifier(declarator, source)
                        .unwrap_or_default()
                        .to_string();
                }
                if let Some(value) = part.child_by_field_name("value") {
                    initial_value = Some(node_text(value, source).trim().to_string());
                }
            }
        }

        if !name.is_empty() && !data_type.is_empty() {
            globals.push(CVariable {
                name,
                data_type,
                pointer_level,
                is_static,
                is_extern,
                is_const,
                initial_value,
                array_size,
                line_number: line_of(child),
                ..CVariable::default()
            });
        }
    }
    globals
}
