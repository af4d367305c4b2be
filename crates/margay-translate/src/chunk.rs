//! Dependency-aware partitioning of a program into translation chunks.

use margay_model::{CDefine, CEnum, CProgram, CStruct, CVariable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    Structure,
    Define,
    Enum,
    Struct,
    Global,
    Function,
    Harness,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Structure => "structure",
            ChunkKind::Define => "define",
            ChunkKind::Enum => "enum",
            ChunkKind::Struct => "struct",
            ChunkKind::Global => "global",
            ChunkKind::Function => "function",
            ChunkKind::Harness => "harness",
        }
    }
}

/// One unit of work submitted to the translator.
#[derive(Debug, Clone)]
pub struct ConversionChunk {
    pub id: String,
    pub content: String,
    pub kind: ChunkKind,
    /// Chunk ids that must be converted before this one.
    pub dependencies: Vec<String>,
    pub priority: u8,
}

pub const STRUCTURE_CHUNK_ID: &str = "program_structure";

/// Partition a program into ordered chunks.
///
/// The scaffold chunk comes first and everything else depends on it.
/// Function bodies longer than `chunk_size` characters split at line
/// boundaries into `func_<name>_partK` chunks, order preserved.
pub fn chunk_program(program: &CProgram, chunk_size: usize) -> Vec<ConversionChunk> {
    let is_project = program.file_path.contains(',') || program.functions.len() > 10;
    let mut chunks = vec![ConversionChunk {
        id: STRUCTURE_CHUNK_ID.to_string(),
        content: structure_template(is_project),
        kind: ChunkKind::Structure,
        dependencies: Vec::new(),
        priority: 10,
    }];
    let base_dep = vec![STRUCTURE_CHUNK_ID.to_string()];

    if !program.defines.is_empty() {
        chunks.push(ConversionChunk {
            id: "defines".to_string(),
            content: defines_content(&program.defines),
            kind: ChunkKind::Define,
            dependencies: base_dep.clone(),
            priority: 9,
        });
    }

    for enum_def in &program.enums {
        chunks.push(ConversionChunk {
            id: format!("enum_{}", enum_def.name),
            content: enum_content(enum_def),
            kind: ChunkKind::Enum,
            dependencies: base_dep.clone(),
            priority: 8,
        });
    }

    for struct_def in &program.structs {
        chunks.push(ConversionChunk {
            id: format!("struct_{}", struct_def.name),
            content: struct_content(struct_def),
            kind: ChunkKind::Struct,
            dependencies: base_dep.clone(),
            priority: 7,
        });
    }

    if !program.variables.is_empty() {
        chunks.push(ConversionChunk {
            id: "globals".to_string(),
            content: globals_content(&program.variables),
            kind: ChunkKind::Global,
            dependencies: base_dep.clone(),
            priority: 6,
        });
    }

    for func in &program.functions {
        let parts = split_function_body(&func.body, chunk_size);
        let multi = parts.len() > 1;
        for (i, part) in parts.into_iter().enumerate() {
            let id = if multi {
                format!("func_{}_part{}", func.name, i + 1)
            } else {
                format!("func_{}", func.name)
            };
            chunks.push(ConversionChunk {
                id,
                content: part,
                kind: ChunkKind::Function,
                dependencies: base_dep.clone(),
                priority: 5,
            });
        }
    }

    chunks
}

/// Split an oversized body at line boundaries, preserving order.
pub fn split_function_body(body: &str, chunk_size: usize) -> Vec<String> {
    if body.len() <= chunk_size {
        return vec![body.to_string()];
    }

    let mut parts = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0;

    for line in body.lines() {
        if current_size + line.len() > chunk_size && !current.is_empty() {
            parts.push(current.join("\n"));
            current = vec![line];
            current_size = line.len();
        } else {
            current.push(line);
            current_size += line.len();
        }
    }
    if !current.is_empty() {
        parts.push(current.join("\n"));
    }
    parts
}

fn structure_template(is_project: bool) -> String {
    if is_project {
        "// Multi-file C project to convert to C#.\n\
         // All files become one ConvertedCode class; cross-file calls must keep working.\n"
            .to_string()
    } else {
        "// C program structure to convert to C#.\n\
         // The converted members will live in a single ConvertedCode class.\n"
            .to_string()
    }
}

fn defines_content(defines: &[CDefine]) -> String {
    defines
        .iter()
        .map(|d| {
            if d.is_function_macro {
                format!("#define {}({}) {}", d.name, d.parameters.join(", "), d.value)
            } else {
                format!("#define {} {}", d.name, d.value)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn enum_content(enum_def: &CEnum) -> String {
    let mut lines = vec![format!("enum {} {{", enum_def.name)];
    for (name, value) in &enum_def.values {
        lines.push(format!("    {name} = {value},"));
    }
    lines.push("};".to_string());
    lines.join("\n")
}

fn struct_content(struct_def: &CStruct) -> String {
    let mut lines = vec![format!("struct {} {{", struct_def.name)];
    for member in &struct_def.members {
        lines.push(format!("    {} {};", member.full_type(), member.name));
    }
    lines.push("};".to_string());
    lines.join("\n")
}

fn globals_content(variables: &[CVariable]) -> String {
    variables
        .iter()
        .map(|v| {
            let mut decl = String::new();
            if v.is_static {
                decl.push_str("static ");
            }
            if v.is_const {
                decl.push_str("const ");
            }
            decl.push_str(&v.full_type());
            decl.push(' ');
            decl.push_str(&v.name);
            if let Some(size) = v.array_size {
                decl.push_str(&format!("[{size}]"));
            }
            if let Some(init) = &v.initial_value {
                decl.push_str(&format!(" = {init}"));
            }
            decl.push(';');
            decl
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use margay_model::CFunction;

    fn program() -> CProgram {
        let mut enum_values = IndexMap::new();
        enum_values.insert("IDLE".to_string(), 0);
        enum_values.insert("ACTIVE".to_string(), 1);
        CProgram {
            program_id: "prog".to_string(),
            file_path: "prog.c".to_string(),
            defines: vec![CDefine {
                name: "LIMIT".to_string(),
                value: "128".to_string(),
                ..CDefine::default()
            }],
            enums: vec![CEnum {
                name: "mode".to_string(),
                values: enum_values,
                ..CEnum::default()
            }],
            structs: vec![CStruct {
                name: "point".to_string(),
                members: vec![CVariable::new("x", "int"), CVariable::new("y", "int")],
                ..CStruct::default()
            }],
            variables: vec![CVariable {
                name: "counter".to_string(),
                data_type: "int".to_string(),
                is_static: true,
                initial_value: Some("0".to_string()),
                ..CVariable::default()
            }],
            functions: vec![CFunction {
                name: "sum".to_string(),
                return_type: "int".to_string(),
                body: "int sum(int a, int b) { return a + b; }".to_string(),
                ..CFunction::default()
            }],
            ..CProgram::default()
        }
    }

    #[test]
    fn structure_chunk_comes_first_with_no_dependencies() {
        let chunks = chunk_program(&program(), 2000);
        assert_eq!(chunks[0].id, STRUCTURE_CHUNK_ID);
        assert_eq!(chunks[0].kind, ChunkKind::Structure);
        assert!(chunks[0].dependencies.is_empty());
    }

    #[test]
    fn every_other_chunk_depends_on_the_scaffold() {
        let chunks = chunk_program(&program(), 2000);
        for chunk in &chunks[1..] {
            assert_eq!(chunk.dependencies, vec![STRUCTURE_CHUNK_ID.to_string()]);
        }
    }

    #[test]
    fn all_entity_kinds_get_chunks() {
        let chunks = chunk_program(&program(), 2000);
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert!(ids.contains(&"defines"));
        assert!(ids.contains(&"enum_mode"));
        assert!(ids.contains(&"struct_point"));
        assert!(ids.contains(&"globals"));
        assert!(ids.contains(&"func_sum"));
    }

    #[test]
    fn empty_sections_contribute_no_chunks() {
        let bare = CProgram {
            program_id: "bare".to_string(),
            ..CProgram::default()
        };
        let chunks = chunk_program(&bare, 2000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, STRUCTURE_CHUNK_ID);
    }

    #[test]
    fn oversized_functions_split_into_ordered_parts() {
        let mut p = program();
        let long_body: String = (0..100)
            .map(|i| format!("    x = x + {i};"))
            .collect::<Vec<_>>()
            .join("\n");
        p.functions[0].body = long_body.clone();
        let chunks = chunk_program(&p, 200);
        let parts: Vec<&ConversionChunk> = chunks
            .iter()
            .filter(|c| c.id.starts_with("func_sum_part"))
            .collect();
        assert!(parts.len() > 1);
        assert_eq!(parts[0].id, "func_sum_part1");
        // reassembling the parts recovers the original body
        let rejoined: String = parts
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(rejoined, long_body);
    }

    #[test]
    fn split_respects_line_boundaries() {
        let body = "line one\nline two\nline three";
        for part in split_function_body(body, 10) {
            assert!(part.starts_with("line"));
        }
    }

    #[test]
    fn small_bodies_stay_whole() {
        assert_eq!(split_function_body("tiny", 2000), vec!["tiny".to_string()]);
    }

    #[test]
    fn chunk_contents_render_c_syntax() {
        let chunks = chunk_program(&program(), 2000);
        let by_id = |id: &str| chunks.iter().find(|c| c.id == id).unwrap();
        assert!(by_id("defines").content.contains("#define LIMIT 128"));
        assert!(by_id("enum_mode").content.contains("IDLE = 0,"));
        assert!(by_id("struct_point").content.contains("int x;"));
        assert!(by_id("globals").content.contains("static int counter = 0;"));
    }
}
