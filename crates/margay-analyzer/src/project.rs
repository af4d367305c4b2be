//! Project-level scan: collect `.c`/`.h` files and aggregate per-file facts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use margay_model::CProgram;

use crate::parser::CAnalyzer;

/// Per-file facts consumed by the dependency graph builder.
#[derive(Debug, Clone, Default)]
pub struct FileInfo {
    pub path: String,
    /// Function name -> names called inside it, in source order.
    pub functions: IndexMap<String, Vec<String>>,
    pub system_includes: Vec<String>,
    pub user_includes: Vec<String>,
    pub total_lines: usize,
}

/// Whole-project aggregate.
#[derive(Debug, Clone, Default)]
pub struct ProjectData {
    pub files: BTreeMap<String, FileInfo>,
    /// Function name -> files defining it.
    pub all_functions: BTreeMap<String, Vec<String>>,
    /// Called name -> call-site count across the project.
    pub all_calls: BTreeMap<String, usize>,
}

/// Recursively collect `.c` and `.h` files under each root, sorted and
/// de-duplicated. Non-existent roots contribute nothing.
pub fn find_c_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        collect_c_files(path, &mut files);
    }
    files.sort();
    files.dedup();
    files
}

fn collect_c_files(path: &Path, out: &mut Vec<PathBuf>) {
    if path.is_file() {
        if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("c") | Some("h")
        ) {
            out.push(path.to_path_buf());
        }
        return;
    }
    if path.is_dir() {
        let Ok(entries) = std::fs::read_dir(path) else {
            tracing::warn!(path = %path.display(), "unreadable directory, skipping");
            return;
        };
        for entry in entries.flatten() {
            collect_c_files(&entry.path(), out);
        }
    }
}

impl CAnalyzer {
    /// Scan a set of roots into the project aggregate.
    ///
    /// Files that fail to read or parse are logged and skipped; the scan
    /// never aborts on one bad file.
    pub fn analyze_paths(&mut self, paths: &[PathBuf]) -> ProjectData {
        let mut project = ProjectData::default();

        for file in find_c_files(paths) {
            let program = match self.analyze_file(&file) {
                Ok(program) => program,
                Err(e) => {
                    tracing::warn!(path = %file.display(), error = %e, "parse error, skipping file");
                    continue;
                }
            };
            let info = file_info_of(&program);

            for (name, calls) in &info.functions {
                project
                    .all_functions
                    .entry(name.clone())
                    .or_default()
                    .push(info.path.clone());
                for call in calls {
                    *project.all_calls.entry(call.clone()).or_default() += 1;
                }
            }
            project.files.insert(info.path.clone(), info);
        }

        project
    }

    /// Parse every file under the roots into full program models.
    pub fn analyze_programs(&mut self, paths: &[PathBuf]) -> Vec<CProgram> {
        let mut programs = Vec::new();
        for file in find_c_files(paths) {
            match self.analyze_file(&file) {
                Ok(program) => {
                    tracing::debug!(
                        program_id = %program.program_id,
                        functions = program.functions.len(),
                        includes = program.includes.len(),
                        "parsed"
                    );
                    programs.push(program);
                }
                Err(e) => {
                    tracing::warn!(path = %file.display(), error = %e, "parse error, skipping file");
                }
            }
        }
        programs
    }
}

pub fn file_info_of(program: &CProgram) -> FileInfo {
    let mut functions = IndexMap::new();
    for func in &program.functions {
        functions.insert(func.name.clone(), func.called_functions.clone());
    }
    FileInfo {
        path: program.file_path.clone(),
        functions,
        system_includes: program
            .system_includes()
            .map(|i| i.file_name.clone())
            .collect(),
        user_includes: program
            .user_includes()
            .map(|i| i.file_name.clone())
            .collect(),
        total_lines: program.lines_of_code,
    }
}
