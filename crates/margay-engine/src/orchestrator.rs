//! The retry-driven conversion loop.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;

use margay_analyzer::{file_info_of, CAnalyzer};
use margay_graph::{build_file_graph, DependencyGraph};
use margay_model::{
    CProgram, ConversionIssueKind, ConversionResult, ConversionStatus, IssueSeverity,
    MigrationReport, TestSuite,
};
use margay_runner::{CSharpTestRunner, CTestRunner};
use margay_testgen::{emit_c_harness, SymbolicConfig, SymbolicEngine, TestGenerator, DEFAULT_SEED};
use margay_translate::{create_translator, HybridTranslator, Translator};
use margay_validate::OutputValidator;

use crate::config::MigrationConfig;
use crate::report::write_report;
use crate::MigrationError;

/// Drives parse → graph → order → convert-with-retry → report.
pub struct MigrationOrchestrator {
    config: MigrationConfig,
    analyzer: CAnalyzer,
    test_generator: TestGenerator,
    c_runner: CTestRunner,
    csharp_runner: CSharpTestRunner,
    translator: HybridTranslator,
    validator: OutputValidator,
    programs: Vec<CProgram>,
    graph: DependencyGraph,
}

impl MigrationOrchestrator {
    pub fn new(config: MigrationConfig) -> Result<Self, MigrationError> {
        let analyzer = CAnalyzer::new()?;
        let translator = create_translator(
            config.gemini_config(),
            config.converter.gemini.fallback_to_rules,
        );
        let csharp_project = config.output_dir.join("generated_csharp");
        let symbolic = SymbolicEngine::new(SymbolicConfig::default());
        Ok(MigrationOrchestrator {
            analyzer,
            test_generator: TestGenerator::new(DEFAULT_SEED, Some(symbolic)),
            c_runner: CTestRunner::default(),
            csharp_runner: CSharpTestRunner::new(csharp_project, 30),
            translator,
            validator: OutputValidator::default(),
            programs: Vec::new(),
            graph: DependencyGraph::new(),
            config,
        })
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn programs(&self) -> &[CProgram] {
        &self.programs
    }

    /// Run the whole pipeline over every `.c`/`.h` file under the roots.
    pub fn migrate_all(&mut self, inputs: &[PathBuf]) -> MigrationReport {
        let started = Instant::now();
        let mut report = MigrationReport {
            started_at: Some(Utc::now()),
            ..MigrationReport::default()
        };

        tracing::info!("starting C to C# migration pipeline");

        // Step 1: parse
        tracing::info!("[1/5] parsing C sources");
        self.programs = self.analyzer.analyze_programs(inputs);
        report.total_programs = self.programs.len();
        tracing::info!(programs = self.programs.len(), "programs parsed");

        // Step 2: dependency graph
        tracing::info!("[2/5] analyzing dependencies");
        self.graph = self.build_program_graph();
        let cycles = self.graph.find_cycles();
        for cycle in &cycles {
            tracing::warn!(cycle = %cycle.join(" -> "), "circular dependency");
        }

        // Step 3: conversion order
        tracing::info!("[3/5] computing conversion order");
        let order = match self.graph.get_conversion_order() {
            Ok(order) => {
                tracing::info!(order = %order.join(" -> "), "conversion order");
                order
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot determine conversion order");
                for component in self.graph.condensed_order() {
                    tracing::info!(members = %component.join(", "), "conversion hint component");
                }
                for program in &self.programs {
                    let mut result =
                        ConversionResult::new(program.program_id.clone(), self.config.max_retries);
                    result.source_file = program.file_path.clone();
                    result.mark_failed(format!("unresolvable dependency cycle: {e}"));
                    report.add_result(result);
                }
                return self.finalize(report, started);
            }
        };

        // Step 4: convert in order
        tracing::info!("[4/5] converting programs in dependency order");
        let mut converted_context: Vec<String> = Vec::new();
        for (idx, program_id) in order.iter().enumerate() {
            let Some(program) = self
                .programs
                .iter()
                .find(|p| &p.program_id == program_id)
                .cloned()
            else {
                // dangling include with no parsed source behind it
                continue;
            };
            tracing::info!(
                progress = format!("{}/{}", idx + 1, order.len()),
                program_id = %program_id,
                "converting"
            );

            let result = self.convert_program_with_retry(&program, &converted_context);
            if result.status == ConversionStatus::Success {
                self.graph.mark_as_converted(program_id);
                if let Some(p) = self
                    .programs
                    .iter_mut()
                    .find(|p| &p.program_id == program_id)
                {
                    p.is_converted = true;
                }
                if !result.csharp_code.is_empty() {
                    converted_context.push(result.csharp_code.clone());
                }
                tracing::info!(program_id = %program_id, summary = %result.summary(), "converted");
            } else {
                tracing::error!(program_id = %program_id, summary = %result.summary(), "failed");
            }
            report.add_result(result);
        }

        // Step 5: report
        tracing::info!("[5/5] writing migration report");
        self.finalize(report, started)
    }

    fn finalize(&self, mut report: MigrationReport, started: Instant) -> MigrationReport {
        report.completed_at = Some(Utc::now());
        report.total_duration_seconds = started.elapsed().as_secs_f64();
        match write_report(&report, &self.config.output_dir) {
            Ok(path) => tracing::info!(path = %path.display(), "report written"),
            Err(e) => tracing::warn!(error = %e, "failed to write report"),
        }
        tracing::info!("\n{}", report.summary());
        report
    }

    /// Map file-level include edges onto program ids.
    fn build_program_graph(&mut self) -> DependencyGraph {
        let mut files = std::collections::BTreeMap::new();
        for program in &self.programs {
            let info = file_info_of(program);
            files.insert(info.path.clone(), info);
        }
        let file_graph = build_file_graph(&files);

        let basename_to_id: std::collections::BTreeMap<String, String> = self
            .programs
            .iter()
            .map(|p| {
                let base = p
                    .file_path
                    .rsplit(['/', '\\'])
                    .next()
                    .unwrap_or(&p.file_path)
                    .to_string();
                (base, p.program_id.clone())
            })
            .collect();

        let mut graph = DependencyGraph::new();
        for program in &mut self.programs {
            let base = program
                .file_path
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(&program.file_path);
            let deps: Vec<String> = file_graph
                .node(base)
                .map(|node| {
                    node.dependencies
                        .iter()
                        .filter_map(|dep| basename_to_id.get(dep))
                        .filter(|id| **id != program.program_id)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            program.dependencies = deps.clone();
            graph.add_node(program.program_id.clone(), deps);
        }
        graph
    }

    /// One program through generate → baseline → translate → run → validate,
    /// repeated up to `max_retries` times. Accepted only when every test
    /// matches.
    pub fn convert_program_with_retry(
        &mut self,
        program: &CProgram,
        converted_context: &[String],
    ) -> ConversionResult {
        let mut result = ConversionResult::new(program.program_id.clone(), self.config.max_retries);
        result.source_file = program.file_path.clone();
        result.started_at = Some(Utc::now());
        result.status = ConversionStatus::InProgress;
        result.metrics.lines_of_code_c = program.lines_of_code;
        result.metrics.functions_total = program.functions.len();
        result.metrics.structs_total = program.structs.len();
        let attempt_started = Instant::now();

        let max_retries = self.config.max_retries.max(1);
        for attempt in 1..=max_retries {
            if attempt > 1 {
                tracing::info!(attempt, max = max_retries, "retry attempt");
            }

            match self.attempt_conversion(program, converted_context, &mut result) {
                Ok(true) => {
                    result.mark_success();
                    tracing::info!("all tests passed");
                    break;
                }
                Ok(false) => {
                    result.retry_count = attempt;
                    if attempt < max_retries {
                        tracing::warn!(
                            failed = result.metrics.tests_failed,
                            "tests failed, retrying"
                        );
                    } else {
                        result.mark_failed(format!(
                            "{} tests failed after {max_retries} attempts",
                            result.metrics.tests_failed
                        ));
                    }
                }
                Err(e) => {
                    result.retry_count = attempt;
                    tracing::error!(error = %e, "conversion attempt errored");
                    if attempt >= max_retries {
                        result.mark_failed(format!("error during conversion: {e}"));
                    }
                }
            }
        }

        result.metrics.total_time_seconds = attempt_started.elapsed().as_secs_f64();
        result.metrics.recompute_pass_rate();
        result.completed_at = Some(Utc::now());
        result
    }

    fn attempt_conversion(
        &mut self,
        program: &CProgram,
        converted_context: &[String],
        result: &mut ConversionResult,
    ) -> Result<bool, MigrationError> {
        // 1. tests
        tracing::info!("generating test cases");
        let suite = self.test_generator.generate_tests(program, None, None);
        result.metrics.tests_total = suite.len();
        if suite.is_empty() {
            // nothing testable (headers, static-only units) converts as-is
            tracing::info!("no testable functions, accepting structurally");
            let code = self
                .translator
                .convert_with_context(program, converted_context)?;
            result.metrics.lines_of_code_csharp = code.lines().count();
            result.csharp_code = code;
            self.persist_converted(program, &result.csharp_code);
            return Ok(true);
        }

        // 2. C baseline
        tracing::info!("running C baseline");
        let testing_started = Instant::now();
        let c_harness = emit_c_harness(program, &suite);
        let c_results = self.c_runner.run_tests(program, &suite, &c_harness);
        if all_errored(&suite, &c_results) {
            result.add_issue(
                ConversionIssueKind::CompilationError,
                IssueSeverity::Error,
                "C baseline could not be collected",
            );
            result.metrics.tests_failed = suite.len();
            return Ok(false);
        }

        // 3. translate, with the C# of already-converted dependencies as context
        tracing::info!("translating to C#");
        let conversion_started = Instant::now();
        let csharp_code = self
            .translator
            .convert_with_context(program, converted_context)?;
        result.metrics.conversion_time_seconds += conversion_started.elapsed().as_secs_f64();
        result.metrics.lines_of_code_csharp = csharp_code.lines().count();
        result.csharp_code = csharp_code.clone();

        // 4. C# run
        tracing::info!("running C# tests");
        let cs_harness = self.csharp_runner.generate_harness(program, &suite);
        let cs_results = self
            .csharp_runner
            .run_tests(program, &suite, &csharp_code, &cs_harness);

        // 5. validate
        tracing::info!("validating outputs");
        let validations = self.validator.validate(&suite, &c_results, &cs_results);
        result.metrics.testing_time_seconds += testing_started.elapsed().as_secs_f64();

        let passed = validations.iter().filter(|v| v.is_match).count();
        let failed = validations.len() - passed;
        result.metrics.tests_passed = passed;
        result.metrics.tests_failed = failed;
        result.metrics.recompute_pass_rate();
        tracing::info!(passed, total = validations.len(), "validation finished");

        if failed == 0 {
            self.persist_converted(program, &csharp_code);
            Ok(true)
        } else {
            result.add_issue(
                ConversionIssueKind::TestFailure,
                IssueSeverity::Warning,
                format!("{failed} tests did not match the C baseline"),
            );
            Ok(false)
        }
    }

    fn persist_converted(&self, program: &CProgram, code: &str) {
        let dir = self.config.output_dir.join("converted");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(error = %e, "cannot create converted output directory");
            return;
        }
        let path = dir.join(format!("{}.cs", program.program_id));
        if let Err(e) = std::fs::write(&path, code) {
            tracing::warn!(path = %path.display(), error = %e, "cannot write converted file");
        }
    }
}

fn all_errored(
    suite: &TestSuite,
    results: &indexmap::IndexMap<String, margay_model::TestResult>,
) -> bool {
    !suite.is_empty()
        && suite.test_cases.iter().all(|t| {
            results
                .get(&t.id)
                .map(|r| r.status == margay_model::TestStatus::Error)
                .unwrap_or(true)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator_with(output_dir: PathBuf) -> MigrationOrchestrator {
        let mut config = MigrationConfig::default();
        config.output_dir = output_dir;
        config.converter.gemini.enabled = false;
        config.max_retries = 1;
        MigrationOrchestrator::new(config).unwrap()
    }

    fn write(dir: &std::path::Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn empty_input_produces_empty_report() {
        let out = tempfile::tempdir().unwrap();
        let src = tempfile::tempdir().unwrap();
        let mut orchestrator = orchestrator_with(out.path().to_path_buf());
        let report = orchestrator.migrate_all(&[src.path().to_path_buf()]);
        assert_eq!(report.total_programs, 0);
        assert_eq!(report.converted_programs, 0);
        assert_eq!(report.failed_programs, 0);
    }

    #[test]
    fn include_edges_map_to_program_dependencies() {
        let out = tempfile::tempdir().unwrap();
        let src = tempfile::tempdir().unwrap();
        write(
            src.path(),
            "util.c",
            "int square(int x) { return x * x; }\n",
        );
        write(
            src.path(),
            "main.c",
            "#include \"util.c\"\nint main(void) { return square(2); }\n",
        );

        let mut orchestrator = orchestrator_with(out.path().to_path_buf());
        orchestrator.programs = orchestrator
            .analyzer
            .analyze_programs(&[src.path().to_path_buf()]);
        let graph = orchestrator.build_program_graph();

        assert!(graph.node("main").unwrap().has_dependency("util"));
        assert_eq!(graph.topological_sort().unwrap(), vec!["util", "main"]);
        let main_program = orchestrator
            .programs
            .iter()
            .find(|p| p.program_id == "main")
            .unwrap();
        assert_eq!(main_program.dependencies, vec!["util"]);
    }

    #[test]
    fn cyclic_headers_fail_every_program() {
        let out = tempfile::tempdir().unwrap();
        let src = tempfile::tempdir().unwrap();
        write(src.path(), "a.h", "#include \"b.h\"\n");
        write(src.path(), "b.h", "#include \"a.h\"\n");

        let mut orchestrator = orchestrator_with(out.path().to_path_buf());
        let report = orchestrator.migrate_all(&[src.path().to_path_buf()]);

        assert_eq!(report.total_programs, 2);
        assert_eq!(report.failed_programs, 2);
        assert_eq!(report.converted_programs, 0);
        assert!(report.conversion_results.iter().all(|r| {
            r.status == ConversionStatus::Failed
                && r.issues
                    .iter()
                    .any(|i| i.message.contains("dependency cycle"))
        }));
    }

    // Requires gcc and dotnet on PATH; run with `cargo test -- --ignored`.
    #[test]
    #[ignore]
    fn trivial_program_migrates_end_to_end() {
        let out = tempfile::tempdir().unwrap();
        let src = tempfile::tempdir().unwrap();
        write(
            src.path(),
            "sum_file.c",
            "#include <stdio.h>\n\nint sum(int a, int b) {\n    return a + b;\n}\n\nint main(void) {\n    printf(\"%d\\n\", sum(1, 2));\n    return 0;\n}\n",
        );

        let mut orchestrator = orchestrator_with(out.path().to_path_buf());
        let report = orchestrator.migrate_all(&[src.path().to_path_buf()]);

        assert_eq!(report.total_programs, 1);
        assert_eq!(report.failed_programs, 0);
        assert_eq!(report.converted_programs, 1);
        assert!(out.path().join("converted").join("sum_file.cs").exists());
    }
}
