//! `margay analyze`: dependency analysis without conversion.

use std::path::PathBuf;
use std::process::ExitCode;

use miette::IntoDiagnostic;

use margay_analyzer::CAnalyzer;
use margay_graph::build_file_graph;

pub fn run(
    input: Vec<PathBuf>,
    visualize: bool,
    dot_out: Option<PathBuf>,
) -> miette::Result<ExitCode> {
    let mut analyzer = CAnalyzer::new().into_diagnostic()?;
    let project = analyzer.analyze_paths(&input);

    println!("Files analyzed: {}", project.files.len());
    println!("Functions found: {}", project.all_functions.len());

    let graph = build_file_graph(&project.files);
    let stats = graph.statistics();
    println!("Programs: {}", stats.total_programs);
    println!("Dependencies: {}", stats.total_dependencies);

    let cycles = graph.find_cycles();
    if cycles.is_empty() {
        println!("No circular dependencies found.");
    } else {
        println!("{} circular dependencies detected:", cycles.len());
        for cycle in &cycles {
            println!("  cycle: {}", cycle.join(" -> "));
        }
    }

    match graph.topological_sort() {
        Ok(order) => {
            println!("\nRecommended conversion order:");
            for (idx, name) in order.iter().enumerate() {
                println!("  {}. {name}", idx + 1);
            }
        }
        Err(_) => {
            println!("\nNo conversion order exists; condensed component order:");
            for (idx, component) in graph.condensed_order().iter().enumerate() {
                println!("  {}. {}", idx + 1, component.join(", "));
            }
        }
    }

    if visualize {
        println!("\n{}", graph.render_text());
    }

    if let Some(path) = dot_out {
        std::fs::write(&path, graph.to_dot()).into_diagnostic()?;
        println!("\nDOT graph written to {}", path.display());
    }

    Ok(ExitCode::SUCCESS)
}
