//! `margay info`: external toolchain availability.

use std::process::ExitCode;

use margay_runner::exec::probe_tool;

pub fn run() -> miette::Result<ExitCode> {
    println!("Required tools:");
    for (tool, description) in [
        ("gcc", "C compiler"),
        ("dotnet", "C# toolchain"),
    ] {
        print_probe(tool, description);
    }

    println!("\nOptional tools (symbolic test generation):");
    for (tool, description) in [
        ("clang", "LLVM C front end"),
        ("llvm-link", "LLVM bitcode linker"),
        ("klee", "symbolic execution engine"),
        ("ktest-tool", "symbolic artifact dumper"),
    ] {
        print_probe(tool, description);
    }

    Ok(ExitCode::SUCCESS)
}

fn print_probe(tool: &str, description: &str) {
    let mark = if probe_tool(tool, "--version") {
        "ok"
    } else {
        "missing"
    };
    println!("  [{mark:>7}] {tool} ({description})");
}
