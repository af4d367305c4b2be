//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "margay")]
#[command(about = "Test-driven C to C# migration pipeline")]
#[command(
    long_about = "Test-driven C to C# migration pipeline.\n\n\
    For each C program, margay generates test inputs, records a baseline\n\
    against the original C, asks an LLM to translate the program to C#,\n\
    runs the same tests against the translation, and accepts the conversion\n\
    only when every output matches within tolerance.\n\n\
    Typical flow:\n  \
    1. margay analyze -i src/            (inspect the dependency graph)\n  \
    2. margay migrate -i src/ -o out/    (run the full pipeline)\n  \
    3. margay report -i out/reports/migration_report.json"
)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Migrate C sources to C# with test-driven validation
    #[command(display_order = 0)]
    Migrate {
        /// Input directories or files containing C sources
        #[arg(long, short = 'i', required = true)]
        input: Vec<PathBuf>,

        /// Output directory for converted C# files and reports
        #[arg(long, short = 'o', default_value = "output")]
        output: PathBuf,

        /// Path to a configuration YAML file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Maximum retry attempts per program
        #[arg(long, default_value_t = 3)]
        max_retries: u32,

        /// Convert programs of one dependency rank concurrently (reserved)
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },

    /// Analyze include dependencies without converting
    #[command(display_order = 1)]
    Analyze {
        /// Input directories or files containing C sources
        #[arg(long, short = 'i', required = true)]
        input: Vec<PathBuf>,

        /// Print a text rendering of the dependency graph
        #[arg(long, default_value_t = false)]
        visualize: bool,

        /// Write a Graphviz DOT file of the graph
        #[arg(long)]
        dot_out: Option<PathBuf>,
    },

    /// Render a report from a previous migration run
    #[command(display_order = 2)]
    Report {
        /// Path to a migration_report.json produced by `migrate`
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Output directory for rendered reports
        #[arg(long, short = 'o', default_value = "output/reports")]
        output: PathBuf,

        /// Report format: text | json
        #[arg(long, short = 'f', default_value = "text")]
        format: String,
    },

    /// Show availability of the external toolchain
    #[command(display_order = 3)]
    Info,
}
