use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> miette::Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Migrate {
            input,
            output,
            config,
            max_retries,
            parallel,
        } => commands::migrate::run(input, output, config, max_retries, parallel, cli.verbose),
        Commands::Analyze {
            input,
            visualize,
            dot_out,
        } => commands::analyze::run(input, visualize, dot_out),
        Commands::Report {
            input,
            output,
            format,
        } => commands::report::run(input, output, format),
        Commands::Info => commands::info::run(),
    }
}
