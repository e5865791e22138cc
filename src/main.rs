mod cli;
mod execute;

use std::process::ExitCode;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;
use crate::cli::CLI;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = CLI::parse();
    match execute::execute(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "ERROR:".red(), e);
            ExitCode::FAILURE
        }
    }
}
