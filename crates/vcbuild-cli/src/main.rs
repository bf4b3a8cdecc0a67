//! vcbuild - vcpkg dependency sync and CMake build driver

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vcbuild_cli::Cli;
use vcbuild_cli::pipeline;
use vcbuild_cli::ui::{ConsoleReporter, print_fatal};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins; --verbose only raises the fallback level.
    let fallback = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_fatal(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.run_config_from_env()?;
    tracing::debug!(?config, "configuration");
    let reporter = ConsoleReporter::new();
    pipeline::execute(&config, cli.tasks(), &reporter)
}
