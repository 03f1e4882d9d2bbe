mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter, e.g. `PSLINT_LOG=pslint=debug`
const LOG_ENV: &str = "PSLINT_LOG";

fn init_logging(verbose: bool) {
    let default = if verbose { "pslint=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(command) = &cli.command {
        return match command {
            Commands::Settings { command } => cli::settings::run_settings(command),
            Commands::Rules => cli::rules::run_rules(),
        };
    }
    cli::lint::run_lint(cli)
}
