use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use volkeeper::cli::args::{Cli, Commands};
use volkeeper::cli::commands;
use volkeeper::config::{load_config, Verbosity};
use volkeeper::error::VolError;

fn main() {
    let cli = Cli::parse();

    // Convert CLI flags to verbosity level
    let verbosity = Verbosity::from((cli.quiet, cli.verbose));

    // RUST_LOG env var overrides CLI flags
    let filter = verbosity.as_tracing_filter();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr) // Keep stdout clean for output
        .init();

    tracing::debug!("Verbosity level: {:?}", verbosity);

    if let Err(err) = run(cli, verbosity) {
        display_error(&err);
        std::process::exit(1);
    }
}

/// Load configuration and execute the dispatched command.
fn run(cli: Cli, verbosity: Verbosity) -> Result<(), VolError> {
    if let Commands::Completions(args) = &cli.command {
        clap_complete::generate(args.shell, &mut Cli::command(), "volkeeper", &mut std::io::stdout());
        return Ok(());
    }

    let loaded = load_config(cli.config.as_deref())?;
    tracing::debug!(path = %loaded.path.display(), from_disk = loaded.from_disk, "Configuration loaded");
    let mut config = loaded.config;
    if let Some(url) = cli.backend {
        config.backend.url = url;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(commands::run(cli.command, config, verbosity))
}

/// Display a VolError with optional suggestion hint to stderr.
fn display_error(err: &VolError) {
    eprintln!("error: {}", err);
    if let Some(suggestion) = err.suggestion() {
        eprintln!("  hint: {}", suggestion);
    }
}
