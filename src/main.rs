//! Autoreview CLI entry point.

use autoreview::cli::{self, Cli, Commands, EXIT_ERROR};
use autoreview::logging;
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Analyze(args) => cli::run_analyze(args, config).await,
        Commands::Scan(args) => cli::run_scan(args, config).await,
        Commands::Cache(args) => cli::run_cache(args, config).await,
        Commands::Init(args) => cli::run_init(args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
