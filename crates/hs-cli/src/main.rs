use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hs_cli::commands::{events, import, status, sync, watch};
use hs_cli::{Cli, Commands, Config};

/// Load config and ensure the database directory exists.
fn load_config(cli: &Cli) -> Result<Config> {
    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match &cli.command {
        Some(Commands::Import(args)) => {
            let config = load_config(&cli)?;
            let inserted = import::run(args, &config)?;
            println!("Imported {inserted} events");
        }
        Some(Commands::Sync) => {
            let config = load_config(&cli)?;
            sync::run(&mut io::stdout(), &config)?;
        }
        Some(Commands::Watch) => {
            let config = load_config(&cli)?;
            watch::run(&config)?;
        }
        Some(Commands::Status) => {
            let config = load_config(&cli)?;
            status::run(&mut io::stdout(), &config)?;
        }
        Some(Commands::Events(args)) => {
            let config = load_config(&cli)?;
            let db = hs_db::Database::open(&config.database_path)
                .with_context(|| format!("failed to open {}", config.database_path.display()))?;
            events::run(&mut io::stdout().lock(), &db, args)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
