//! # seogen
//!
//! This is the main entry point for the `seogen` command-line interface.
//! The binary is a thin entrypoint: all logic lives in the `seogen_cli` library.

use anyhow::{Context, Result};
use clap::Parser;
use seogen_cli::{config::get_config, init_tracing, run, Cli};

// --- Main Application Entry ---

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env and parse CLI arguments
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // 2. Load configuration and set up logging
    let config = get_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = init_tracing(config.log_dir.as_deref(), cli.command.name())? {
        eprintln!("Logging to {}", path.display());
    }

    // 3. Run the command; only setup failures end up here
    if let Err(e) = run(cli, config).await {
        eprintln!("[seogen error] Failed to execute command: {e:?}");
        std::process::exit(1);
    }

    Ok(())
}
