//! dappbuild - a build orchestrator for DApp front-end bundles.

#![allow(dead_code)]

mod cli;
mod config;
mod coordinator;
mod logger;
mod patch;
mod pipeline;
mod publish;
mod shutdown;
mod stager;
mod tools;
mod unit;
mod utils;
mod watch;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::DappConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    shutdown::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = DappConfig::load(&cli.config)?;
    debug!("config"; "workspace root {}", config.root.display());

    match &cli.command {
        Commands::Build { unit, serve } => cli::build::build_unit(&unit.dapp, &config, *serve),
        Commands::Clean { unit } => cli::build::clean_unit(&unit.dapp),
        Commands::Workspace { serve, only } => {
            cli::workspace::run_workspace(&config, *serve, only)
        }
        Commands::Docs { unit } => cli::docs::build_docs(&unit.dapp),
    }
}
