//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// DApp front-end build orchestrator
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: dappbuild.toml, searched upward)
    #[arg(short = 'C', long, global = true, default_value = "dappbuild.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build one dapp: stage, compile, style, bundle, publish
    #[command(visible_alias = "b", alias = "dapp")]
    Build {
        #[command(flatten)]
        unit: UnitArgs,

        /// Keep watching `src` and `dbcp.json`, rebuilding on change
        #[arg(short, long)]
        serve: bool,
    },

    /// Delete a dapp's .tmp and build directories and its dist contents
    #[command(visible_alias = "c")]
    Clean {
        #[command(flatten)]
        unit: UnitArgs,
    },

    /// Run the configured sub-builds and every dapp under `dapps`
    #[command(visible_alias = "w")]
    Workspace {
        /// Watch and rebuild instead of running once
        #[arg(short, long)]
        serve: bool,

        /// Limit to these builds (by name)
        #[arg(short, long, value_delimiter = ',')]
        only: Vec<String>,
    },

    /// Concatenate a dapp's README into documentation/README.md
    #[command(visible_alias = "d")]
    Docs {
        #[command(flatten)]
        unit: UnitArgs,
    },
}

/// Selects the dapp a command works on.
#[derive(clap::Args, Debug, Clone)]
pub struct UnitArgs {
    /// Dapp directory (holds dbcp.json and src/)
    #[arg(long, default_value = ".", value_hint = clap::ValueHint::DirPath)]
    pub dapp: PathBuf,
}

#[allow(unused)]
impl Cli {
    pub const fn is_serve(&self) -> bool {
        matches!(
            self.command,
            Commands::Build { serve: true, .. } | Commands::Workspace { serve: true, .. }
        )
    }
}
