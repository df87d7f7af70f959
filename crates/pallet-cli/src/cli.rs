//! CLI argument definitions for Pallet.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "pallet",
    version,
    about = "Resolve package targets into an ordered install plan",
    long_about = "Pallet decides what has to be installed, kept, removed or left alone \
                  for a set of targets, and orders the resulting jobs."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve targets and print the plan
    Resolve {
        /// Package universe (TOML)
        #[arg(short, long, env = "PALLET_UNIVERSE")]
        universe: PathBuf,
        /// Resolver configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write the serialised plan here
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print every resolution and job
        #[arg(long)]
        dump: bool,
        /// Targets: a spec, `!spec` to block, or `@set`
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Print a previously written plan
    Show {
        /// Package universe the plan was made against
        #[arg(short, long, env = "PALLET_UNIVERSE")]
        universe: PathBuf,
        /// Plan file written by `pallet resolve --output`
        plan: PathBuf,
    },

    /// Load a universe and report what it contains
    Check {
        /// Package universe (TOML)
        #[arg(short, long, env = "PALLET_UNIVERSE")]
        universe: PathBuf,
    },
}

/// Parse command-line arguments.
pub fn parse() -> Cli {
    Cli::parse()
}
