//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Extension manager - acquire, load and schedule plugin packages
#[derive(Parser, Debug)]
#[command(name = "extman")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Host configuration file (.json, .toml or .yaml) with an `Extensions` section
    #[arg(short, long, global = true, env = "EXTMAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Apply the schedule, acquire configured packages and load them
    Load,

    /// Browse packages offered by searchable sources
    List {
        #[arg(long, default_value_t = 0)]
        skip: usize,

        #[arg(long, default_value_t = 20)]
        take: usize,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show one package
    Show {
        id: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List packages installed in the plugins directory
    Installed,

    /// Inspect or change the install schedule
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Delete the plugins, dependencies and cache directories
    Reset,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleAction {
    /// Install a package on the next load
    Install {
        id: String,

        /// Pin a version instead of taking the latest
        #[arg(long)]
        version: Option<String>,
    },

    /// Uninstall a package on the next load
    Uninstall { id: String },

    /// Print the schedule
    Show,

    /// Discard the schedule
    Clear,

    /// Whether a package is scheduled
    Status { id: String },
}
