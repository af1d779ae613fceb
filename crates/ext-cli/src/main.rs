//! Extension manager CLI
//!
//! Hosts an extension manager configured from a file's `Extensions` section.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use context::HostContext;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute_command(cli))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
    tracing::debug!("Verbose mode enabled");
}

async fn execute_command(cli: Cli) -> Result<()> {
    let context = HostContext::open(cli.config.as_deref())?;
    match cli.command {
        Commands::Load => commands::run_load(&context).await,
        Commands::List { skip, take, json } => commands::run_list(&context, skip, take, json).await,
        Commands::Show { id, json } => commands::run_show(&context, &id, json).await,
        Commands::Installed => commands::run_installed(&context).await,
        Commands::Schedule { action } => commands::run_schedule(&context, action).await,
        Commands::Reset => commands::run_reset(&context).await,
    }
}
