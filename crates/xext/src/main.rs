//! xext CLI - install and manage extensions from the terminal
//!
//! This is the main entry point for the xext command-line interface.

mod cli;
mod commands;
mod host;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};
use host::Host;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let host = Host::open(&cli).await?;

    match cli.command {
        Commands::List(args) => commands::list::run(&host, args),
        Commands::Search(args) => commands::search::run(&host, args),
        Commands::Info(args) => commands::info::run(&host, args).await,
        Commands::Install(args) => commands::install::install(&host, args).await,
        Commands::Dev(args) => commands::install::dev(&host, args).await,
        Commands::Reload(args) => commands::install::reload(&host, args).await,
        Commands::Uninstall(args) => commands::install::uninstall(&host, args).await,
        Commands::Enable(args) => commands::toggle::run(&host, args, false),
        Commands::Disable(args) => commands::toggle::run(&host, args, true),
        Commands::Theme(cmd) => commands::theme::run(&host, cmd),
        Commands::Sync(args) => commands::sync::run(&host, args).await,
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so that --json output stays parseable
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
