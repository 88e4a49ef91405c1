// SPDX-License-Identifier: MIT

//! annobatch - batch annotation orchestrator CLI.

mod commands;
mod config;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "annobatch", version, about = "Batch annotation orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one batch of files through the scheduler.
    Run(commands::run::RunArgs),
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => commands::run::handle(args).await,
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
