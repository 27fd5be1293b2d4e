//! `cdc-bridge`: mirrors change-data-capture topics into a versioned
//! wide-column store.

mod cmd;
mod config;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::{Cli, Commands};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let result = match Cli::parse().command {
        Commands::Run(args) => cmd::run::run(args).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
