mod archive;
mod cache;
mod cli;
mod config;
mod download;
mod error;
mod executor;
mod interpreter;
mod manager;
mod platform;
mod tools;
mod urlrewrite;
mod version;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_filter() -> &'static str {
    let verbose = std::env::var("MVX_VERBOSE")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if verbose {
        "debug"
    } else {
        "info"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter())))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    cli.run().await.map_err(|e| anyhow::anyhow!(e))
}
