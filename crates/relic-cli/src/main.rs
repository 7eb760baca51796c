//! RELIC CLI - Reliability Incident Intelligence
//!
//! Investigation tooling over the incident knowledge graph.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

use commands::Cli;

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "relic=debug,relic_graph=debug,relic_analytics=debug,relic_schema=debug"
    } else {
        "relic=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    cli.execute().await
}
