//! Store connectivity status.

use anyhow::Result;
use colored::Colorize;

use relic_graph::GraphClient;

use crate::config::RelicConfig;

pub async fn execute(config: &RelicConfig) -> Result<()> {
    println!("{}", "RELIC store status".bold());
    println!("{}", "─".repeat(40));
    println!("{:<16} {}", "URI".bold(), config.graph.uri);
    println!("{:<16} {}", "Database".bold(), config.graph.database);

    match GraphClient::connect(&config.graph).await {
        Ok(client) => {
            println!("{:<16} {}", "Connection".bold(), "ok".green());
            let counts = client.counts().await?;
            println!("{:<16} {}", "Nodes".bold(), counts.nodes);
            println!("{:<16} {}", "Relationships".bold(), counts.relationships);
        }
        Err(err) => {
            println!("{:<16} {}", "Connection".bold(), "failed".red());
            println!("{err}");
        }
    }
    Ok(())
}
