//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use relic_graph::{GraphClient, QueryCompiler};

use crate::config::RelicConfig;

pub mod count;
pub mod list;
pub mod query;
pub mod report;
pub mod schema;
pub mod status;

/// Reliability intelligence over the incident knowledge graph.
#[derive(Parser)]
#[command(name = "relic")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file (defaults to ./relic.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show store connectivity and graph totals
    Status,

    /// Inspect the loaded schema
    Schema,

    /// Count nodes per entity
    Count {
        /// Entity name; counts every declared entity when omitted
        entity: Option<String>,
    },

    /// List entity records
    List(list::ListArgs),

    /// Validate and run an ad-hoc read-only query
    Query {
        /// Cypher query text
        query: String,
    },

    /// Analytics reports
    #[command(subcommand)]
    Report(report::ReportCommands),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = RelicConfig::load(self.config.as_deref())?;

        match self.command {
            Commands::Status => status::execute(&config).await,
            Commands::Schema => schema::execute(&config),
            Commands::Count { entity } => count::execute(&config, entity.as_deref()).await,
            Commands::List(args) => list::execute(&config, args).await,
            Commands::Query { query } => query::execute(&config, &query).await,
            Commands::Report(cmd) => report::execute(&config, cmd).await,
        }
    }
}

/// Load the schema, connect to the store, and build the compiler every
/// online command runs through.
pub(crate) async fn connect_compiler(config: &RelicConfig) -> Result<Arc<QueryCompiler>> {
    let registry = Arc::new(config.registry()?);
    let client = GraphClient::connect(&config.graph).await?;
    Ok(Arc::new(QueryCompiler::new(registry, Arc::new(client))))
}
