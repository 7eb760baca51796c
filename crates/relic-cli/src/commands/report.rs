//! Analytics reports over the incident graph.

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;

use relic_analytics::{
    CausalAnalyzer, ComparisonAnalyzer, CompletionAnalyzer, DistributionAnalyzer,
};

use crate::commands::connect_compiler;
use crate::config::RelicConfig;
use crate::output;

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Field completion across the investigation workflow
    Completion {
        /// Restrict to records tied to this facility id
        #[arg(long)]
        facility: Option<String>,

        /// Report a single entity instead of every stage
        #[arg(long)]
        entity: Option<String>,
    },

    /// Ranked root-cause patterns with co-contributors
    Causes {
        /// Restrict to incidents at this facility id
        #[arg(long)]
        facility: Option<String>,

        /// Only patterns at or above the configured frequency threshold
        #[arg(long)]
        frequent: bool,
    },

    /// Distribution of an entity over one of its fields
    Breakdown {
        /// Entity to break down (e.g. Incident)
        entity: String,

        /// Field whose values form the categories
        field: String,

        /// Sum this numeric field instead of counting records
        #[arg(long)]
        measure: Option<String>,

        /// Restrict to records tied to this facility id
        #[arg(long)]
        facility: Option<String>,
    },

    /// Compare one facility against its peers
    Compare {
        /// Facility id to compare
        facility_id: String,

        /// Metric to compare: volume, completion, or all
        #[arg(long, default_value = "all")]
        metric: String,
    },
}

pub async fn execute(config: &RelicConfig, command: ReportCommands) -> Result<()> {
    let compiler = connect_compiler(config).await?;
    let analytics = config.analytics.clone();

    match command {
        ReportCommands::Completion { facility, entity } => {
            let analyzer = CompletionAnalyzer::new(compiler, analytics);
            let scope = facility.as_deref();
            match entity {
                Some(entity) => {
                    println!("{}", "Data completion".bold());
                    println!();
                    let record = analyzer.entity_completion(&entity, scope).await;
                    output::print_completion(&record);
                }
                None => {
                    println!("{}", "Workflow completion".bold());
                    println!();
                    let stages = analyzer.stage_completion(scope).await;
                    output::print_stages(&stages);
                }
            }
        }
        ReportCommands::Causes { facility, frequent } => {
            let analyzer = CausalAnalyzer::new(compiler, analytics);
            let scope = facility.as_deref();
            let patterns = if frequent {
                analyzer.high_frequency_patterns(scope).await
            } else {
                analyzer.causal_patterns(scope).await
            };
            println!("{}", "Causal patterns".bold());
            println!();
            output::print_patterns(&patterns);
            let diversity = analyzer.pattern_diversity(scope).await;
            println!("{}: {:.2}", "Pattern diversity".bold(), diversity);
        }
        ReportCommands::Breakdown {
            entity,
            field,
            measure,
            facility,
        } => {
            let analyzer = DistributionAnalyzer::new(compiler, analytics);
            let scope = facility.as_deref();
            let shares = match &measure {
                Some(measure) => {
                    println!("{} by {} (sum of {})", entity.bold(), field, measure);
                    analyzer.measure_breakdown(&entity, &field, measure, scope).await
                }
                None => {
                    println!("{} by {}", entity.bold(), field);
                    analyzer.category_breakdown(&entity, &field, scope).await
                }
            };
            println!();
            output::print_shares(&shares);
        }
        ReportCommands::Compare {
            facility_id,
            metric,
        } => {
            let analyzer = ComparisonAnalyzer::new(compiler, analytics);
            match metric.as_str() {
                "volume" => {
                    let comparison = analyzer.compare_incident_volume(&facility_id).await;
                    output::print_comparison(&comparison);
                }
                "completion" => {
                    let comparison = analyzer.compare_completion(&facility_id).await;
                    output::print_comparison(&comparison);
                }
                "all" => {
                    let volume = analyzer.compare_incident_volume(&facility_id).await;
                    output::print_comparison(&volume);
                    println!();
                    let completion = analyzer.compare_completion(&facility_id).await;
                    output::print_comparison(&completion);
                }
                other => bail!(
                    "Unknown metric '{}'; expected volume, completion, or all",
                    other
                ),
            }
        }
    }
    Ok(())
}
