//! Ad-hoc read query execution.

use anyhow::Result;
use colored::Colorize;

use relic_graph::{run_adhoc, AdHocOutcome};

use crate::commands::connect_compiler;
use crate::config::RelicConfig;
use crate::output;

pub async fn execute(config: &RelicConfig, query: &str) -> Result<()> {
    let validator = config.validator();

    // Check before connecting so a rejected query never costs a session.
    let verdict = validator.check(query);
    if !verdict.is_valid {
        println!("{} {}", "Rejected:".red().bold(), verdict.message);
        return Ok(());
    }

    let compiler = connect_compiler(config).await?;
    match run_adhoc(&validator, &compiler, query).await {
        AdHocOutcome::Rejected { reason } => {
            println!("{} {}", "Rejected:".red().bold(), reason);
        }
        AdHocOutcome::Executed(result) => {
            if result.success {
                output::print_result_table(&result);
            } else {
                output::print_failure(&result);
            }
        }
    }
    Ok(())
}
