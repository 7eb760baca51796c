//! Node counts per entity.

use anyhow::Result;
use colored::Colorize;

use crate::commands::connect_compiler;
use crate::config::RelicConfig;

pub async fn execute(config: &RelicConfig, entity: Option<&str>) -> Result<()> {
    let compiler = connect_compiler(config).await?;

    let names: Vec<String> = match entity {
        Some(name) => vec![name.to_string()],
        None => compiler
            .registry()
            .entities()
            .iter()
            .map(|e| e.name.clone())
            .collect(),
    };

    let mut total = 0;
    for name in &names {
        let count = compiler.get_entity_count(name).await;
        total += count;
        println!("{:<14} {}", name.cyan(), count);
    }
    if names.len() > 1 {
        println!("{}", "─".repeat(20));
        println!("{:<14} {}", "total".bold(), total);
    }

    Ok(())
}
