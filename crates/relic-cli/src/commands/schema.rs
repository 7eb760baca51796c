//! Schema inspection. Works offline; nothing here touches the store.

use anyhow::Result;
use colored::Colorize;

use crate::config::RelicConfig;

pub fn execute(config: &RelicConfig) -> Result<()> {
    let registry = config.registry()?;

    println!("{}", "Entities".bold());
    for entity in registry.entities() {
        let pk = registry.primary_key(&entity.name).unwrap_or_default();
        println!(
            "  {} {}",
            entity.name.cyan().bold(),
            format!("(primary key: {pk})").dimmed()
        );
        for property in &entity.properties {
            let marker = if property.primary_key { " *" } else { "" };
            println!("    {:<20} {}{}", property.name, property.ty.as_str(), marker);
        }
    }

    println!();
    println!("{}", "Relationships".bold());
    for relationship in registry.relationships() {
        println!(
            "  ({})-[:{}]->({})",
            relationship.from,
            relationship.rel_type.yellow(),
            relationship.to
        );
    }

    let mapped: Vec<&str> = registry
        .entities()
        .iter()
        .map(|e| e.name.as_str())
        .filter(|name| registry.mapping_for(name).is_some())
        .collect();
    if !mapped.is_empty() {
        println!();
        println!(
            "{} {}",
            "Source mappings:".bold(),
            mapped.join(", ")
        );
    }

    Ok(())
}
