//! Entity listings with optional filters and facility scoping.

use anyhow::{bail, Result};
use clap::Args;
use serde_json::Value;

use relic_schema::FieldMap;

use crate::commands::connect_compiler;
use crate::config::RelicConfig;
use crate::output;

#[derive(Args)]
pub struct ListArgs {
    /// Entity to list (e.g. Incident, RootCause)
    pub entity: String,

    /// Maximum number of rows
    #[arg(short, long, default_value = "25")]
    pub limit: i64,

    /// Field filter, repeatable (e.g. -f severity=Critical -f resolved=false)
    #[arg(short, long = "filter", value_name = "FIELD=VALUE")]
    pub filters: Vec<String>,

    /// Restrict to records tied to this facility id
    #[arg(long)]
    pub facility: Option<String>,
}

pub async fn execute(config: &RelicConfig, args: ListArgs) -> Result<()> {
    let compiler = connect_compiler(config).await?;
    let filters = parse_filters(&args.filters)?;

    let result = match &args.facility {
        Some(facility_id) => {
            let entity = match compiler.registry().entity(&args.entity) {
                Some(def) => def.name.clone(),
                None => bail!("Unknown entity '{}'", args.entity),
            };
            let Some(path) = config.analytics.scope_path(&entity) else {
                bail!("No facility scope is configured for '{}'", entity);
            };
            if filters.is_some() {
                bail!("--filter cannot be combined with --facility");
            }
            let value = Value::String(facility_id.clone());
            compiler
                .get_scoped_entities(&entity, path, &value, args.limit)
                .await
        }
        None => {
            compiler
                .get_entities(&args.entity, args.limit, filters.as_ref())
                .await
        }
    };

    if result.success {
        output::print_result_table(&result);
    } else {
        output::print_failure(&result);
    }
    Ok(())
}

/// Parse `FIELD=VALUE` pairs into a filter map. Values are read as JSON
/// when they parse (null, numbers, booleans, arrays, objects) and fall
/// back to plain strings otherwise, so `severity=Critical` and
/// `resolved=false` both mean what they look like.
fn parse_filters(raw: &[String]) -> Result<Option<FieldMap>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let mut map = FieldMap::new();
    for pair in raw {
        let Some((field, text)) = pair.split_once('=') else {
            bail!("Filter '{}' is not in FIELD=VALUE form", pair);
        };
        let field = field.trim();
        if field.is_empty() {
            bail!("Filter '{}' is missing a field name", pair);
        }
        let value = serde_json::from_str(text)
            .unwrap_or_else(|_| Value::String(text.to_string()));
        map.insert(field.to_string(), value);
    }
    Ok(Some(map))
}
