//! CLI configuration.
//!
//! Loaded from a TOML file (`--config`, else `relic.toml` in the working
//! directory, else built-in defaults), with environment overrides for
//! the connection settings so credentials can stay out of the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use relic_analytics::AnalyticsConfig;
use relic_graph::{GraphConfig, QueryValidator};
use relic_schema::SchemaRegistry;

/// Schema document location; the embedded default is used when unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub path: Option<PathBuf>,
}

/// Ad-hoc validator limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub max_length: usize,
    pub max_limit: i64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_length: 4000,
            max_limit: 500,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelicConfig {
    pub graph: GraphConfig,
    pub schema: SchemaConfig,
    pub validator: ValidatorConfig,
    pub analytics: AnalyticsConfig,
}

impl RelicConfig {
    /// Load configuration, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new("relic.toml");
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// `RELIC_GRAPH_URI`, `RELIC_GRAPH_USER` and `RELIC_GRAPH_PASSWORD`
    /// override the file.
    fn apply_env(&mut self) {
        if let Ok(uri) = std::env::var("RELIC_GRAPH_URI") {
            self.graph.uri = uri;
        }
        if let Ok(user) = std::env::var("RELIC_GRAPH_USER") {
            self.graph.user = user;
        }
        if let Ok(password) = std::env::var("RELIC_GRAPH_PASSWORD") {
            self.graph.password = password;
        }
    }

    /// Load the schema registry this configuration points at.
    pub fn registry(&self) -> Result<SchemaRegistry> {
        match &self.schema.path {
            Some(path) => SchemaRegistry::from_path(path)
                .with_context(|| format!("Failed to load schema from {}", path.display())),
            None => SchemaRegistry::embedded_default().context("Failed to load embedded schema"),
        }
    }

    pub fn validator(&self) -> QueryValidator {
        QueryValidator::new(self.validator.max_length, self.validator.max_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = RelicConfig::default();
        assert_eq!(config.graph.uri, "bolt://localhost:7687");
        assert_eq!(config.validator.max_limit, 500);
        assert!(config.schema.path.is_none());
    }

    #[test]
    fn test_parses_partial_toml() {
        let config: RelicConfig = toml::from_str(
            r#"
            [graph]
            uri = "bolt://graph.internal:7687"

            [validator]
            max_limit = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.graph.uri, "bolt://graph.internal:7687");
        assert_eq!(config.graph.user, "neo4j");
        assert_eq!(config.validator.max_limit, 100);
        assert_eq!(config.validator.max_length, 4000);
        assert_eq!(config.analytics.row_limit, 5000);
    }

    #[test]
    fn test_registry_uses_embedded_default() {
        let config = RelicConfig::default();
        let registry = config.registry().unwrap();
        assert!(registry.entity("Incident").is_some());
    }
}
