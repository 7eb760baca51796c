//! Analyzer configuration.
//!
//! Defaults target the embedded incident schema; deployments with their
//! own schema document override the bindings here. Everything is plain
//! data so the whole block deserializes from the TOML config file.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use relic_graph::{ChainScope, Direction, ScopeStep};

/// One workflow stage bound to the entity that carries its records.
#[derive(Debug, Clone, Deserialize)]
pub struct StageBinding {
    pub stage: String,
    pub entity: String,
}

/// Chain settings for causal pattern analysis.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CausalConfig {
    /// Entity the chain starts from.
    pub start: String,
    /// Relation to the identity-bearing primary cause.
    pub primary_relation: String,
    /// Relation to the optional secondary cause.
    pub secondary_relation: String,
    /// Entity both relations point at.
    pub cause_entity: String,
    /// Field used as the cause label.
    pub label_field: String,
    /// Field used as the cause category.
    pub category_field: String,
    /// Minimum frequency for `high_frequency_patterns`.
    pub high_frequency_threshold: i64,
}

impl Default for CausalConfig {
    fn default() -> Self {
        Self {
            start: "Incident".to_string(),
            primary_relation: "CAUSED_BY".to_string(),
            secondary_relation: "CONTRIBUTED_BY".to_string(),
            cause_entity: "RootCause".to_string(),
            label_field: "title".to_string(),
            category_field: "category".to_string(),
            high_frequency_threshold: 5,
        }
    }
}

/// Entities and relation used for cross-facility comparison.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    pub facility_entity: String,
    pub incident_entity: String,
    pub link_relation: String,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            facility_entity: "Facility".to_string(),
            incident_entity: "Incident".to_string(),
            link_relation: "OCCURRED_AT".to_string(),
        }
    }
}

/// Shared analyzer settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Workflow stages in reporting order.
    pub stages: Vec<StageBinding>,
    pub causal: CausalConfig,
    pub comparison: ComparisonConfig,
    /// Per-entity relationship path from the entity to the scope filter
    /// (the facility). An empty path scopes an entity to itself.
    pub scope_paths: HashMap<String, Vec<ScopeStep>>,
    /// Upper bound on rows fetched per analytic query.
    pub row_limit: i64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        let step = |direction, relation: &str, entity: &str| ScopeStep {
            direction,
            relation: relation.to_string(),
            entity: entity.to_string(),
        };

        let mut scope_paths = HashMap::new();
        scope_paths.insert(
            "Incident".to_string(),
            vec![step(Direction::Forward, "OCCURRED_AT", "Facility")],
        );
        scope_paths.insert(
            "RootCause".to_string(),
            vec![
                step(Direction::Reverse, "CAUSED_BY", "Incident"),
                step(Direction::Forward, "OCCURRED_AT", "Facility"),
            ],
        );
        scope_paths.insert(
            "ActionPlan".to_string(),
            vec![
                step(Direction::Reverse, "MITIGATED_BY", "RootCause"),
                step(Direction::Reverse, "CAUSED_BY", "Incident"),
                step(Direction::Forward, "OCCURRED_AT", "Facility"),
            ],
        );
        scope_paths.insert("Facility".to_string(), Vec::new());

        Self {
            stages: vec![
                StageBinding {
                    stage: "intake".to_string(),
                    entity: "Incident".to_string(),
                },
                StageBinding {
                    stage: "analysis".to_string(),
                    entity: "RootCause".to_string(),
                },
                StageBinding {
                    stage: "remediation".to_string(),
                    entity: "ActionPlan".to_string(),
                },
            ],
            causal: CausalConfig::default(),
            comparison: ComparisonConfig::default(),
            scope_paths,
            row_limit: 5000,
        }
    }
}

impl AnalyticsConfig {
    /// Scope path for an entity; entities without a configured path
    /// cannot be facility-scoped and fall back to unscoped queries.
    pub fn scope_path(&self, entity: &str) -> Option<&[ScopeStep]> {
        self.scope_paths.get(entity).map(Vec::as_slice)
    }

    /// Scope restriction for a chain query starting at `entity`. `None`
    /// when no non-empty path is configured; callers then run unscoped.
    pub fn chain_scope(&self, entity: &str, value: &str) -> Option<ChainScope> {
        let steps = self.scope_path(entity)?;
        if steps.is_empty() {
            return None;
        }
        Some(ChainScope {
            steps: steps.to_vec(),
            value: Value::String(value.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_stage_entity() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.stages.len(), 3);
        for binding in &config.stages {
            assert!(
                config.scope_path(&binding.entity).is_some(),
                "{} has no scope path",
                binding.entity
            );
        }
        assert_eq!(config.row_limit, 5000);
        assert_eq!(config.causal.high_frequency_threshold, 5);
    }

    #[test]
    fn test_deserializes_partial_document() {
        let config: AnalyticsConfig =
            serde_json::from_str(r#"{ "row_limit": 200 }"#).unwrap();
        assert_eq!(config.row_limit, 200);
        assert_eq!(config.causal.start, "Incident");
    }

    #[test]
    fn test_scope_step_deserializes_direction() {
        let config: AnalyticsConfig = serde_json::from_str(
            r#"{ "scope_paths": { "Incident": [
                { "direction": "forward", "relation": "OCCURRED_AT", "entity": "Facility" }
            ] } }"#,
        )
        .unwrap();
        let path = config.scope_path("Incident").unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].direction, Direction::Forward);
    }
}
