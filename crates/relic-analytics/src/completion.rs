//! Data completion analysis.
//!
//! A cell counts as complete when it is present, non-null, and not one
//! of the converter's missing-data markers (including the substituted
//! type defaults). The rate is computed over the full records-by-fields
//! grid in `metrics::completion_rate`.
//!
//! The stage view is a thin loop over the entity view. Both access
//! paths share one computation, so a stage's rate and its entity's rate
//! cannot drift apart.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use relic_graph::QueryCompiler;
use relic_schema::is_populated;

use crate::config::AnalyticsConfig;
use crate::metrics;

/// Completion of one scope's records.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRecord {
    pub scope_id: String,
    pub total_records: usize,
    pub completed_fields: usize,
    /// Size of the records-by-tracked-fields grid.
    pub total_fields: usize,
    /// Percentage in [0, 100].
    pub completion_rate: f64,
}

impl CompletionRecord {
    fn empty(scope_id: String) -> Self {
        Self {
            scope_id,
            total_records: 0,
            completed_fields: 0,
            total_fields: 0,
            completion_rate: 0.0,
        }
    }
}

/// Completion of one workflow stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageCompletion {
    pub stage: String,
    pub entity: String,
    pub completion: CompletionRecord,
}

/// Computes completion rates per entity and per workflow stage.
pub struct CompletionAnalyzer {
    compiler: Arc<QueryCompiler>,
    config: AnalyticsConfig,
}

impl CompletionAnalyzer {
    pub fn new(compiler: Arc<QueryCompiler>, config: AnalyticsConfig) -> Self {
        Self { compiler, config }
    }

    /// Completion over an entity's records, optionally scoped to one
    /// facility. Degrades to a zero-valued record on any failure.
    pub async fn entity_completion(&self, entity: &str, scope: Option<&str>) -> CompletionRecord {
        let scope_id = match scope {
            Some(value) => format!("{entity}@{value}"),
            None => entity.to_string(),
        };

        let Some(definition) = self.compiler.registry().entity(entity) else {
            warn!("Completion for unknown entity {} degraded to empty", entity);
            return CompletionRecord::empty(scope_id);
        };
        let entity_name = definition.name.clone();
        let tracked: Vec<String> = definition
            .tracked_fields()
            .into_iter()
            .map(String::from)
            .collect();

        let result = match scope {
            Some(value) => match self.config.scope_path(&entity_name) {
                Some(path) => {
                    self.compiler
                        .get_scoped_entities(
                            &entity_name,
                            path,
                            &Value::String(value.to_string()),
                            self.config.row_limit,
                        )
                        .await
                }
                None => {
                    warn!("No scope path configured for {}; ignoring scope", entity_name);
                    self.compiler
                        .get_entities(&entity_name, self.config.row_limit, None)
                        .await
                }
            },
            None => {
                self.compiler
                    .get_entities(&entity_name, self.config.row_limit, None)
                    .await
            }
        };

        if !result.success {
            warn!(
                "Completion query for {} degraded to empty: {:?}",
                entity_name, result.meta.error
            );
            return CompletionRecord::empty(scope_id);
        }

        let total_records = result.data.len();
        let completed_fields: usize = result
            .data
            .iter()
            .map(|row| {
                tracked
                    .iter()
                    .filter(|field| row.get(field.as_str()).is_some_and(is_populated))
                    .count()
            })
            .sum();

        CompletionRecord {
            scope_id,
            total_records,
            completed_fields,
            total_fields: total_records * tracked.len(),
            completion_rate: metrics::completion_rate(completed_fields, total_records, tracked.len()),
        }
    }

    /// Completion per configured workflow stage, in configuration order.
    /// Routes through [`Self::entity_completion`] for every stage.
    pub async fn stage_completion(&self, scope: Option<&str>) -> Vec<StageCompletion> {
        let mut stages = Vec::with_capacity(self.config.stages.len());
        for binding in &self.config.stages {
            let completion = self.entity_completion(&binding.entity, scope).await;
            stages.push(StageCompletion {
                stage: binding.stage.clone(),
                entity: binding.entity.clone(),
                completion,
            });
        }
        stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relic_graph::{make_row, StaticRunner};
    use relic_schema::SchemaRegistry;
    use serde_json::json;

    fn analyzer(runner: StaticRunner) -> (CompletionAnalyzer, Arc<StaticRunner>) {
        let runner = Arc::new(runner);
        let registry = Arc::new(SchemaRegistry::embedded_default().unwrap());
        let compiler = Arc::new(QueryCompiler::new(registry, runner.clone()));
        (
            CompletionAnalyzer::new(compiler, AnalyticsConfig::default()),
            runner,
        )
    }

    /// 7 tracked Incident fields. First row fully populated, second has
    /// three real values among nulls, markers and absent fields.
    fn incident_rows() -> Vec<relic_schema::FieldMap> {
        vec![
            make_row([
                ("incident_id", json!("INC-001")),
                ("title", json!("Pump trip")),
                ("description", json!("Seal failed under load")),
                ("severity", json!("High")),
                ("status", json!("Closed")),
                ("occurred_on", json!("2024-01-15")),
                ("resolved", json!(true)),
                ("downtime_minutes", json!(90)),
            ]),
            make_row([
                ("incident_id", json!("INC-002")),
                ("title", json!("Valve leak")),
                ("description", json!("Not specified")),
                ("severity", json!("DATA_NOT_AVAILABLE")),
                ("status", json!("Open")),
                ("occurred_on", Value::Null),
                ("resolved", json!(false)),
            ]),
        ]
    }

    #[tokio::test]
    async fn test_entity_completion_counts_grid_cells() {
        let (analyzer, _) =
            analyzer(StaticRunner::new().stub("MATCH (n:Incident)", incident_rows()));
        let record = analyzer.entity_completion("Incident", None).await;

        // Row 1: 7 of 7. Row 2: title, status, resolved; the defaults,
        // the null and the absent downtime are incomplete.
        assert_eq!(record.total_records, 2);
        assert_eq!(record.completed_fields, 10);
        assert_eq!(record.total_fields, 14);
        assert_eq!(record.completion_rate, metrics::completion_rate(10, 2, 7));
        assert_eq!(record.scope_id, "Incident");
    }

    #[tokio::test]
    async fn test_zero_records_is_zero_not_error() {
        let (analyzer, _) = analyzer(StaticRunner::new());
        let record = analyzer.entity_completion("Incident", None).await;
        assert_eq!(record.total_records, 0);
        assert_eq!(record.completion_rate, 0.0);
    }

    #[tokio::test]
    async fn test_unknown_entity_degrades_to_empty() {
        let (analyzer, _) = analyzer(StaticRunner::new());
        let record = analyzer.entity_completion("Widget", None).await;
        assert_eq!(record.scope_id, "Widget");
        assert_eq!(record.completion_rate, 0.0);
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_empty() {
        let (analyzer, _) = analyzer(StaticRunner::failing("bolt refused"));
        let record = analyzer.entity_completion("Incident", None).await;
        assert_eq!(record.completion_rate, 0.0);
        assert_eq!(record.total_records, 0);
    }

    #[tokio::test]
    async fn test_scoped_completion_routes_through_scope_path() {
        let (analyzer, runner) = analyzer(StaticRunner::new());
        let record = analyzer
            .entity_completion("Incident", Some("FAC-001"))
            .await;
        assert_eq!(record.scope_id, "Incident@FAC-001");

        let executed = runner.executed();
        let text = &executed[0].text;
        assert!(text.contains("[:OCCURRED_AT]->(s1:Facility)"));
        assert!(text.contains("s1.facility_id = $p0"));
        assert!(!text.contains("FAC-001"));
    }

    fn second_dataset() -> StaticRunner {
        StaticRunner::new()
            .stub(
                "MATCH (n:Incident)",
                vec![make_row([
                    ("incident_id", json!("INC-010")),
                    ("title", json!("Compressor stall")),
                    ("description", json!("Surge during restart")),
                    ("severity", json!("Critical")),
                    ("status", json!("Closed")),
                    ("occurred_on", json!("2024-03-02")),
                    ("resolved", json!(true)),
                    ("downtime_minutes", json!(240)),
                ])],
            )
            .stub(
                "MATCH (n:RootCause)",
                vec![
                    make_row([
                        ("cause_id", json!("RC-010")),
                        ("title", json!("N/A")),
                        ("category", Value::Null),
                        ("analysis", json!("Not specified")),
                        ("confirmed", Value::Null),
                    ]),
                    make_row([("cause_id", json!("RC-011"))]),
                ],
            )
            .stub(
                "MATCH (n:ActionPlan)",
                vec![make_row([
                    ("plan_id", json!("CAP-010")),
                    ("title", json!("Review restart procedure")),
                    ("status", Value::Null),
                    ("due_on", Value::Null),
                    ("effective", Value::Null),
                    ("owner", Value::Null),
                ])],
            )
    }

    /// Stage and entity access paths must agree on the same dataset.
    /// Checked across two fixture datasets and every configured stage.
    #[tokio::test]
    async fn test_stage_and_entity_paths_agree() {
        let first = StaticRunner::new()
            .stub("MATCH (n:Incident)", incident_rows())
            .stub(
                "MATCH (n:RootCause)",
                vec![make_row([
                    ("cause_id", json!("RC-001")),
                    ("title", json!("Seal wear")),
                    ("category", json!("Mechanical")),
                    ("analysis", Value::Null),
                    ("confirmed", json!("N/A")),
                ])],
            )
            .stub(
                "MATCH (n:ActionPlan)",
                vec![
                    make_row([
                        ("plan_id", json!("CAP-001")),
                        ("title", json!("Replace seal batch")),
                        ("status", json!("In Progress")),
                        ("due_on", json!("2024-02-01")),
                        ("effective", Value::Null),
                        ("owner", json!("Maintenance")),
                    ]),
                    make_row([
                        ("plan_id", json!("CAP-002")),
                        ("title", json!("Not Available")),
                        ("status", json!("Open")),
                        ("due_on", Value::Null),
                        ("effective", Value::Null),
                        ("owner", Value::Null),
                    ]),
                ],
            );

        let mut checked = 0;
        for runner in [first, second_dataset()] {
            let (analyzer, _) = analyzer(runner);
            let stages = analyzer.stage_completion(None).await;
            assert_eq!(stages.len(), 3);
            for stage in stages {
                let direct = analyzer.entity_completion(&stage.entity, None).await;
                let drift =
                    (stage.completion.completion_rate - direct.completion_rate).abs();
                assert!(
                    drift <= 0.1,
                    "stage {} drifted {} points from entity view",
                    stage.stage,
                    drift
                );
                checked += 1;
            }
        }
        assert!(checked >= 5);
    }
}
