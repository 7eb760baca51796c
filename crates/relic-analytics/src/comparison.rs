//! Cross-facility comparison.
//!
//! Positions one facility against the arithmetic mean of its peers and
//! assigns a percentile rank, for incident volume and for data
//! completion. The completion side reuses `CompletionAnalyzer` per
//! facility, so compared rates are the same numbers the completion view
//! reports.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use relic_graph::{Aggregate, ChainHop, GroupKey, QueryCompiler};

use crate::boundary::{self, ShareRow};
use crate::completion::CompletionAnalyzer;
use crate::config::AnalyticsConfig;
use crate::metrics;

/// One facility positioned against its peers on a single metric.
#[derive(Debug, Clone, Serialize)]
pub struct EntityComparison {
    pub target_id: String,
    pub metric: String,
    pub target_value: f64,
    /// Mean over peers, target excluded.
    pub peer_mean: f64,
    pub peer_count: usize,
    /// `(peers strictly below + 1) / (peer count + 1) * 100`.
    pub percentile_rank: f64,
}

impl EntityComparison {
    fn degraded(target_id: &str, metric: &str) -> Self {
        Self {
            target_id: target_id.to_string(),
            metric: metric.to_string(),
            target_value: 0.0,
            peer_mean: 0.0,
            peer_count: 0,
            percentile_rank: 0.0,
        }
    }
}

/// Computes target-vs-peers comparisons across facilities.
pub struct ComparisonAnalyzer {
    compiler: Arc<QueryCompiler>,
    config: AnalyticsConfig,
}

impl ComparisonAnalyzer {
    pub fn new(compiler: Arc<QueryCompiler>, config: AnalyticsConfig) -> Self {
        Self { compiler, config }
    }

    /// Incident count at the target facility vs its peers.
    pub async fn compare_incident_volume(&self, facility_id: &str) -> EntityComparison {
        const METRIC: &str = "incident_volume";
        let comparison = &self.config.comparison;

        let Some(facility_pk) = self.compiler.registry().primary_key(&comparison.facility_entity)
        else {
            warn!(
                "Unknown facility entity {}; comparison degraded",
                comparison.facility_entity
            );
            return EntityComparison::degraded(facility_id, METRIC);
        };

        let hops = [ChainHop {
            relation: comparison.link_relation.clone(),
            entity: comparison.facility_entity.clone(),
            identity: true,
        }];
        let groups = [GroupKey {
            hop: 1,
            field: facility_pk,
            alias: "facility".to_string(),
            identity: true,
        }];
        let result = self
            .compiler
            .get_chain_groups(
                &comparison.incident_entity,
                None,
                &hops,
                &groups,
                Aggregate::Count,
                self.config.row_limit,
            )
            .await;
        if !result.success {
            warn!("Volume comparison degraded: {:?}", result.meta.error);
            return EntityComparison::degraded(facility_id, METRIC);
        }

        rank_against(
            facility_id,
            METRIC,
            boundary::share_rows(&result, "facility", "frequency"),
        )
    }

    /// Incident-record completion at the target facility vs its peers.
    pub async fn compare_completion(&self, facility_id: &str) -> EntityComparison {
        const METRIC: &str = "completion_rate";
        let comparison = &self.config.comparison;

        let facilities = self
            .compiler
            .get_entities(&comparison.facility_entity, self.config.row_limit, None)
            .await;
        if !facilities.success {
            warn!("Completion comparison degraded: {:?}", facilities.meta.error);
            return EntityComparison::degraded(facility_id, METRIC);
        }
        let Some(facility_pk) = self.compiler.registry().primary_key(&comparison.facility_entity)
        else {
            return EntityComparison::degraded(facility_id, METRIC);
        };

        let completion = CompletionAnalyzer::new(self.compiler.clone(), self.config.clone());
        let mut rows = Vec::with_capacity(facilities.data.len());
        for row in &facilities.data {
            let Some(Value::String(id)) = row.get(facility_pk.as_str()) else {
                continue;
            };
            let record = completion
                .entity_completion(&comparison.incident_entity, Some(id.as_str()))
                .await;
            rows.push(ShareRow {
                key: id.clone(),
                amount: record.completion_rate,
            });
        }

        rank_against(facility_id, METRIC, rows)
    }
}

/// Split rows into the target and its peers, then position the target.
/// A target absent from the rows compares at value 0.
fn rank_against(target_id: &str, metric: &str, rows: Vec<ShareRow>) -> EntityComparison {
    let mut target_value = 0.0;
    let mut peers = Vec::with_capacity(rows.len());
    for row in rows {
        if row.key == target_id {
            target_value = row.amount;
        } else {
            peers.push(row.amount);
        }
    }

    let strictly_below = peers.iter().filter(|&&value| value < target_value).count();
    EntityComparison {
        target_id: target_id.to_string(),
        metric: metric.to_string(),
        target_value,
        peer_mean: metrics::round1(metrics::mean(&peers)),
        peer_count: peers.len(),
        percentile_rank: metrics::percentile_rank(strictly_below, peers.len()),
    }
}
