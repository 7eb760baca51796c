//! Causal pattern analysis.
//!
//! Runs the canned optional-chain aggregation (incident to primary and
//! secondary cause), folds the grouped rows into (primary cause,
//! category) patterns, and ranks them by frequency. The chain's null
//! guards are emitted by the query builder; the row boundary drops any
//! null-identity stragglers from older data.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use relic_graph::{Aggregate, ChainHop, GroupKey, QueryCompiler};

use crate::boundary::{self, CausalRow};
use crate::config::AnalyticsConfig;

/// A ranked (root cause, category) pattern.
#[derive(Debug, Clone, Serialize)]
pub struct CausalPattern {
    pub primary_cause: String,
    /// Most frequent co-contributor seen with this pattern, if any.
    pub secondary_cause: Option<String>,
    pub category: String,
    pub frequency: i64,
}

/// Computes ranked causal patterns across incidents.
pub struct CausalAnalyzer {
    compiler: Arc<QueryCompiler>,
    config: AnalyticsConfig,
}

impl CausalAnalyzer {
    pub fn new(compiler: Arc<QueryCompiler>, config: AnalyticsConfig) -> Self {
        Self { compiler, config }
    }

    /// Patterns ranked descending by frequency; ties keep first-seen
    /// order. Optionally scoped to one facility. Degrades to empty.
    pub async fn causal_patterns(&self, scope: Option<&str>) -> Vec<CausalPattern> {
        let causal = &self.config.causal;
        let hops = [
            ChainHop {
                relation: causal.primary_relation.clone(),
                entity: causal.cause_entity.clone(),
                identity: true,
            },
            ChainHop {
                relation: causal.secondary_relation.clone(),
                entity: causal.cause_entity.clone(),
                identity: false,
            },
        ];
        let groups = [
            GroupKey {
                hop: 1,
                field: causal.label_field.clone(),
                alias: "primary_cause".to_string(),
                identity: true,
            },
            GroupKey {
                hop: 2,
                field: causal.label_field.clone(),
                alias: "secondary_cause".to_string(),
                identity: false,
            },
            GroupKey {
                hop: 1,
                field: causal.category_field.clone(),
                alias: "category".to_string(),
                identity: true,
            },
        ];

        let chain_scope = scope.and_then(|value| self.config.chain_scope(&causal.start, value));
        let result = self
            .compiler
            .get_chain_groups(
                &causal.start,
                chain_scope.as_ref(),
                &hops,
                &groups,
                Aggregate::Count,
                self.config.row_limit,
            )
            .await;
        if !result.success {
            warn!("Causal patterns degraded to empty: {:?}", result.meta.error);
        }

        rank(boundary::causal_rows(&result))
    }

    /// Patterns at or above the configured frequency threshold.
    pub async fn high_frequency_patterns(&self, scope: Option<&str>) -> Vec<CausalPattern> {
        let threshold = self.config.causal.high_frequency_threshold;
        self.causal_patterns(scope)
            .await
            .into_iter()
            .filter(|p| p.frequency >= threshold)
            .collect()
    }

    /// Distinct primary causes over total patterns; 0.0 when empty.
    pub async fn pattern_diversity(&self, scope: Option<&str>) -> f64 {
        let patterns = self.causal_patterns(scope).await;
        if patterns.is_empty() {
            return 0.0;
        }
        let distinct: HashSet<&str> = patterns.iter().map(|p| p.primary_cause.as_str()).collect();
        distinct.len() as f64 / patterns.len() as f64
    }
}

/// Fold chain rows into (primary, category) patterns, summing frequency
/// across secondary causes. Rows arrive frequency-ranked, so the first
/// non-null secondary seen is the most frequent co-contributor.
fn rank(rows: Vec<CausalRow>) -> Vec<CausalPattern> {
    let mut patterns: Vec<CausalPattern> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for row in rows {
        let key = (row.primary.clone(), row.category.clone());
        match index.get(&key) {
            Some(&at) => {
                patterns[at].frequency += row.frequency;
                if patterns[at].secondary_cause.is_none() {
                    patterns[at].secondary_cause = row.secondary;
                }
            }
            None => {
                index.insert(key, patterns.len());
                patterns.push(CausalPattern {
                    primary_cause: row.primary,
                    secondary_cause: row.secondary,
                    category: row.category,
                    frequency: row.frequency,
                });
            }
        }
    }

    // Stable sort keeps first-seen order within equal frequencies.
    patterns.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    patterns
}
