//! Distribution breakdowns.
//!
//! Groups an entity's records by a category field and reports each
//! category's share of the total, either by record count or by a summed
//! numeric measure. Category order is the store's ranked order as
//! returned, preserved stably; no re-sorting by name.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use relic_graph::{Aggregate, GroupKey, QueryCompiler};

use crate::boundary;
use crate::config::AnalyticsConfig;
use crate::metrics;

/// One category's slice of a breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryShare {
    pub category: String,
    /// Record count or summed measure, depending on the breakdown.
    pub amount: f64,
    /// Share of the total in [0, 100], one decimal.
    pub percentage: f64,
}

/// Computes per-category shares of counts and numeric measures.
pub struct DistributionAnalyzer {
    compiler: Arc<QueryCompiler>,
    config: AnalyticsConfig,
}

impl DistributionAnalyzer {
    pub fn new(compiler: Arc<QueryCompiler>, config: AnalyticsConfig) -> Self {
        Self { compiler, config }
    }

    /// Record counts per value of `field`, with percentage shares.
    pub async fn category_breakdown(
        &self,
        entity: &str,
        field: &str,
        scope: Option<&str>,
    ) -> Vec<CategoryShare> {
        self.breakdown(entity, field, None, scope).await
    }

    /// Sum of `measure` per value of `field`, with percentage shares.
    pub async fn measure_breakdown(
        &self,
        entity: &str,
        field: &str,
        measure: &str,
        scope: Option<&str>,
    ) -> Vec<CategoryShare> {
        self.breakdown(entity, field, Some(measure), scope).await
    }

    async fn breakdown(
        &self,
        entity: &str,
        field: &str,
        measure: Option<&str>,
        scope: Option<&str>,
    ) -> Vec<CategoryShare> {
        let groups = [GroupKey {
            hop: 0,
            field: field.to_string(),
            alias: "category".to_string(),
            identity: true,
        }];
        let (aggregate, value_column) = match measure {
            Some(measure) => (
                Aggregate::Sum {
                    hop: 0,
                    field: measure.to_string(),
                },
                "total",
            ),
            None => (Aggregate::Count, "frequency"),
        };

        let chain_scope = scope.and_then(|value| self.config.chain_scope(entity, value));
        let result = self
            .compiler
            .get_chain_groups(
                entity,
                chain_scope.as_ref(),
                &[],
                &groups,
                aggregate,
                self.config.row_limit,
            )
            .await;
        if !result.success {
            warn!(
                "Breakdown of {} by {} degraded to empty: {:?}",
                entity, field, result.meta.error
            );
        }

        let rows = boundary::share_rows(&result, "category", value_column);
        let total: f64 = rows.iter().map(|r| r.amount).sum();
        rows.into_iter()
            .map(|row| CategoryShare {
                percentage: metrics::percentage(row.amount, total),
                category: row.key,
                amount: row.amount,
            })
            .collect()
    }
}
