//! Schema-driven query compilation and execution.
//!
//! `QueryCompiler` turns registry lookups into parameterized Cypher and
//! runs it through the [`QueryRunner`] seam. Every public method returns
//! a [`QueryResult`] envelope; compile and transport errors are caught
//! here, logged, and folded into failure envelopes so callers never
//! handle a raw error. One execution attempt per query, no retries.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use relic_schema::{EntityDefinition, FieldMap, SchemaRegistry};

use crate::cypher::{CypherBuilder, Direction, GroupTerm, Ident, FILTER_NOT_NULL};
use crate::error::{GraphError, GraphResult};
use crate::result::QueryResult;
use crate::runner::{CompiledQuery, QueryRunner};

/// One non-optional step of a scope path.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeStep {
    pub direction: Direction,
    pub relation: String,
    pub entity: String,
}

/// A scope restriction: a relationship path from the start entity ending
/// in a primary-key equality on the final entity.
#[derive(Debug, Clone)]
pub struct ChainScope {
    pub steps: Vec<ScopeStep>,
    pub value: Value,
}

/// One optional hop of a chain aggregation.
///
/// `identity` hops feed row identity: their primary key gets the
/// post-hop null guard. Non-identity hops may bind null and their fields
/// surface as null columns.
#[derive(Debug, Clone)]
pub struct ChainHop {
    pub relation: String,
    pub entity: String,
    pub identity: bool,
}

/// One group key of a chain aggregation. `hop` 0 is the start entity,
/// `hop` N is the Nth optional hop.
#[derive(Debug, Clone)]
pub struct GroupKey {
    pub hop: usize,
    pub field: String,
    pub alias: String,
    pub identity: bool,
}

/// Aggregation applied per group.
#[derive(Debug, Clone)]
pub enum Aggregate {
    /// `count(start)`, projected as `frequency`.
    Count,
    /// `sum(coalesce(hop.field, 0))`, projected as `total`.
    Sum { hop: usize, field: String },
}

impl Aggregate {
    fn alias(&self) -> &'static str {
        match self {
            Aggregate::Count => "frequency",
            Aggregate::Sum { .. } => "total",
        }
    }
}

/// Compiles schema-shaped requests into Cypher and executes them.
pub struct QueryCompiler {
    registry: Arc<SchemaRegistry>,
    runner: Arc<dyn QueryRunner>,
}

impl QueryCompiler {
    pub fn new(registry: Arc<SchemaRegistry>, runner: Arc<dyn QueryRunner>) -> Self {
        Self { registry, runner }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Node count for an entity; 0 when the entity is unknown or the
    /// store is unreachable.
    pub async fn get_entity_count(&self, entity: &str) -> i64 {
        let outcome = self.count_query(entity).await;
        match outcome {
            Ok(n) => n,
            Err(err) => {
                warn!("Count for {} degraded to 0: {}", entity, err);
                0
            }
        }
    }

    /// Entity rows with optional field filters, ordered by primary key.
    pub async fn get_entities(
        &self,
        entity: &str,
        limit: i64,
        filters: Option<&FieldMap>,
    ) -> QueryResult {
        self.recover(entity, self.entities_query(entity, limit, filters).await)
    }

    /// Rows for a declared relationship, both endpoints' properties
    /// projected with `from_`/`to_` prefixes.
    pub async fn get_relationship_rows(
        &self,
        from: &str,
        relation: &str,
        to: &str,
        limit: i64,
    ) -> QueryResult {
        self.recover(
            relation,
            self.relationship_query(from, relation, to, limit).await,
        )
    }

    /// Entity rows restricted through a non-optional relationship path
    /// ending in a primary-key equality on the path's final entity.
    pub async fn get_scoped_entities(
        &self,
        entity: &str,
        path: &[ScopeStep],
        scope_value: &Value,
        limit: i64,
    ) -> QueryResult {
        self.recover(entity, self.scoped_query(entity, path, scope_value, limit).await)
    }

    /// Optional-chain traversal grouped on projected fields. The builder
    /// guards every identity hop and re-filters identity group keys
    /// after the grouping re-projection; callers cannot produce an
    /// unguarded grouped chain through this method.
    pub async fn get_chain_groups(
        &self,
        start: &str,
        scope: Option<&ChainScope>,
        hops: &[ChainHop],
        groups: &[GroupKey],
        aggregate: Aggregate,
        limit: i64,
    ) -> QueryResult {
        self.recover(
            start,
            self.chain_query(start, scope, hops, groups, aggregate, limit).await,
        )
    }

    /// Execute pre-built query text. The only entry point accepting raw
    /// Cypher; identifiers must come from trusted lookups and values
    /// must already be bound in `params`. Result columns are recovered
    /// from the `RETURN` clause.
    pub async fn execute_raw(&self, text: &str, params: FieldMap) -> QueryResult {
        let compiled = CompiledQuery {
            text: text.to_string(),
            params,
            columns: crate::cypher::return_columns(text),
        };
        match self.runner.run(&compiled).await {
            Ok(rows) => QueryResult::ok(rows),
            Err(err) => {
                warn!("Raw query degraded to failure envelope: {}", err);
                QueryResult::failure(err.to_string()).with_cypher(compiled.text)
            }
        }
    }

    // Compilation internals. These return GraphResult and are folded
    // into envelopes by the public wrappers above.

    fn recover(&self, label: &str, outcome: GraphResult<QueryResult>) -> QueryResult {
        match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!("Query for {} degraded to failure envelope: {}", label, err);
                QueryResult::failure(err.to_string())
            }
        }
    }

    fn entity_def(&self, name: &str) -> GraphResult<&EntityDefinition> {
        self.registry
            .entity(name)
            .ok_or_else(|| GraphError::UnknownEntity(name.to_string()))
    }

    fn label_of(&self, def: &EntityDefinition) -> GraphResult<Ident> {
        Ident::new(&def.name)
    }

    fn field_of(&self, def: &EntityDefinition, field: &str) -> GraphResult<Ident> {
        if def.property(field).is_none() {
            return Err(GraphError::InvalidIdentifier(format!(
                "unknown field '{}' on {}",
                field, def.name
            )));
        }
        Ident::new(field)
    }

    /// Primary key may be the `<entity_lower>_id` convention, which is
    /// not necessarily a declared property; only the charset is checked.
    fn pk_of(&self, def: &EntityDefinition) -> GraphResult<Ident> {
        let pk = self
            .registry
            .primary_key(&def.name)
            .ok_or_else(|| GraphError::UnknownEntity(def.name.clone()))?;
        Ident::new(&pk)
    }

    async fn count_query(&self, entity: &str) -> GraphResult<i64> {
        let def = self.entity_def(entity)?;
        let label = self.label_of(def)?;

        let mut builder = CypherBuilder::new();
        builder.match_node("n", &label);
        builder.return_fields(&[("count(n)".into(), "total".into())]);
        let compiled = builder.compile();

        debug!("Counting {}: {}", def.name, compiled.text);
        let rows = self.runner.run(&compiled).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("total"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    async fn entities_query(
        &self,
        entity: &str,
        limit: i64,
        filters: Option<&FieldMap>,
    ) -> GraphResult<QueryResult> {
        let def = self.entity_def(entity)?;
        let label = self.label_of(def)?;
        let pk = self.pk_of(def)?;

        let mut builder = CypherBuilder::new();
        builder.match_node("n", &label);
        if let Some(filters) = filters {
            let conditions = self.render_filters(&mut builder, def, "n", filters)?;
            builder.where_all(&conditions);
        }
        builder.return_fields(&self.projection(def, "n", "")?);
        builder.order_by(&[format!("n.{pk}")]);
        builder.limit(limit);
        let compiled = builder.compile();

        debug!("Listing {}: {}", def.name, compiled.text);
        let rows = self.runner.run(&compiled).await?;
        Ok(QueryResult::ok_for(def.name.clone(), rows))
    }

    async fn relationship_query(
        &self,
        from: &str,
        relation: &str,
        to: &str,
        limit: i64,
    ) -> GraphResult<QueryResult> {
        let from_def = self.entity_def(from)?;
        let to_def = self.entity_def(to)?;
        let declared = self
            .registry
            .relationship(&from_def.name, relation, &to_def.name)
            .ok_or_else(|| GraphError::UnknownRelationship {
                from: from_def.name.clone(),
                rel_type: relation.to_string(),
                to: to_def.name.clone(),
            })?;

        let from_label = self.label_of(from_def)?;
        let to_label = self.label_of(to_def)?;
        let rel = Ident::new(&declared.rel_type)?;
        let from_pk = self.pk_of(from_def)?;
        let to_pk = self.pk_of(to_def)?;

        let mut builder = CypherBuilder::new();
        builder.match_path(
            &format!("a:{from_label}"),
            &[(Direction::Forward, rel, "b".to_string(), to_label)],
        );
        let mut fields = self.projection(from_def, "a", "from_")?;
        fields.extend(self.projection(to_def, "b", "to_")?);
        builder.return_fields(&fields);
        builder.order_by(&[format!("a.{from_pk}"), format!("b.{to_pk}")]);
        builder.limit(limit);
        let compiled = builder.compile();

        debug!("Listing {}: {}", declared.rel_type, compiled.text);
        let rows = self.runner.run(&compiled).await?;
        Ok(QueryResult::ok_for(declared.rel_type.clone(), rows))
    }

    async fn scoped_query(
        &self,
        entity: &str,
        path: &[ScopeStep],
        scope_value: &Value,
        limit: i64,
    ) -> GraphResult<QueryResult> {
        let def = self.entity_def(entity)?;
        let label = self.label_of(def)?;
        let pk = self.pk_of(def)?;

        let mut builder = CypherBuilder::new();
        builder.match_node("n", &label);

        let mut steps = Vec::with_capacity(path.len());
        let mut last_def = def;
        for (i, step) in path.iter().enumerate() {
            let step_def = self.entity_def(&step.entity)?;
            steps.push((
                step.direction,
                Ident::new(&step.relation)?,
                format!("s{}", i + 1),
                self.label_of(step_def)?,
            ));
            last_def = step_def;
        }
        if steps.is_empty() {
            // An empty path scopes the entity to itself.
            let cond = builder.cond_eq("n", &pk, scope_value.clone());
            builder.where_all(&[cond]);
        } else {
            builder.match_path("n", &steps);
            let scope_pk = self.pk_of(last_def)?;
            let alias = format!("s{}", steps.len());
            let cond = builder.cond_eq(&alias, &scope_pk, scope_value.clone());
            builder.where_all(&[cond]);
            builder.with_distinct("n");
        }

        builder.return_fields(&self.projection(def, "n", "")?);
        builder.order_by(&[format!("n.{pk}")]);
        builder.limit(limit);
        let compiled = builder.compile();

        debug!("Listing scoped {}: {}", def.name, compiled.text);
        let rows = self.runner.run(&compiled).await?;
        Ok(QueryResult::ok_for(def.name.clone(), rows))
    }

    async fn chain_query(
        &self,
        start: &str,
        scope: Option<&ChainScope>,
        hops: &[ChainHop],
        groups: &[GroupKey],
        aggregate: Aggregate,
        limit: i64,
    ) -> GraphResult<QueryResult> {
        let start_def = self.entity_def(start)?;
        let start_label = self.label_of(start_def)?;

        let mut builder = CypherBuilder::new();
        builder.match_node("n0", &start_label);

        if let Some(scope) = scope {
            let mut steps = Vec::with_capacity(scope.steps.len());
            let mut last_def = start_def;
            for (i, step) in scope.steps.iter().enumerate() {
                let step_def = self.entity_def(&step.entity)?;
                steps.push((
                    step.direction,
                    Ident::new(&step.relation)?,
                    format!("s{}", i + 1),
                    self.label_of(step_def)?,
                ));
                last_def = step_def;
            }
            builder.match_path("n0", &steps);
            let scope_pk = self.pk_of(last_def)?;
            let alias = format!("s{}", steps.len());
            let cond = builder.cond_eq(&alias, &scope_pk, scope.value.clone());
            builder.where_all(&[cond]);
        }

        // Hop aliases are n1..nH; each hop starts from the chain root.
        let mut hop_defs = Vec::with_capacity(hops.len() + 1);
        hop_defs.push(start_def);
        for (i, hop) in hops.iter().enumerate() {
            let hop_def = self.entity_def(&hop.entity)?;
            let rel = Ident::new(&hop.relation)?;
            let hop_label = self.label_of(hop_def)?;
            let alias = format!("n{}", i + 1);
            if hop.identity {
                let hop_pk = self.pk_of(hop_def)?;
                builder.optional_hop_guarded("n0", &rel, &alias, &hop_label, &hop_pk);
            } else {
                builder.optional_hop("n0", &rel, &alias, &hop_label);
            }
            hop_defs.push(hop_def);
        }

        let mut terms = Vec::with_capacity(groups.len());
        for key in groups {
            let key_def = *hop_defs
                .get(key.hop)
                .ok_or_else(|| GraphError::InvalidIdentifier(format!(
                    "group key '{}' references undeclared hop {}",
                    key.alias, key.hop
                )))?;
            let field = self.field_of(key_def, &key.field)?;
            let alias = Ident::new(&key.alias)?;
            terms.push(GroupTerm {
                expr: format!("n{}.{}", key.hop, field),
                alias: alias.to_string(),
                identity: key.identity,
            });
        }

        let aggregate_alias = aggregate.alias();
        let aggregate_expr = match &aggregate {
            Aggregate::Count => "count(n0)".to_string(),
            Aggregate::Sum { hop, field } => {
                let sum_def = *hop_defs.get(*hop).ok_or_else(|| {
                    GraphError::InvalidIdentifier(format!(
                        "sum field '{}' references undeclared hop {}",
                        field, hop
                    ))
                })?;
                let field = self.field_of(sum_def, field)?;
                format!("sum(COALESCE(n{hop}.{field}, 0))")
            }
        };
        builder.group_stage(&terms, &aggregate_expr, aggregate_alias);

        let mut fields: Vec<(String, String)> = terms
            .iter()
            .map(|t| (t.alias.clone(), t.alias.clone()))
            .collect();
        fields.push((aggregate_alias.to_string(), aggregate_alias.to_string()));
        builder.return_fields(&fields);

        let mut order = vec![format!("{aggregate_alias} DESC")];
        order.extend(
            terms
                .iter()
                .filter(|t| t.identity)
                .map(|t| t.alias.clone()),
        );
        builder.order_by(&order);
        builder.limit(limit);
        let compiled = builder.compile();

        debug!("Chain over {}: {}", start_def.name, compiled.text);
        let rows = self.runner.run(&compiled).await?;
        Ok(QueryResult::ok_for(start_def.name.clone(), rows))
    }

    /// `alias.field AS <prefix>field` for every declared property.
    fn projection(
        &self,
        def: &EntityDefinition,
        alias: &str,
        prefix: &str,
    ) -> GraphResult<Vec<(String, String)>> {
        def.field_names()
            .into_iter()
            .map(|name| {
                let field = self.field_of(def, name)?;
                Ok((format!("{alias}.{field}"), format!("{prefix}{field}")))
            })
            .collect()
    }

    fn render_filters(
        &self,
        builder: &mut CypherBuilder,
        def: &EntityDefinition,
        alias: &str,
        filters: &FieldMap,
    ) -> GraphResult<Vec<String>> {
        let mut conditions = Vec::with_capacity(filters.len());
        for (name, value) in filters {
            let field = self.field_of(def, name)?;
            let condition = match value {
                Value::Null => builder.cond_is_null(alias, &field),
                Value::String(s) if s.eq_ignore_ascii_case(FILTER_NOT_NULL) => {
                    builder.cond_not_null(alias, &field)
                }
                Value::Array(items) => builder.cond_in(alias, &field, items.clone()),
                Value::Object(map) => match map.get("contains") {
                    Some(Value::String(needle)) if map.len() == 1 => {
                        builder.cond_contains(alias, &field, needle.clone())
                    }
                    _ => return Err(GraphError::UnsupportedFilter(name.clone())),
                },
                other => builder.cond_eq(alias, &field, other.clone()),
            };
            conditions.push(condition);
        }
        Ok(conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{make_row, StaticRunner};
    use serde_json::json;

    fn registry() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::embedded_default().unwrap())
    }

    fn compiler(runner: StaticRunner) -> (QueryCompiler, Arc<StaticRunner>) {
        let runner = Arc::new(runner);
        (
            QueryCompiler::new(registry(), runner.clone()),
            runner,
        )
    }

    #[tokio::test]
    async fn test_entities_query_shape() {
        let fixture = vec![make_row([
            ("incident_id", json!("INC-001")),
            ("title", json!("Pump trip")),
        ])];
        let (compiler, runner) = compiler(StaticRunner::new().stub("MATCH (n:Incident)", fixture));

        let result = compiler.get_entities("incident", 25, None).await;
        assert!(result.success);
        assert_eq!(result.count, 1);
        assert_eq!(result.meta.label.as_deref(), Some("Incident"));

        let executed = runner.executed();
        let text = &executed[0].text;
        assert!(text.contains("MATCH (n:Incident)"));
        assert!(text.contains("n.incident_id AS incident_id"));
        assert!(text.contains("ORDER BY n.incident_id"));
        assert!(text.contains("LIMIT $p0"));
        assert_eq!(executed[0].params.get("p0").unwrap(), &json!(25));
    }

    #[tokio::test]
    async fn test_entity_filters_render_each_form() {
        let (compiler, runner) = compiler(StaticRunner::new());
        let mut filters = FieldMap::new();
        filters.insert("severity".into(), json!(["High", "Critical"]));
        filters.insert("status".into(), json!("__not_null__"));
        filters.insert("title".into(), json!({"contains": "pump"}));
        filters.insert("occurred_on".into(), Value::Null);
        filters.insert("downtime_minutes".into(), json!(120));

        let result = compiler.get_entities("Incident", 10, Some(&filters)).await;
        assert!(result.success);

        let executed = runner.executed();
        let query = &executed[0];
        assert!(query.text.contains("n.severity IN $p0"));
        assert!(query.text.contains("n.status IS NOT NULL"));
        assert!(query
            .text
            .contains("toLower(n.title) CONTAINS toLower($p1)"));
        assert!(query.text.contains("n.occurred_on IS NULL"));
        assert!(query.text.contains("n.downtime_minutes = $p2"));
        assert!(!query.text.contains("High"));
        assert!(!query.text.contains("pump"));
        assert_eq!(
            query.params.get("p0").unwrap(),
            &json!(["High", "Critical"])
        );
        assert_eq!(query.params.get("p1").unwrap(), &json!("pump"));
        assert_eq!(query.params.get("p2").unwrap(), &json!(120));
    }

    #[tokio::test]
    async fn test_unknown_entity_is_failure_envelope() {
        let (compiler, _) = compiler(StaticRunner::new());
        let result = compiler.get_entities("Widget", 10, None).await;
        assert!(!result.success);
        assert!(result.meta.error.as_deref().unwrap().contains("Widget"));
        assert_eq!(result.count, 0);
    }

    #[tokio::test]
    async fn test_unknown_filter_field_is_failure_envelope() {
        let (compiler, _) = compiler(StaticRunner::new());
        let mut filters = FieldMap::new();
        filters.insert("no_such_field".into(), json!("x"));
        let result = compiler.get_entities("Incident", 10, Some(&filters)).await;
        assert!(!result.success);
        assert!(result
            .meta
            .error
            .as_deref()
            .unwrap()
            .contains("no_such_field"));
    }

    #[tokio::test]
    async fn test_relationship_rows_prefix_endpoints() {
        let (compiler, runner) = compiler(StaticRunner::new());
        let result = compiler
            .get_relationship_rows("Incident", "CAUSED_BY", "RootCause", 50)
            .await;
        assert!(result.success);

        let executed = runner.executed();
        let text = &executed[0].text;
        assert!(text.contains("MATCH (a:Incident)-[:CAUSED_BY]->(b:RootCause)"));
        assert!(text.contains("a.incident_id AS from_incident_id"));
        assert!(text.contains("b.cause_id AS to_cause_id"));
        assert!(text.contains("ORDER BY a.incident_id, b.cause_id"));
    }

    #[tokio::test]
    async fn test_undeclared_relationship_is_failure_envelope() {
        let (compiler, _) = compiler(StaticRunner::new());
        let result = compiler
            .get_relationship_rows("Facility", "CAUSED_BY", "Incident", 50)
            .await;
        assert!(!result.success);
        assert!(result.meta.error.as_deref().unwrap().contains("CAUSED_BY"));
    }

    #[tokio::test]
    async fn test_scoped_entities_distinct_through_path() {
        let (compiler, runner) = compiler(StaticRunner::new());
        let path = vec![
            ScopeStep {
                direction: Direction::Reverse,
                relation: "CAUSED_BY".into(),
                entity: "Incident".into(),
            },
            ScopeStep {
                direction: Direction::Forward,
                relation: "OCCURRED_AT".into(),
                entity: "Facility".into(),
            },
        ];
        let result = compiler
            .get_scoped_entities("RootCause", &path, &json!("FAC-001"), 100)
            .await;
        assert!(result.success);

        let executed = runner.executed();
        let text = &executed[0].text;
        assert!(text
            .contains("MATCH (n)<-[:CAUSED_BY]-(s1:Incident)-[:OCCURRED_AT]->(s2:Facility)"));
        assert!(text.contains("WHERE s2.facility_id = $p0"));
        assert!(text.contains("WITH DISTINCT n"));
        assert!(!text.contains("FAC-001"));
        assert_eq!(executed[0].params.get("p0").unwrap(), &json!("FAC-001"));
    }

    #[tokio::test]
    async fn test_chain_groups_guard_identity_hops_twice() {
        let (compiler, runner) = compiler(StaticRunner::new());
        let hops = vec![
            ChainHop {
                relation: "CAUSED_BY".into(),
                entity: "RootCause".into(),
                identity: true,
            },
            ChainHop {
                relation: "CONTRIBUTED_BY".into(),
                entity: "RootCause".into(),
                identity: false,
            },
        ];
        let groups = vec![
            GroupKey {
                hop: 1,
                field: "title".into(),
                alias: "primary_cause".into(),
                identity: true,
            },
            GroupKey {
                hop: 2,
                field: "title".into(),
                alias: "secondary_cause".into(),
                identity: false,
            },
            GroupKey {
                hop: 1,
                field: "category".into(),
                alias: "category".into(),
                identity: true,
            },
        ];
        let result = compiler
            .get_chain_groups("Incident", None, &hops, &groups, Aggregate::Count, 200)
            .await;
        assert!(result.success);

        let executed = runner.executed();
        let text = &executed[0].text;
        // Per-hop guard right after the identity hop.
        assert!(text.contains("OPTIONAL MATCH (n0)-[:CAUSED_BY]->(n1:RootCause)"));
        assert!(text.contains("WITH n0, n1 WHERE n1.cause_id IS NOT NULL"));
        // Non-identity hop has no guard.
        assert!(text.contains("OPTIONAL MATCH (n0)-[:CONTRIBUTED_BY]->(n2:RootCause)"));
        assert!(!text.contains("n2.cause_id IS NOT NULL"));
        // Grouping re-projection re-filters identity keys only.
        assert!(text.contains(
            "WITH n1.title AS primary_cause, n2.title AS secondary_cause, n1.category AS category, count(n0) AS frequency"
        ));
        assert!(text.contains("WHERE primary_cause IS NOT NULL AND category IS NOT NULL"));
        assert!(!text.contains("secondary_cause IS NOT NULL"));
        assert!(text.contains("ORDER BY frequency DESC, primary_cause, category"));
    }

    #[tokio::test]
    async fn test_chain_groups_scoped_and_summed() {
        let (compiler, runner) = compiler(StaticRunner::new());
        let scope = ChainScope {
            steps: vec![ScopeStep {
                direction: Direction::Forward,
                relation: "OCCURRED_AT".into(),
                entity: "Facility".into(),
            }],
            value: json!("FAC-002"),
        };
        let groups = vec![GroupKey {
            hop: 0,
            field: "severity".into(),
            alias: "category".into(),
            identity: true,
        }];
        let result = compiler
            .get_chain_groups(
                "Incident",
                Some(&scope),
                &[],
                &groups,
                Aggregate::Sum {
                    hop: 0,
                    field: "downtime_minutes".into(),
                },
                100,
            )
            .await;
        assert!(result.success);

        let executed = runner.executed();
        let text = &executed[0].text;
        assert!(text.contains("MATCH (n0)-[:OCCURRED_AT]->(s1:Facility)"));
        assert!(text.contains("WHERE s1.facility_id = $p0"));
        assert!(text.contains("sum(COALESCE(n0.downtime_minutes, 0)) AS total"));
        assert!(text.contains("ORDER BY total DESC, category"));
        assert_eq!(executed[0].params.get("p0").unwrap(), &json!("FAC-002"));
    }

    #[tokio::test]
    async fn test_count_degrades_to_zero_when_store_fails() {
        let (compiler, _) = compiler(StaticRunner::failing("store unreachable"));
        assert_eq!(compiler.get_entity_count("Incident").await, 0);
    }

    #[tokio::test]
    async fn test_count_reads_total_column() {
        let fixture = vec![make_row([("total", json!(42))])];
        let (compiler, _) = compiler(StaticRunner::new().stub("count(n)", fixture));
        assert_eq!(compiler.get_entity_count("Incident").await, 42);
    }

    #[tokio::test]
    async fn test_execute_raw_recovers_columns() {
        let fixture = vec![make_row([("t", json!("Pump trip"))])];
        let (compiler, runner) = compiler(StaticRunner::new().stub("RETURN n.title", fixture));
        let result = compiler
            .execute_raw("MATCH (n:Incident) RETURN n.title AS t LIMIT 5", FieldMap::new())
            .await;
        assert!(result.success);
        assert_eq!(runner.executed()[0].columns, vec!["t"]);
    }

    #[tokio::test]
    async fn test_execution_failure_becomes_envelope() {
        let (compiler, _) = compiler(StaticRunner::failing("connection refused"));
        let result = compiler.get_entities("Incident", 10, None).await;
        assert!(!result.success);
        assert!(result
            .meta
            .error
            .as_deref()
            .unwrap()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn test_identical_inputs_compile_identically() {
        let fixture = vec![make_row([("incident_id", json!("INC-001"))])];
        let (compiler, runner) = compiler(StaticRunner::new().stub("MATCH (n:Incident)", fixture));
        let mut filters = FieldMap::new();
        filters.insert("severity".into(), json!("High"));

        let first = compiler.get_entities("Incident", 10, Some(&filters)).await;
        let second = compiler.get_entities("Incident", 10, Some(&filters)).await;

        let executed = runner.executed();
        assert_eq!(executed[0], executed[1]);
        assert_eq!(first.data, second.data);
        assert_eq!(first.count, second.count);
        assert_eq!(first.success, second.success);
    }
}
