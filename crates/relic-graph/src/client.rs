//! Neo4j connection client.

use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query};
use serde::Deserialize;
use serde_json::Value;

use relic_schema::FieldMap;

use crate::error::{GraphError, GraphResult};
use crate::runner::{CompiledQuery, QueryRunner};

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "relic_dev".to_string(),
            database: "neo4j".to_string(),
            max_connections: 8,
            fetch_size: 200,
        }
    }
}

/// Client for read-only queries against the reliability graph.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Create a new GraphClient from config.
    ///
    /// Note: neo4rs uses a lazy deadpool; `Graph::connect` only creates the
    /// pool object and does NOT establish a real bolt connection yet. We run
    /// a cheap `RETURN 1` ping immediately so that callers can wrap this in
    /// a timeout and get a fast failure when Neo4j is unreachable instead of
    /// hanging silently.
    pub async fn connect(config: &GraphConfig) -> GraphResult<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size)
            .build()?;

        let graph = Graph::connect(neo4j_config).await?;

        // Ping to force an actual TCP+bolt handshake so the caller's timeout works.
        graph.run(Query::new("RETURN 1".to_string())).await?;

        Ok(Self { graph })
    }

    /// Create a new GraphClient with default configuration.
    pub async fn connect_default() -> GraphResult<Self> {
        Self::connect(&GraphConfig::default()).await
    }

    /// Total node and relationship counts for status display.
    pub async fn counts(&self) -> GraphResult<GraphCounts> {
        let nodes = self.scalar_count("MATCH (n) RETURN count(n) AS count").await?;
        let relationships = self
            .scalar_count("MATCH ()-[r]->() RETURN count(r) AS count")
            .await?;
        Ok(GraphCounts {
            nodes: nodes as usize,
            relationships: relationships as usize,
        })
    }

    async fn scalar_count(&self, text: &str) -> GraphResult<i64> {
        let compiled = CompiledQuery {
            text: text.to_string(),
            params: FieldMap::new(),
            columns: vec!["count".to_string()],
        };
        let rows = self.run(&compiled).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }
}

#[async_trait]
impl QueryRunner for GraphClient {
    async fn run(&self, compiled: &CompiledQuery) -> GraphResult<Vec<FieldMap>> {
        let query = to_query(compiled);
        let mut result = self
            .graph
            .execute(query)
            .await
            .map_err(GraphError::Connection)?;

        let mut rows = Vec::new();
        while let Ok(Some(row)) = result.next().await {
            rows.push(extract_row(&row, &compiled.columns));
        }
        Ok(rows)
    }
}

/// Node and relationship counts.
#[derive(Debug, Clone)]
pub struct GraphCounts {
    pub nodes: usize,
    pub relationships: usize,
}

/// Lower a compiled query into a neo4rs query with bound parameters.
fn to_query(compiled: &CompiledQuery) -> Query {
    let mut query = Query::new(compiled.text.clone());
    for (key, value) in &compiled.params {
        query = bind_param(query, key, value);
    }
    query
}

fn bind_param(query: Query, key: &str, value: &Value) -> Query {
    match value {
        Value::Null => query.param::<Option<String>>(key, None),
        Value::Bool(b) => query.param(key, *b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.param(key, i)
            } else {
                query.param(key, n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => query.param(key, s.as_str()),
        Value::Array(items) => bind_list(query, key, items),
        // The compiler never emits object parameters; bind the JSON text.
        Value::Object(_) => query.param(key, value.to_string()),
    }
}

fn bind_list(query: Query, key: &str, items: &[Value]) -> Query {
    if items.iter().all(Value::is_i64) {
        let ints: Vec<i64> = items.iter().filter_map(Value::as_i64).collect();
        query.param(key, ints)
    } else {
        let strings: Vec<String> = items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        query.param(key, strings)
    }
}

/// Project the declared columns out of a bolt row. Missing or
/// undeserializable cells become null rather than failing the whole row.
fn extract_row(row: &neo4rs::Row, columns: &[String]) -> FieldMap {
    let mut map = FieldMap::new();
    for column in columns {
        let value = row.get::<Value>(column).unwrap_or(Value::Null);
        map.insert(column.clone(), value);
    }
    map
}
