//! The query execution seam.
//!
//! The compiler produces `CompiledQuery` values and hands them to a
//! `QueryRunner`. The live implementation is `GraphClient` (neo4rs); the
//! `StaticRunner` here serves unit tests and offline experiments with
//! canned rows, and records every query it was asked to run so tests can
//! assert on the compiled text and parameters.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use relic_schema::FieldMap;

use crate::error::GraphResult;

/// A fully compiled, parameterized query ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Cypher text; data values never appear here, only `$pN` markers.
    pub text: String,
    /// Bound parameter values by name.
    pub params: FieldMap,
    /// Projection aliases in output order.
    pub columns: Vec<String>,
}

/// Executes compiled queries and returns rows as field maps.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run(&self, query: &CompiledQuery) -> GraphResult<Vec<FieldMap>>;
}

/// Fixture-backed runner: rows are keyed by a fragment of query text and
/// returned for the first fragment that matches. Unmatched queries yield
/// an empty row set, like an empty store would.
#[derive(Default)]
pub struct StaticRunner {
    fixtures: Vec<(String, Vec<FieldMap>)>,
    fail_with: Option<String>,
    executed: Mutex<Vec<CompiledQuery>>,
}

impl StaticRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner whose every execution fails, for exercising degradation.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// Register rows for queries whose text contains `fragment`.
    pub fn stub(mut self, fragment: impl Into<String>, rows: Vec<FieldMap>) -> Self {
        self.fixtures.push((fragment.into(), rows));
        self
    }

    /// Every query run so far, in order.
    pub fn executed(&self) -> Vec<CompiledQuery> {
        self.executed.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl QueryRunner for StaticRunner {
    async fn run(&self, query: &CompiledQuery) -> GraphResult<Vec<FieldMap>> {
        if let Ok(mut guard) = self.executed.lock() {
            guard.push(query.clone());
        }
        if let Some(message) = &self.fail_with {
            return Err(crate::error::GraphError::Execution(message.clone()));
        }
        for (fragment, rows) in &self.fixtures {
            if query.text.contains(fragment.as_str()) {
                return Ok(rows.clone());
            }
        }
        Ok(Vec::new())
    }
}

/// Build a fixture row from `(field, value)` pairs.
pub fn make_row<const N: usize>(pairs: [(&str, Value); N]) -> FieldMap {
    let mut row = FieldMap::new();
    for (key, value) in pairs {
        row.insert(key.to_string(), value);
    }
    row
}
