//! The uniform result envelope.
//!
//! Every public query method returns a `QueryResult`, success or not.
//! Downstream layers (aggregators, CLI, anything else) never see a raw
//! transport error: failures arrive as `success == false` with the error
//! text in the metadata.

use serde::Serialize;

use relic_schema::FieldMap;

/// Metadata attached to a result envelope.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultMeta {
    /// Entity or relationship the query targeted, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Error description; present exactly when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The compiled Cypher, for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cypher: Option<String>,
}

/// Uniform query result envelope.
///
/// Invariant: `count == data.len()` when `success`; on failure `data` is
/// empty and `meta.error` describes what went wrong.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub data: Vec<FieldMap>,
    pub count: usize,
    pub success: bool,
    pub meta: ResultMeta,
}

impl QueryResult {
    /// Successful envelope over a row set.
    pub fn ok(data: Vec<FieldMap>) -> Self {
        let count = data.len();
        Self {
            data,
            count,
            success: true,
            meta: ResultMeta::default(),
        }
    }

    /// Successful envelope tagged with the queried label.
    pub fn ok_for(label: impl Into<String>, data: Vec<FieldMap>) -> Self {
        let mut result = Self::ok(data);
        result.meta.label = Some(label.into());
        result
    }

    /// Failure envelope; rows are always empty.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            count: 0,
            success: false,
            meta: ResultMeta {
                label: None,
                error: Some(error.into()),
                cypher: None,
            },
        }
    }

    /// Attach the compiled query text for diagnostics.
    pub fn with_cypher(mut self, cypher: impl Into<String>) -> Self {
        self.meta.cypher = Some(cypher.into());
        self
    }

    /// First row, when any.
    pub fn first(&self) -> Option<&FieldMap> {
        self.data.first()
    }
}
