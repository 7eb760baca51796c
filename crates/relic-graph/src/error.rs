//! Graph-side error types.
//!
//! These never cross the compiler's public boundary: every public query
//! method catches them and returns a failure envelope instead. They exist
//! so the recovery point has something structured to log and report.

use thiserror::Error;

/// Errors raised while compiling or executing graph queries.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Graph connection error: {0}")]
    Connection(#[from] neo4rs::Error),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown relationship: ({from})-[:{rel_type}]->({to})")]
    UnknownRelationship {
        from: String,
        rel_type: String,
        to: String,
    },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Unsupported filter for field '{0}'")]
    UnsupportedFilter(String),

    #[error("Query execution failed: {0}")]
    Execution(String),
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
