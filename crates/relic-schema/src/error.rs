//! Schema loading errors.
//!
//! Everything here is fatal at startup: a missing or malformed schema
//! document is the one failure this system is allowed to propagate
//! unhandled. After a successful load the registry is immutable and
//! lookups are infallible or return `Option`.

use thiserror::Error;

/// Errors raised while loading and validating the schema document.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema document not found: {path}")]
    NotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate entity definition: {0}")]
    DuplicateEntity(String),

    #[error("Entity '{0}' declares no properties")]
    EmptyEntity(String),

    #[error("Entity '{entity}' declares more than one primary key ('{first}' and '{second}')")]
    MultiplePrimaryKeys {
        entity: String,
        first: String,
        second: String,
    },

    #[error("Unsupported property type '{ty}' for {entity}.{field}")]
    UnsupportedType {
        entity: String,
        field: String,
        ty: String,
    },

    #[error("Invalid identifier '{name}' in schema ({context})")]
    InvalidIdentifier { name: String, context: String },

    #[error("Relationship '{rel_type}' references undeclared entity '{entity}'")]
    UnknownEndpoint { rel_type: String, entity: String },

    #[error("Mapping section references undeclared entity '{0}'")]
    UnknownMappingEntity(String),
}
