//! # RELIC Schema
//!
//! Schema registry and type conversion for the reliability graph.
//!
//! Loads the entity/relationship schema document once at startup, exposes
//! immutable lookups (entities, relationships, primary keys) to the query
//! compiler, and coerces raw source values into schema-declared types with
//! a documented missing-data policy.

pub mod convert;
pub mod error;
pub mod registry;
pub mod types;

pub use convert::{is_populated, BooleanLexicon, TypeConverter, STRING_DEFAULT, TEXT_DEFAULT};
pub use error::SchemaError;
pub use registry::{EntityDefinition, PropertyDef, RelationshipDefinition, SchemaRegistry};
pub use types::{ConvertedValue, PropertyType};

/// A single result row: field name to JSON value, in projection order.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;
