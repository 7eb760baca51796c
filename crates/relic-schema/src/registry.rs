//! Schema registry: entity and relationship definitions.
//!
//! The registry is loaded once at process start from a JSON document
//! (embedded default or a configured file) and is immutable afterwards.
//! Entity, property and relationship names are validated at load time so
//! that downstream query builders can treat them as trusted identifiers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::SchemaError;
use crate::types::PropertyType;

/// Built-in schema for the reliability incident domain. Used when no
/// schema file is configured; a file with the same shape overrides it.
const DEFAULT_SCHEMA: &str = r#"{
  "entities": [
    {
      "name": "Incident",
      "properties": {
        "incident_id": { "type": "string", "primary_key": true },
        "title": { "type": "string" },
        "description": { "type": "text" },
        "severity": { "type": "string" },
        "status": { "type": "string" },
        "occurred_on": { "type": "date" },
        "resolved": { "type": "boolean" },
        "downtime_minutes": { "type": "integer" }
      }
    },
    {
      "name": "RootCause",
      "properties": {
        "cause_id": { "type": "string", "primary_key": true },
        "title": { "type": "string" },
        "category": { "type": "string" },
        "analysis": { "type": "text" },
        "confirmed": { "type": "boolean" }
      }
    },
    {
      "name": "ActionPlan",
      "properties": {
        "plan_id": { "type": "string", "primary_key": true },
        "title": { "type": "string" },
        "status": { "type": "string" },
        "due_on": { "type": "date" },
        "effective": { "type": "boolean" },
        "owner": { "type": "string" }
      }
    },
    {
      "name": "Facility",
      "properties": {
        "facility_id": { "type": "string", "primary_key": true },
        "name": { "type": "string" },
        "region": { "type": "string" },
        "criticality": { "type": "string" }
      }
    }
  ],
  "relationships": [
    { "from": "Incident", "to": "Facility", "type": "OCCURRED_AT" },
    { "from": "Incident", "to": "RootCause", "type": "CAUSED_BY" },
    { "from": "Incident", "to": "RootCause", "type": "CONTRIBUTED_BY" },
    { "from": "RootCause", "to": "ActionPlan", "type": "MITIGATED_BY" }
  ],
  "mappings": {
    "Incident": {
      "Event ID": "incident_id",
      "Event Title": "title",
      "Event Description": "description",
      "Severity Level": "severity",
      "Current Status": "status",
      "Date of Occurrence": "occurred_on",
      "Resolved?": "resolved",
      "Downtime (min)": "downtime_minutes"
    },
    "RootCause": {
      "RCA ID": "cause_id",
      "Root Cause": "title",
      "Cause Category": "category",
      "Analysis Notes": "analysis",
      "Confirmed?": "confirmed"
    },
    "ActionPlan": {
      "CAP ID": "plan_id",
      "Action Title": "title",
      "Plan Status": "status",
      "Due Date": "due_on",
      "Effectiveness": "effective",
      "Responsible": "owner"
    }
  }
}"#;

/// A single typed property of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: String,
    pub ty: PropertyType,
    pub primary_key: bool,
}

/// An entity (node label) with its declared properties.
#[derive(Debug, Clone)]
pub struct EntityDefinition {
    pub name: String,
    /// Properties in declaration order.
    pub properties: Vec<PropertyDef>,
}

impl EntityDefinition {
    /// Look up a property by field name.
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// The declared primary-key property, if any.
    pub fn declared_primary_key(&self) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.primary_key)
            .map(|p| p.name.as_str())
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.name.as_str()).collect()
    }

    /// Non-primary-key fields, the set tracked for completion metrics.
    pub fn tracked_fields(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|p| !p.primary_key)
            .map(|p| p.name.as_str())
            .collect()
    }
}

/// A directed relationship between two declared entities.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationshipDefinition {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub rel_type: String,
}

#[derive(Deserialize)]
struct EntityDoc {
    name: String,
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct SchemaDocument {
    entities: Vec<EntityDoc>,
    #[serde(default)]
    relationships: Vec<RelationshipDefinition>,
    #[serde(default)]
    mappings: HashMap<String, HashMap<String, String>>,
}

/// Immutable registry of entity and relationship definitions.
///
/// Safe for concurrent read-only use; the only interior mutability is the
/// primary-key lookup cache, whose writes are idempotent (recomputing a
/// key yields the same value), so redundant race-populations are harmless.
#[derive(Debug)]
pub struct SchemaRegistry {
    entities: Vec<EntityDefinition>,
    by_name: HashMap<String, usize>,
    relationships: Vec<RelationshipDefinition>,
    mappings: HashMap<String, HashMap<String, String>>,
    pk_cache: RwLock<HashMap<String, String>>,
}

impl SchemaRegistry {
    /// Load the registry from a JSON schema document string.
    pub fn from_json_str(doc: &str) -> Result<Self, SchemaError> {
        let parsed: SchemaDocument = serde_json::from_str(doc)?;
        Self::build(parsed)
    }

    /// Load the registry from a schema file on disk.
    pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::NotFound {
            path: path.display().to_string(),
            source,
        })?;
        let registry = Self::from_json_str(&text)?;
        info!(
            path = %path.display(),
            entities = registry.entities.len(),
            relationships = registry.relationships.len(),
            "Schema loaded"
        );
        Ok(registry)
    }

    /// Load the embedded reliability-incident schema.
    pub fn embedded_default() -> Result<Self, SchemaError> {
        Self::from_json_str(DEFAULT_SCHEMA)
    }

    fn build(doc: SchemaDocument) -> Result<Self, SchemaError> {
        let mut entities = Vec::with_capacity(doc.entities.len());
        let mut by_name = HashMap::new();

        for entity_doc in doc.entities {
            let name = entity_doc.name;
            check_identifier(&name, "entity name")?;
            if by_name.contains_key(&name) {
                return Err(SchemaError::DuplicateEntity(name));
            }
            if entity_doc.properties.is_empty() {
                return Err(SchemaError::EmptyEntity(name));
            }

            let mut properties = Vec::with_capacity(entity_doc.properties.len());
            let mut primary: Option<String> = None;
            for (field, spec) in &entity_doc.properties {
                check_identifier(field, "property name")?;
                let (ty_name, is_pk) = property_spec(spec);
                let ty = PropertyType::parse(&ty_name).ok_or_else(|| {
                    SchemaError::UnsupportedType {
                        entity: name.clone(),
                        field: field.clone(),
                        ty: ty_name.clone(),
                    }
                })?;
                if is_pk {
                    if let Some(first) = &primary {
                        return Err(SchemaError::MultiplePrimaryKeys {
                            entity: name,
                            first: first.clone(),
                            second: field.clone(),
                        });
                    }
                    primary = Some(field.clone());
                }
                properties.push(PropertyDef {
                    name: field.clone(),
                    ty,
                    primary_key: is_pk,
                });
            }

            by_name.insert(name.clone(), entities.len());
            entities.push(EntityDefinition { name, properties });
        }

        for rel in &doc.relationships {
            check_identifier(&rel.rel_type, "relationship type")?;
            for endpoint in [&rel.from, &rel.to] {
                if !by_name.contains_key(endpoint) {
                    return Err(SchemaError::UnknownEndpoint {
                        rel_type: rel.rel_type.clone(),
                        entity: endpoint.clone(),
                    });
                }
            }
        }

        for entity in doc.mappings.keys() {
            if !by_name.contains_key(entity) {
                return Err(SchemaError::UnknownMappingEntity(entity.clone()));
            }
        }

        Ok(Self {
            entities,
            by_name,
            relationships: doc.relationships,
            mappings: doc.mappings,
            pk_cache: RwLock::new(HashMap::new()),
        })
    }

    /// Look up an entity by name; falls back to a case-insensitive match
    /// so CLI input like `incident` resolves to `Incident`.
    pub fn entity(&self, name: &str) -> Option<&EntityDefinition> {
        if let Some(&idx) = self.by_name.get(name) {
            return Some(&self.entities[idx]);
        }
        let lower = name.to_lowercase();
        self.entities.iter().find(|e| e.name.to_lowercase() == lower)
    }

    /// All entities in declaration order.
    pub fn entities(&self) -> &[EntityDefinition] {
        &self.entities
    }

    /// All declared relationships.
    pub fn relationships(&self) -> &[RelationshipDefinition] {
        &self.relationships
    }

    /// Look up a declared relationship by its three names.
    pub fn relationship(
        &self,
        from: &str,
        rel_type: &str,
        to: &str,
    ) -> Option<&RelationshipDefinition> {
        self.relationships
            .iter()
            .find(|r| r.from == from && r.to == to && r.rel_type == rel_type)
    }

    /// Relationships where the given entity is either endpoint.
    pub fn relationships_of(&self, entity: &str) -> Vec<&RelationshipDefinition> {
        self.relationships
            .iter()
            .filter(|r| r.from == entity || r.to == entity)
            .collect()
    }

    /// Resolve the primary-key field for an entity: the schema-declared
    /// key, else the `<entity_lower>_id` convention. Results are cached;
    /// the cache may be race-populated redundantly without harm.
    pub fn primary_key(&self, entity: &str) -> Option<String> {
        let definition = self.entity(entity)?;

        if let Ok(cache) = self.pk_cache.read() {
            if let Some(pk) = cache.get(&definition.name) {
                return Some(pk.clone());
            }
        }

        let pk = definition
            .declared_primary_key()
            .map(String::from)
            .unwrap_or_else(|| format!("{}_id", definition.name.to_lowercase()));

        if let Ok(mut cache) = self.pk_cache.write() {
            cache.insert(definition.name.clone(), pk.clone());
        }
        Some(pk)
    }

    /// Raw-source-field to schema-field mapping for an entity, if any.
    pub fn mapping_for(&self, entity: &str) -> Option<&HashMap<String, String>> {
        self.mappings.get(entity)
    }
}

/// Extract `(type, primary_key)` from a property spec, accepting both the
/// object form `{"type": "string", "primary_key": true}` and the bare
/// string shorthand `"string"`.
fn property_spec(spec: &Value) -> (String, bool) {
    match spec {
        Value::String(ty) => (ty.clone(), false),
        Value::Object(obj) => {
            let ty = obj
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let pk = obj
                .get("primary_key")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            (ty, pk)
        }
        _ => (String::new(), false),
    }
}

/// Names that reach query text must be plain identifiers.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(name: &str, context: &str) -> Result<(), SchemaError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier {
            name: name.to_string(),
            context: context.to_string(),
        })
    }
}
