//! Schema property types and converted values.

use serde::{Deserialize, Serialize};

/// Declared type of an entity property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Date,
}

impl PropertyType {
    /// Parse a type name from the schema document (case-insensitive,
    /// common aliases accepted). Returns `None` for unknown names so the
    /// registry can fail the load.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "string" | "str" => Some(Self::String),
            "text" => Some(Self::Text),
            "integer" | "int" => Some(Self::Integer),
            "float" | "number" | "double" => Some(Self::Float),
            "boolean" | "bool" => Some(Self::Boolean),
            "date" => Some(Self::Date),
            _ => None,
        }
    }

    /// Canonical name as written in schema documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
        }
    }
}

/// Result of a type conversion. Conversion never fails: unconvertible
/// input becomes the type's documented default, which for the non-string
/// types is `Null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConvertedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConvertedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Lower into a plain JSON value for envelope rows.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(b),
            Self::Int(i) => serde_json::Value::from(i),
            Self::Float(f) => serde_json::Value::from(f),
            Self::Str(s) => serde_json::Value::String(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(PropertyType::parse("STRING"), Some(PropertyType::String));
        assert_eq!(PropertyType::parse("int"), Some(PropertyType::Integer));
        assert_eq!(PropertyType::parse("bool"), Some(PropertyType::Boolean));
        assert_eq!(PropertyType::parse("number"), Some(PropertyType::Float));
        assert_eq!(PropertyType::parse("datetime"), None);
    }

    #[test]
    fn test_into_json() {
        assert_eq!(ConvertedValue::Null.into_json(), serde_json::Value::Null);
        assert_eq!(
            ConvertedValue::Int(-3).into_json(),
            serde_json::Value::from(-3)
        );
        assert_eq!(
            ConvertedValue::Str("ok".into()).into_json(),
            serde_json::Value::String("ok".into())
        );
    }
}
