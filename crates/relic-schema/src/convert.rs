//! Type conversion with a documented missing-data policy.
//!
//! Source systems feed this graph from spreadsheets and exports, so raw
//! values arrive as free-text with a zoo of "no data" spellings. The
//! converter never fails: anything unconvertible collapses to the target
//! type's documented default. String-ish types default to a visible
//! marker; integer, float, boolean and date default to null.
//!
//! Conversion failures are recovered, logged at `debug`, and never fatal.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

use crate::registry::EntityDefinition;
use crate::types::{ConvertedValue, PropertyType};
use crate::FieldMap;

/// Default marker substituted for missing `string` values.
pub const STRING_DEFAULT: &str = "Not Available";

/// Default marker substituted for missing `text` values.
pub const TEXT_DEFAULT: &str = "Not specified";

/// Spellings that mean "no data", compared case-insensitively after trim.
const MISSING_SENTINELS: &[&str] = &[
    "",
    "n/a",
    "na",
    "not_specified",
    "data_not_available",
    "none",
    "null",
];

/// Date formats tried in order; first hit wins.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d-%b-%Y",
];

/// Timestamp formats whose date part is accepted.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

/// True when the raw text is one of the missing-data spellings.
pub fn is_missing(raw: &str) -> bool {
    let lowered = raw.trim().to_lowercase();
    MISSING_SENTINELS.contains(&lowered.as_str())
}

/// True when an envelope cell counts as populated for completion metrics:
/// non-null and not a missing marker (including the substituted defaults).
pub fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => {
            !is_missing(s) && s != STRING_DEFAULT && s != TEXT_DEFAULT
        }
        _ => true,
    }
}

/// Affirmative/negative vocabulary for boolean coercion.
///
/// Ships with the generic yes/no spellings plus the audit-domain terms,
/// and applies a `not <term>` prefix rule that flips the polarity of the
/// remainder. Extensible so deployments can add their own vocabulary.
#[derive(Debug, Clone)]
pub struct BooleanLexicon {
    affirmative: Vec<String>,
    negative: Vec<String>,
}

impl Default for BooleanLexicon {
    fn default() -> Self {
        let affirmative = [
            "yes", "y", "true", "t", "1", "effective", "satisfactory", "completed", "complete",
            "done", "implemented", "adequate", "pass", "passed", "closed", "resolved",
        ];
        let negative = [
            "no", "n", "false", "f", "0", "ineffective", "unsatisfactory", "incomplete",
            "pending", "inadequate", "fail", "failed", "open", "unresolved",
        ];
        Self {
            affirmative: affirmative.iter().map(|s| s.to_string()).collect(),
            negative: negative.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl BooleanLexicon {
    /// Add affirmative terms (stored lowercase).
    pub fn with_affirmative<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affirmative
            .extend(terms.into_iter().map(|s| s.into().to_lowercase()));
        self
    }

    /// Add negative terms (stored lowercase).
    pub fn with_negative<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.negative
            .extend(terms.into_iter().map(|s| s.into().to_lowercase()));
        self
    }

    /// Classify raw text as true/false, or `None` when unrecognised.
    pub fn classify(&self, raw: &str) -> Option<bool> {
        let lowered = raw.trim().to_lowercase();
        if let Some(rest) = lowered.strip_prefix("not ") {
            return self.classify(rest).map(|b| !b);
        }
        if self.affirmative.iter().any(|t| t == &lowered) {
            Some(true)
        } else if self.negative.iter().any(|t| t == &lowered) {
            Some(false)
        } else {
            None
        }
    }
}

/// Coerces raw values into schema-declared types.
#[derive(Debug, Clone, Default)]
pub struct TypeConverter {
    lexicon: BooleanLexicon,
}

impl TypeConverter {
    pub fn new(lexicon: BooleanLexicon) -> Self {
        Self { lexicon }
    }

    /// Convert raw text to the target type. Never fails; missing-data
    /// sentinels and unparseable input yield the type's default.
    pub fn convert_value(&self, raw: &str, ty: PropertyType, field: &str) -> ConvertedValue {
        if is_missing(raw) {
            return type_default(ty);
        }
        let trimmed = raw.trim();

        let converted = match ty {
            PropertyType::String => Some(ConvertedValue::Str(trimmed.to_string())),
            PropertyType::Text => Some(ConvertedValue::Str(trimmed.to_string())),
            PropertyType::Integer => parse_integer(trimmed).map(ConvertedValue::Int),
            PropertyType::Float => parse_float(trimmed).map(ConvertedValue::Float),
            PropertyType::Boolean => self.lexicon.classify(trimmed).map(ConvertedValue::Bool),
            PropertyType::Date => return self.convert_date(trimmed),
        };

        match converted {
            Some(value) => value,
            None => {
                debug!(field, raw = trimmed, ty = ty.as_str(), "Unconvertible value, using type default");
                type_default(ty)
            }
        }
    }

    /// Convert an arbitrary JSON value to the target type. Non-string
    /// inputs that already fit the type pass through; everything else is
    /// routed through the text path.
    pub fn convert_json(&self, raw: &Value, ty: PropertyType, field: &str) -> ConvertedValue {
        match (raw, ty) {
            (Value::Null, _) => type_default(ty),
            (Value::Bool(b), PropertyType::Boolean) => ConvertedValue::Bool(*b),
            (Value::Number(n), PropertyType::Integer) => n
                .as_i64()
                .map(ConvertedValue::Int)
                .or_else(|| n.as_f64().map(|f| ConvertedValue::Int(f.trunc() as i64)))
                .unwrap_or(ConvertedValue::Null),
            (Value::Number(n), PropertyType::Float) => n
                .as_f64()
                .map(ConvertedValue::Float)
                .unwrap_or(ConvertedValue::Null),
            (Value::Number(n), PropertyType::Boolean) => match n.as_i64() {
                Some(0) => ConvertedValue::Bool(false),
                Some(1) => ConvertedValue::Bool(true),
                _ => ConvertedValue::Null,
            },
            (Value::String(s), _) => self.convert_value(s, ty, field),
            (other, _) => self.convert_value(&other.to_string(), ty, field),
        }
    }

    /// Convert a raw source row for an entity. Field names are first
    /// routed through the entity's mapping table (raw header → schema
    /// field); mapped fields are converted to their declared types, and
    /// fields absent from the mapping pass through unchanged. Nothing is
    /// ever dropped.
    pub fn convert_entity_row(
        &self,
        entity: &EntityDefinition,
        mapping: Option<&HashMap<String, String>>,
        raw: &FieldMap,
    ) -> FieldMap {
        let mut out = FieldMap::new();
        for (raw_key, raw_value) in raw {
            let key = mapping
                .and_then(|m| m.get(raw_key))
                .map(String::as_str)
                .unwrap_or(raw_key.as_str());

            match entity.property(key) {
                Some(prop) => {
                    let converted = self.convert_json(raw_value, prop.ty, key);
                    out.insert(key.to_string(), converted.into_json());
                }
                None => {
                    out.insert(key.to_string(), raw_value.clone());
                }
            }
        }
        out
    }

    /// Date conversion with the reproducibility-critical fallback order:
    /// known formats first, then pass-through when the text carries a
    /// plausible 4-digit year, else null.
    fn convert_date(&self, trimmed: &str) -> ConvertedValue {
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
                return ConvertedValue::Str(date.format("%Y-%m-%d").to_string());
            }
        }
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
                return ConvertedValue::Str(dt.date().format("%Y-%m-%d").to_string());
            }
        }
        if contains_year_token(trimmed) {
            debug!(raw = trimmed, "Unparsed date kept as best-effort value");
            ConvertedValue::Str(trimmed.to_string())
        } else {
            ConvertedValue::Null
        }
    }
}

/// The documented default per type.
fn type_default(ty: PropertyType) -> ConvertedValue {
    match ty {
        PropertyType::String => ConvertedValue::Str(STRING_DEFAULT.to_string()),
        PropertyType::Text => ConvertedValue::Str(TEXT_DEFAULT.to_string()),
        PropertyType::Integer
        | PropertyType::Float
        | PropertyType::Boolean
        | PropertyType::Date => ConvertedValue::Null,
    }
}

/// Parse an integer, tolerating thousands separators, currency symbols
/// and percent signs; a parenthesized number is negative.
fn parse_integer(raw: &str) -> Option<i64> {
    let (body, negative) = strip_accounting(raw);
    if body.is_empty() {
        return None;
    }
    let value = body
        .parse::<i64>()
        .ok()
        .or_else(|| body.parse::<f64>().ok().map(|f| f.trunc() as i64))?;
    Some(if negative { -value.abs() } else { value })
}

fn parse_float(raw: &str) -> Option<f64> {
    let (body, negative) = strip_accounting(raw);
    if body.is_empty() {
        return None;
    }
    let value = body.parse::<f64>().ok()?;
    Some(if negative { -value.abs() } else { value })
}

/// Strip `$ € £ % ,` and whitespace; report parenthesized negatives.
fn strip_accounting(raw: &str) -> (String, bool) {
    let trimmed = raw.trim();
    let negative = trimmed.starts_with('(') && trimmed.ends_with(')');
    let inner = if negative {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    let body: String = inner
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '€' | '£' | '%') && !c.is_whitespace())
        .collect();
    (body, negative)
}

/// True when the text contains a standalone 4-digit token in 1900..=2099.
fn contains_year_token(text: &str) -> bool {
    let mut digits = String::new();
    let mut runs = Vec::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !digits.is_empty() {
            runs.push(std::mem::take(&mut digits));
        }
    }
    if !digits.is_empty() {
        runs.push(digits);
    }
    runs.iter().any(|run| {
        run.len() == 4
            && run
                .parse::<u32>()
                .map(|y| (1900..=2099).contains(&y))
                .unwrap_or(false)
    })
}
