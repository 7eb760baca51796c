//! Cypher assembly with a hard identifier/value distinction.
//!
//! Two kinds of token reach query text, and only two:
//!
//! - [`Ident`]: structural identifiers (entity labels, relationship
//!   types, field names) resolved from the trusted schema registry and
//!   charset-checked before interpolation;
//! - `$pN` parameter markers: every data value, no exceptions.
//!
//! The builder also owns the null-safety contract for optional traversal
//! chains: an identity-bearing optional hop is immediately followed by a
//! `WITH … WHERE <hop>.<key> IS NOT NULL` carry, and a grouping stage
//! re-applies `IS NOT NULL` to its identity keys right after the
//! re-projection. Callers cannot produce a grouped optional-chain query
//! that skips either filter. Filtering only in the initial `WHERE` is not
//! enough: rows bound to null by a later `OPTIONAL MATCH` survive it and
//! surface as null-identity groups downstream.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use relic_schema::FieldMap;

use crate::error::{GraphError, GraphResult};
use crate::runner::CompiledQuery;

/// Reserved filter value meaning "field IS NOT NULL" instead of equality.
pub const FILTER_NOT_NULL: &str = "__not_null__";

/// A validated structural identifier, safe to interpolate into Cypher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident(String);

impl Ident {
    /// Validate and wrap an identifier. Accepts `[A-Za-z_][A-Za-z0-9_]*`
    /// only; anything else is rejected before it can reach query text.
    pub fn new(name: &str) -> GraphResult<Self> {
        let mut chars = name.chars();
        let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(Self(name.to_string()))
        } else {
            Err(GraphError::InvalidIdentifier(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Traversal direction of a relationship step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

/// One projection term of a grouping stage.
#[derive(Debug, Clone)]
pub struct GroupTerm {
    /// Source expression, e.g. `n1.title`.
    pub expr: String,
    /// Output alias.
    pub alias: String,
    /// Identity keys get the post-projection `IS NOT NULL` re-filter;
    /// non-identity terms (e.g. a secondary cause) may stay null.
    pub identity: bool,
}

/// Incremental Cypher builder.
#[derive(Debug, Default)]
pub struct CypherBuilder {
    lines: Vec<String>,
    params: FieldMap,
    columns: Vec<String>,
    /// Aliases currently in scope, for WITH carries.
    scope: Vec<String>,
}

impl CypherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its `$pN` marker.
    pub fn bind(&mut self, value: Value) -> String {
        let name = format!("p{}", self.params.len());
        let marker = format!("${name}");
        self.params.insert(name, value);
        marker
    }

    /// `MATCH (alias:Label)`
    pub fn match_node(&mut self, alias: &str, label: &Ident) -> &mut Self {
        self.lines.push(format!("MATCH ({alias}:{label})"));
        self.scope.push(alias.to_string());
        self
    }

    /// A single `MATCH` over a chained relationship path starting from an
    /// alias already in scope, e.g.
    /// `MATCH (n)<-[:CAUSED_BY]-(s1:Incident)-[:OCCURRED_AT]->(s2:Facility)`.
    pub fn match_path(
        &mut self,
        start_alias: &str,
        steps: &[(Direction, Ident, String, Ident)],
    ) -> &mut Self {
        let mut line = format!("MATCH ({start_alias})");
        for (direction, rel, alias, label) in steps {
            match direction {
                Direction::Forward => {
                    line.push_str(&format!("-[:{rel}]->({alias}:{label})"));
                }
                Direction::Reverse => {
                    line.push_str(&format!("<-[:{rel}]-({alias}:{label})"));
                }
            }
            self.scope.push(alias.clone());
        }
        self.lines.push(line);
        self
    }

    /// `OPTIONAL MATCH (from)-[:REL]->(to:Label)` with no identity guard.
    /// For hops whose projected fields are allowed to stay null.
    pub fn optional_hop(
        &mut self,
        from: &str,
        rel: &Ident,
        to: &str,
        label: &Ident,
    ) -> &mut Self {
        self.lines
            .push(format!("OPTIONAL MATCH ({from})-[:{rel}]->({to}:{label})"));
        self.scope.push(to.to_string());
        self
    }

    /// `OPTIONAL MATCH` immediately followed by the identity carry:
    /// `WITH <scope> WHERE to.key IS NOT NULL`. This is the per-hop half
    /// of the null-safety contract.
    pub fn optional_hop_guarded(
        &mut self,
        from: &str,
        rel: &Ident,
        to: &str,
        label: &Ident,
        identity_key: &Ident,
    ) -> &mut Self {
        self.optional_hop(from, rel, to, label);
        let carry = self.scope.join(", ");
        self.lines
            .push(format!("WITH {carry} WHERE {to}.{identity_key} IS NOT NULL"));
        self
    }

    /// `WHERE c1 AND c2 AND …`; no-op for an empty set.
    pub fn where_all(&mut self, conditions: &[String]) -> &mut Self {
        if !conditions.is_empty() {
            self.lines.push(format!("WHERE {}", conditions.join(" AND ")));
        }
        self
    }

    /// `WITH DISTINCT alias`, narrowing scope to one alias.
    pub fn with_distinct(&mut self, alias: &str) -> &mut Self {
        self.lines.push(format!("WITH DISTINCT {alias}"));
        self.scope = vec![alias.to_string()];
        self
    }

    /// Grouping re-projection plus the post-projection half of the
    /// null-safety contract: group keys become the new scope and every
    /// identity key is re-checked `IS NOT NULL` immediately after the
    /// stage, not only in the query's initial predicate.
    pub fn group_stage(
        &mut self,
        terms: &[GroupTerm],
        aggregate_expr: &str,
        aggregate_alias: &str,
    ) -> &mut Self {
        let mut projected: Vec<String> = terms
            .iter()
            .map(|t| format!("{} AS {}", t.expr, t.alias))
            .collect();
        projected.push(format!("{aggregate_expr} AS {aggregate_alias}"));
        self.lines.push(format!("WITH {}", projected.join(", ")));

        let refilter: Vec<String> = terms
            .iter()
            .filter(|t| t.identity)
            .map(|t| format!("{} IS NOT NULL", t.alias))
            .collect();
        if !refilter.is_empty() {
            self.lines.push(format!("WHERE {}", refilter.join(" AND ")));
        }

        self.scope = terms.iter().map(|t| t.alias.clone()).collect();
        self.scope.push(aggregate_alias.to_string());
        self
    }

    /// `RETURN expr AS alias, …`; aliases become the result columns.
    pub fn return_fields(&mut self, fields: &[(String, String)]) -> &mut Self {
        let rendered: Vec<String> = fields
            .iter()
            .map(|(expr, alias)| {
                if expr == alias {
                    alias.clone()
                } else {
                    format!("{expr} AS {alias}")
                }
            })
            .collect();
        self.lines.push(format!("RETURN {}", rendered.join(", ")));
        self.columns = fields.iter().map(|(_, alias)| alias.clone()).collect();
        self
    }

    /// `ORDER BY e1, e2, …`
    pub fn order_by(&mut self, exprs: &[String]) -> &mut Self {
        if !exprs.is_empty() {
            self.lines.push(format!("ORDER BY {}", exprs.join(", ")));
        }
        self
    }

    /// `LIMIT $pN`; the bound, like every other value, is a parameter.
    pub fn limit(&mut self, n: i64) -> &mut Self {
        let marker = self.bind(Value::from(n));
        self.lines.push(format!("LIMIT {marker}"));
        self
    }

    // Condition fragments. Each binds its value and returns the rendered
    // clause for `where_all`.

    pub fn cond_eq(&mut self, alias: &str, field: &Ident, value: Value) -> String {
        let marker = self.bind(value);
        format!("{alias}.{field} = {marker}")
    }

    pub fn cond_in(&mut self, alias: &str, field: &Ident, values: Vec<Value>) -> String {
        let marker = self.bind(Value::Array(values));
        format!("{alias}.{field} IN {marker}")
    }

    pub fn cond_contains(&mut self, alias: &str, field: &Ident, needle: String) -> String {
        let marker = self.bind(Value::String(needle));
        format!("toLower({alias}.{field}) CONTAINS toLower({marker})")
    }

    pub fn cond_not_null(&self, alias: &str, field: &Ident) -> String {
        format!("{alias}.{field} IS NOT NULL")
    }

    pub fn cond_is_null(&self, alias: &str, field: &Ident) -> String {
        format!("{alias}.{field} IS NULL")
    }

    pub fn compile(self) -> CompiledQuery {
        CompiledQuery {
            text: self.lines.join("\n"),
            params: self.params,
            columns: self.columns,
        }
    }
}

/// Recover the projection aliases of a raw query's `RETURN` clause.
///
/// Bolt rows are keyed by projection alias, so ad-hoc results need the
/// alias list to extract cells. Scans for the last top-level `RETURN`,
/// cuts the clause at `ORDER`/`SKIP`/`LIMIT`, splits on top-level commas
/// and takes the text after a trailing `AS` when present. Projections of
/// whole nodes (`RETURN n`) are recovered as `n`; their cells
/// deserialize best-effort.
pub fn return_columns(text: &str) -> Vec<String> {
    let Some(start) = find_last_keyword(text, "RETURN") else {
        return Vec::new();
    };
    let tail = &text[start..];
    let end = ["ORDER", "SKIP", "LIMIT"]
        .iter()
        .filter_map(|kw| find_first_keyword(tail, kw))
        .min()
        .unwrap_or(tail.len());
    let clause = &tail[..end];

    split_top_level(clause)
        .into_iter()
        .map(|segment| {
            let alias = match find_last_keyword(&segment, "AS") {
                Some(pos) => segment[pos..].trim().to_string(),
                None => segment.trim().to_string(),
            };
            alias.trim_start_matches("DISTINCT ").trim().trim_matches('`').to_string()
        })
        .filter(|alias| !alias.is_empty())
        .collect()
}

/// Byte offset just past the last top-level, whole-word occurrence of an
/// ASCII keyword (case-insensitive), outside quotes and brackets.
fn find_last_keyword(text: &str, keyword: &str) -> Option<usize> {
    scan_keyword(text, keyword).into_iter().last()
}

fn find_first_keyword(text: &str, keyword: &str) -> Option<usize> {
    // Offsets returned by scan_keyword point past the keyword; callers
    // cutting a clause need its start instead.
    scan_keyword(text, keyword)
        .into_iter()
        .next()
        .map(|past| past - keyword.len())
}

fn scan_keyword(text: &str, keyword: &str) -> Vec<usize> {
    let upper = text.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    let kw = keyword.as_bytes();
    let mut hits = Vec::new();

    let mut depth: i32 = 0;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => {
                quote = Some(b);
                i += 1;
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ => {}
        }
        if depth == 0 && bytes[i..].starts_with(kw) {
            let before_ok = i == 0 || !is_word_byte(bytes[i - 1]);
            let after = i + kw.len();
            let after_ok = after >= bytes.len() || !is_word_byte(bytes[after]);
            if before_ok && after_ok {
                hits.push(after);
                i = after;
                continue;
            }
        }
        i += 1;
    }
    hits
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Split on commas outside quotes and brackets.
fn split_top_level(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut quote: Option<u8> = None;
    let mut start = 0;

    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b',' if depth == 0 => {
                parts.push(text[start..i].to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].to_string());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ident_rejects_injection() {
        assert!(Ident::new("Incident").is_ok());
        assert!(Ident::new("_internal").is_ok());
        assert!(Ident::new("CAUSED_BY").is_ok());
        assert!(Ident::new("Incident) DETACH DELETE (n").is_err());
        assert!(Ident::new("n:Incident").is_err());
        assert!(Ident::new("").is_err());
        assert!(Ident::new("9lives").is_err());
    }

    #[test]
    fn test_values_never_reach_query_text() {
        let mut b = CypherBuilder::new();
        let label = Ident::new("Incident").unwrap();
        let severity = Ident::new("severity").unwrap();
        b.match_node("n", &label);
        let cond = b.cond_eq("n", &severity, json!("High'; DETACH DELETE n //"));
        b.where_all(&[cond]);
        b.return_fields(&[("n.severity".into(), "severity".into())]);
        b.limit(10);
        let compiled = b.compile();

        assert!(!compiled.text.contains("High"));
        assert!(!compiled.text.contains("DETACH"));
        assert!(compiled.text.contains("n.severity = $p0"));
        assert!(compiled.text.contains("LIMIT $p1"));
        assert_eq!(compiled.params.get("p0").unwrap(), "High'; DETACH DELETE n //");
        assert_eq!(compiled.params.get("p1").unwrap(), &json!(10));
    }

    #[test]
    fn test_guarded_optional_hop_emits_carry_filter() {
        let mut b = CypherBuilder::new();
        b.match_node("n0", &Ident::new("Incident").unwrap());
        b.optional_hop_guarded(
            "n0",
            &Ident::new("CAUSED_BY").unwrap(),
            "n1",
            &Ident::new("RootCause").unwrap(),
            &Ident::new("cause_id").unwrap(),
        );
        let compiled = b.compile();
        assert!(compiled
            .text
            .contains("OPTIONAL MATCH (n0)-[:CAUSED_BY]->(n1:RootCause)"));
        assert!(compiled
            .text
            .contains("WITH n0, n1 WHERE n1.cause_id IS NOT NULL"));
    }

    #[test]
    fn test_group_stage_refilters_identity_keys() {
        let mut b = CypherBuilder::new();
        b.match_node("n0", &Ident::new("Incident").unwrap());
        b.group_stage(
            &[
                GroupTerm {
                    expr: "n0.severity".into(),
                    alias: "category".into(),
                    identity: true,
                },
                GroupTerm {
                    expr: "n0.status".into(),
                    alias: "status".into(),
                    identity: false,
                },
            ],
            "count(n0)",
            "frequency",
        );
        let compiled = b.compile();
        assert!(compiled
            .text
            .contains("WITH n0.severity AS category, n0.status AS status, count(n0) AS frequency"));
        assert!(compiled.text.contains("WHERE category IS NOT NULL"));
        assert!(!compiled.text.contains("status IS NOT NULL"));
    }

    #[test]
    fn test_match_path_directions() {
        let mut b = CypherBuilder::new();
        b.match_node("n", &Ident::new("RootCause").unwrap());
        b.match_path(
            "n",
            &[
                (
                    Direction::Reverse,
                    Ident::new("CAUSED_BY").unwrap(),
                    "s1".into(),
                    Ident::new("Incident").unwrap(),
                ),
                (
                    Direction::Forward,
                    Ident::new("OCCURRED_AT").unwrap(),
                    "s2".into(),
                    Ident::new("Facility").unwrap(),
                ),
            ],
        );
        let compiled = b.compile();
        assert!(compiled
            .text
            .contains("MATCH (n)<-[:CAUSED_BY]-(s1:Incident)-[:OCCURRED_AT]->(s2:Facility)"));
    }

    #[test]
    fn test_return_columns_plain_and_aliased() {
        assert_eq!(
            return_columns("MATCH (n) RETURN n.title AS title, n.status LIMIT 5"),
            vec!["title", "n.status"]
        );
        assert_eq!(
            return_columns("MATCH (n) RETURN count(n) AS total"),
            vec!["total"]
        );
    }

    #[test]
    fn test_return_columns_ignores_nested_commas_and_keywords() {
        let cols = return_columns(
            "MATCH (n) RETURN collect({id: n.id, label: 'RETURN, AS'}) AS items, n.name ORDER BY n.name LIMIT 3",
        );
        assert_eq!(cols, vec!["items", "n.name"]);
    }

    #[test]
    fn test_return_columns_none_without_return() {
        assert!(return_columns("MATCH (n) DELETE n").is_empty());
    }

    #[test]
    fn test_return_columns_skips_order_by_tail() {
        let cols = return_columns("MATCH (n) RETURN n.a AS a ORDER BY a DESC SKIP 5 LIMIT 10");
        assert_eq!(cols, vec!["a"]);
    }
}
