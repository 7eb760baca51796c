//! Ad-hoc query gate.
//!
//! Free-form Cypher from operators goes through `QueryValidator` before
//! it is allowed anywhere near the store. Checks run in a fixed order
//! and the first failure wins, so a query missing both a `RETURN` and a
//! `LIMIT` is reported for the missing `RETURN`. Keyword matching is
//! whole-token and case-insensitive: `created_at` is a field name, not
//! a `CREATE`. Tokens inside string literals are not exempt; the gate
//! is deliberately conservative.

use serde::Serialize;

/// Keywords that make a query a write (or an escape hatch into one).
pub const DEFAULT_FORBIDDEN: &[&str] = &[
    "create", "merge", "delete", "detach", "set", "remove", "drop", "foreach", "call", "load",
];

const DEFAULT_MAX_LENGTH: usize = 4000;
const DEFAULT_MAX_LIMIT: i64 = 500;

/// Outcome of validating one query text.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub is_valid: bool,
    pub message: String,
}

impl Verdict {
    fn accept() -> Self {
        Self {
            is_valid: true,
            message: "Query accepted".to_string(),
        }
    }

    fn reject(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
        }
    }
}

/// Read-only gate for operator-supplied query text.
#[derive(Debug, Clone)]
pub struct QueryValidator {
    max_length: usize,
    max_limit: i64,
    forbidden: Vec<String>,
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            max_limit: DEFAULT_MAX_LIMIT,
            forbidden: DEFAULT_FORBIDDEN.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl QueryValidator {
    pub fn new(max_length: usize, max_limit: i64) -> Self {
        Self {
            max_length,
            max_limit,
            ..Self::default()
        }
    }

    /// Replace the forbidden keyword list; entries match whole tokens,
    /// case-insensitively.
    pub fn with_forbidden<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbidden = words.into_iter().map(|w| w.into().to_lowercase()).collect();
        self
    }

    pub fn max_limit(&self) -> i64 {
        self.max_limit
    }

    /// Evaluate query text. Checks run in order; the first failure is
    /// the verdict.
    pub fn check(&self, text: &str) -> Verdict {
        if text.trim().is_empty() {
            return Verdict::reject("Query is empty");
        }

        if text.chars().count() > self.max_length {
            return Verdict::reject(format!(
                "Query exceeds the maximum length of {} characters",
                self.max_length
            ));
        }

        let tokens: Vec<&str> = tokenize(text).collect();

        for token in &tokens {
            let lower = token.to_lowercase();
            if self.forbidden.iter().any(|w| *w == lower) {
                return Verdict::reject(format!("Query contains forbidden keyword '{lower}'"));
            }
        }

        if !tokens.iter().any(|t| t.eq_ignore_ascii_case("return")) {
            return Verdict::reject("Query must include a RETURN clause");
        }

        let Some(limit_at) = tokens.iter().position(|t| t.eq_ignore_ascii_case("limit")) else {
            return Verdict::reject("Query must include a LIMIT clause");
        };

        // Only a literal bound is verifiable; `LIMIT $n` is rejected.
        match tokens.get(limit_at + 1).and_then(|t| t.parse::<i64>().ok()) {
            Some(bound) if bound > self.max_limit => Verdict::reject(format!(
                "LIMIT {} exceeds the maximum of {}",
                bound, self.max_limit
            )),
            Some(_) => Verdict::accept(),
            None => Verdict::reject("LIMIT value could not be verified"),
        }
    }
}

/// Word tokens: runs of `[A-Za-z0-9_]`, everything else is a separator.
fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> QueryValidator {
        QueryValidator::default()
    }

    #[test]
    fn test_accepts_well_formed_query() {
        let verdict = validator().check("MATCH (n:Incident) RETURN n.title AS title LIMIT 25");
        assert!(verdict.is_valid);
    }

    #[test]
    fn test_accepts_lowercase_clauses() {
        assert!(validator().check("match (n) return n limit 10").is_valid);
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert!(!validator().check("").is_valid);
        let verdict = validator().check("   \n\t ");
        assert!(!verdict.is_valid);
        assert!(verdict.message.contains("empty"));
    }

    #[test]
    fn test_rejects_over_length() {
        let padding = "x".repeat(4001);
        let verdict = validator().check(&padding);
        assert!(!verdict.is_valid);
        assert!(verdict.message.contains("4000"));
    }

    #[test]
    fn test_rejects_each_forbidden_keyword() {
        for keyword in DEFAULT_FORBIDDEN {
            let query = format!("MATCH (n) {} (m) RETURN n LIMIT 1", keyword.to_uppercase());
            let verdict = validator().check(&query);
            assert!(!verdict.is_valid, "{keyword} should be rejected");
            assert!(verdict.message.contains(keyword));
        }
    }

    #[test]
    fn test_forbidden_matches_whole_tokens_only() {
        let verdict =
            validator().check("MATCH (n) WHERE n.created_at > 0 RETURN n.settings LIMIT 5");
        assert!(verdict.is_valid);
    }

    #[test]
    fn test_first_forbidden_keyword_in_text_order_wins() {
        let verdict = validator().check("MATCH (n) DETACH DELETE n RETURN n LIMIT 1");
        assert!(!verdict.is_valid);
        assert!(verdict.message.contains("detach"));
    }

    #[test]
    fn test_length_outranks_forbidden_keywords() {
        let query = format!("CREATE (n) {}", "x".repeat(4000));
        let verdict = validator().check(&query);
        assert!(!verdict.is_valid);
        assert!(verdict.message.contains("maximum length"));
    }

    #[test]
    fn test_missing_return_outranks_missing_limit() {
        let verdict = validator().check("MATCH (n:Incident) WHERE n.severity = 'High'");
        assert!(!verdict.is_valid);
        assert!(verdict.message.contains("RETURN"));
    }

    #[test]
    fn test_missing_limit_has_its_own_reason() {
        let verdict = validator().check("MATCH (n) RETURN n");
        assert!(!verdict.is_valid);
        assert!(verdict.message.contains("LIMIT"));
        assert!(!verdict.message.contains("RETURN"));
    }

    #[test]
    fn test_limit_bound_at_and_over_maximum() {
        assert!(validator().check("MATCH (n) RETURN n LIMIT 500").is_valid);
        let verdict = validator().check("MATCH (n) RETURN n LIMIT 501");
        assert!(!verdict.is_valid);
        assert!(verdict.message.contains("501"));
        assert!(verdict.message.contains("500"));
    }

    #[test]
    fn test_parameterized_limit_is_unverifiable() {
        let verdict = validator().check("MATCH (n) RETURN n LIMIT $n");
        assert!(!verdict.is_valid);
        assert!(verdict.message.contains("verified"));
    }

    #[test]
    fn test_first_limit_token_is_the_one_checked() {
        let verdict = validator().check("MATCH (n) RETURN n LIMIT 9999 LIMIT 1");
        assert!(!verdict.is_valid);
    }

    #[test]
    fn test_custom_limits_and_keywords() {
        let validator = QueryValidator::new(100, 50).with_forbidden(["profile"]);
        assert!(!validator.check("PROFILE MATCH (n) RETURN n LIMIT 10").is_valid);
        // `create` is no longer on the custom list.
        assert!(validator.check("MATCH (n) RETURN n.create LIMIT 10").is_valid);
        assert!(!validator.check("MATCH (n) RETURN n LIMIT 51").is_valid);
    }
}
