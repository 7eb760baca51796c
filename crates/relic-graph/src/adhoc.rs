//! Validated ad-hoc execution.
//!
//! The one path from operator-typed query text to the store: the
//! validator rules first, and the compiler only sees text that passed.

use tracing::info;

use relic_schema::FieldMap;

use crate::compiler::QueryCompiler;
use crate::result::QueryResult;
use crate::validate::QueryValidator;

/// Outcome of an ad-hoc request.
#[derive(Debug)]
pub enum AdHocOutcome {
    /// Validation failed; the query never reached the store.
    Rejected { reason: String },
    /// Validation passed and the query ran; the envelope carries the
    /// rows or the execution failure.
    Executed(QueryResult),
}

/// Validate and, on acceptance, execute free-form query text with an
/// empty parameter set.
pub async fn run_adhoc(
    validator: &QueryValidator,
    compiler: &QueryCompiler,
    text: &str,
) -> AdHocOutcome {
    let verdict = validator.check(text);
    if !verdict.is_valid {
        info!("Ad-hoc query rejected: {}", verdict.message);
        return AdHocOutcome::Rejected {
            reason: verdict.message,
        };
    }
    AdHocOutcome::Executed(compiler.execute_raw(text, FieldMap::new()).await)
}
