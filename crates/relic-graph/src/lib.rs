//! # RELIC Graph
//!
//! Query compilation and execution over the reliability property graph.
//!
//! The compiler builds parameterized Cypher from schema registry
//! lookups, enforcing two boundary rules everywhere: structural
//! identifiers come only from validated [`cypher::Ident`] values, and
//! data values travel only as bound parameters. Optional-chain
//! aggregations get null-identity guards emitted structurally by the
//! builder. Execution goes through the [`runner::QueryRunner`] seam:
//! [`client::GraphClient`] for a live Bolt store, [`runner::StaticRunner`]
//! for fixtures. Failures surface as [`result::QueryResult`] envelopes,
//! never as raw errors.

pub mod adhoc;
pub mod client;
pub mod compiler;
pub mod cypher;
pub mod error;
pub mod result;
pub mod runner;
pub mod validate;

pub use adhoc::{run_adhoc, AdHocOutcome};
pub use client::{GraphClient, GraphConfig, GraphCounts};
pub use compiler::{Aggregate, ChainHop, ChainScope, GroupKey, QueryCompiler, ScopeStep};
pub use cypher::{CypherBuilder, Direction, Ident, FILTER_NOT_NULL};
pub use error::{GraphError, GraphResult};
pub use result::{QueryResult, ResultMeta};
pub use runner::{make_row, CompiledQuery, QueryRunner, StaticRunner};
pub use validate::{QueryValidator, Verdict, DEFAULT_FORBIDDEN};
