//! # RELIC Analytics
//!
//! Intelligence aggregators over the query compiler: data completion,
//! causal patterns, distribution breakdowns and cross-facility
//! comparison. All percentages, rates and ranks come from the shared
//! [`metrics`] module, so any two views of the same scope agree by
//! construction. Raw envelope rows enter through the typed [`boundary`]
//! module, which drops null-identity rows once, at the edge. Every
//! analyzer method degrades to an empty or zero-valued structure on
//! failure; one broken metric never takes down a composed report.

pub mod boundary;
pub mod causal;
pub mod comparison;
pub mod completion;
pub mod config;
pub mod distribution;
pub mod metrics;

pub use boundary::{causal_rows, share_rows, CausalRow, ShareRow};
pub use causal::{CausalAnalyzer, CausalPattern};
pub use comparison::{ComparisonAnalyzer, EntityComparison};
pub use completion::{CompletionAnalyzer, CompletionRecord, StageCompletion};
pub use config::{AnalyticsConfig, CausalConfig, ComparisonConfig, StageBinding};
pub use distribution::{CategoryShare, DistributionAnalyzer};
