//! Local static analysis of source text.
//!
//! Everything here is synchronous and pure: rule evaluation, complexity,
//! dependency extraction and the coverage estimate.

mod analyzer;
mod complexity;
mod coverage;
mod imports;
mod patterns;
mod types;

pub use analyzer::{AnalysisError, LocalAnalysis, StaticAnalyzer};
pub use complexity::{cyclomatic_complexity, BASELINE_COMPLEXITY};
pub use coverage::estimate_test_coverage;
pub use imports::extract_dependencies;
pub use patterns::{evaluate_rules, find_line_numbers};
pub use types::{Finding, Findings, Metrics, TestCoverage};
