//! Autoreview - pattern-based code review with cached reports.
//!
//! Autoreview scans source text with per-language regular-expression rules,
//! computes size and complexity metrics, optionally asks a completion model
//! for a second opinion, and caches the combined report by content
//! fingerprint.
//!
//! # Architecture
//!
//! - `rules`: rule tables per language and category
//! - `detect`: static analyzer producing findings and metrics
//! - `aggregate`: report assembly and model output parsing
//! - `cache`: cache with a primary backend and in-memory fallback
//! - `model`: completion model boundary, task configuration, usage counters
//! - `service`: orchestration of cache, analyzer and model
//! - `source`: repository file listing
//! - `config`: YAML configuration
//! - `report`: output formatting (pretty, JSON)
//! - `score`: codebase health score
//!
//! # Adding a Language
//!
//! Add a table module under `src/rules/` and register it in
//! `RuleSet::compile_builtin`, then map its name and extensions in
//! `Language`.

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod detect;
pub mod logging;
pub mod model;
pub mod report;
pub mod rules;
pub mod score;
pub mod service;
pub mod source;

pub use aggregate::{AnalysisOutcome, AnalysisReport, ErrorReport, ModelDerived, ReportAggregator};
pub use cache::{CacheStore, CacheTier, Namespace, TtlPolicy};
pub use config::Config;
pub use logging::init;
pub use detect::{Finding, Findings, Metrics, StaticAnalyzer};
pub use model::{CompletionModel, ModelError, ModelManager, UsageCounter, UsageTracker};
pub use rules::{Category, Language, RuleSet, Severity};
pub use service::{AnalysisService, CodeSample, CodebaseReport};
pub use source::{LocalDirectory, RepositorySource, SourceFile};
