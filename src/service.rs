//! Analysis orchestration.
//!
//! `AnalysisService` checks the cache, runs local analysis and the model
//! call side by side on a miss, assembles the report and stores it. Cache
//! and model failures never reach the caller; only a failure of local
//! analysis turns into an error report, and error reports are not cached.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::aggregate::{AnalysisOutcome, AnalysisReport, ErrorReport, ModelDerived, ReportAggregator};
use crate::cache::{CacheStore, Namespace};
use crate::detect::{AnalysisError, Findings, Metrics, StaticAnalyzer};
use crate::model::{
    estimate_tokens, CompletionModel, ModelError, ModelManager, TaskType, UsageCounter,
    UsageTracker,
};
use crate::rules::{Category, Language};
use crate::score::{self, HealthScore};
use crate::source::{
    RepositorySource, SkipReason, SkippedFile, SourceError, SourceFile, SourceListing,
    DEFAULT_MAX_FILE_BYTES,
};

/// Default limit on a single model call.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(30);

/// A piece of source code to analyze.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSample {
    pub content: String,
    pub language: Language,
}

impl CodeSample {
    pub fn new(content: impl Into<String>, language: Language) -> Self {
        Self {
            content: content.into(),
            language,
        }
    }

    /// Deterministic cache identifier for content and language.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.language.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.content.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Local analysis of one file in a codebase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: String,
    pub language: Language,
    pub metrics: Metrics,
    pub findings: Findings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodebaseStatus {
    /// Every listed source file was analyzed
    Completed,
    /// Some source files were skipped (too large, binary or unreadable)
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodebaseSummary {
    pub total_lines: usize,
    pub mean_complexity: f64,
    pub dependencies: BTreeSet<String>,
    pub findings_by_category: BTreeMap<String, usize>,
    pub findings_by_severity: BTreeMap<String, usize>,
    pub skipped: Vec<SkippedFile>,
    pub health: HealthScore,
}

/// Aggregated local analysis of a set of files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodebaseReport {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub status: CodebaseStatus,
    pub files_analyzed: usize,
    pub total_issues: usize,
    pub summary: CodebaseSummary,
    pub files: Vec<FileReport>,
}

/// Analysis entry point shared by the CLI and any outer surface.
pub struct AnalysisService {
    aggregator: ReportAggregator,
    model: Option<Arc<dyn CompletionModel>>,
    models: Arc<ModelManager>,
    usage: Arc<UsageTracker>,
    cache: Arc<CacheStore>,
    model_timeout: Duration,
    max_file_bytes: u64,
}

impl AnalysisService {
    /// Local-only service over `cache` with built-in rules.
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self {
            aggregator: ReportAggregator::default(),
            model: None,
            models: Arc::new(ModelManager::new()),
            usage: Arc::new(UsageTracker::new()),
            cache,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    pub fn with_analyzer(mut self, analyzer: StaticAnalyzer) -> Self {
        self.aggregator = ReportAggregator::new(analyzer);
        self
    }

    pub fn with_model(mut self, model: Arc<dyn CompletionModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_model_manager(mut self, models: Arc<ModelManager>) -> Self {
        self.models = models;
        self
    }

    pub fn with_usage_tracker(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = max;
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn model_manager(&self) -> &ModelManager {
        &self.models
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    pub fn usage_snapshot(&self) -> Vec<UsageCounter> {
        self.usage.snapshot()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Analyze a sample, serving repeated samples from the cache.
    pub async fn analyze(&self, sample: &CodeSample) -> AnalysisOutcome {
        self.analyze_with_context(sample, None).await
    }

    /// Like `analyze`, with extra JSON context embedded in the model prompt.
    ///
    /// The context does not take part in the cache key.
    pub async fn analyze_with_context(
        &self,
        sample: &CodeSample,
        context: Option<&Value>,
    ) -> AnalysisOutcome {
        let fingerprint = sample.fingerprint();

        if let Some(report) = self
            .cache
            .fetch::<AnalysisReport>(Namespace::CodeAnalysis, &fingerprint)
            .await
        {
            debug!(fingerprint = %fingerprint, "analysis served from cache");
            return AnalysisOutcome::Report(report);
        }

        // Input that local analysis rejects never reaches the model.
        if let Err(e) = StaticAnalyzer::check_input(&sample.content) {
            error!(fingerprint = %fingerprint, error = %e, "analysis failed");
            return AnalysisOutcome::Error(ErrorReport::new(e));
        }

        let analyzer = self.aggregator.analyzer().clone();
        let code = sample.content.clone();
        let language = sample.language;
        let local = tokio::task::spawn_blocking(move || analyzer.analyze(&code, language));

        let (local, model_output) = tokio::join!(local, self.model_analysis(sample, context));
        let local = local.unwrap_or_else(|e| Err(AnalysisError::Worker(e.to_string())));

        let outcome: AnalysisOutcome = local
            .map(|local| ReportAggregator::assemble(local, language, model_output))
            .into();

        match &outcome {
            AnalysisOutcome::Report(report) => {
                self.cache
                    .put(Namespace::CodeAnalysis, &fingerprint, report)
                    .await;
            }
            AnalysisOutcome::Error(report) => {
                error!(fingerprint = %fingerprint, error = %report.error, "analysis failed");
            }
        }

        outcome
    }

    /// Model-derived sections, or `None` when no model is configured or the
    /// call fails for any reason.
    async fn model_analysis(
        &self,
        sample: &CodeSample,
        context: Option<&Value>,
    ) -> Option<ModelDerived> {
        let model = self.model.as_ref()?;
        let task = TaskType::CodeAnalysis;
        let prompt =
            self.models
                .render_prompt(task, &sample.content, sample.language.as_str(), context);
        let config = self.models.config_for(task);

        self.usage.track(task.as_str(), estimate_tokens(&prompt));

        let result = match tokio::time::timeout(self.model_timeout, model.complete(&prompt, &config))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout),
        };

        match result.and_then(|text| ModelDerived::parse(&text)) {
            Ok(derived) => Some(derived),
            Err(e) => {
                warn!(
                    model = model.name(),
                    error = %e,
                    "model analysis unavailable, keeping local findings only"
                );
                None
            }
        }
    }

    /// Analyze every file of a repository, reusing a cached report when one
    /// exists for the repository's identifier.
    pub async fn analyze_repository(
        &self,
        source: &dyn RepositorySource,
    ) -> Result<CodebaseReport, ServiceError> {
        let id = source.identifier();
        if let Some(report) = self
            .cache
            .fetch::<CodebaseReport>(Namespace::Analysis, &id)
            .await
        {
            debug!(id = %id, "codebase analysis served from cache");
            return Ok(report);
        }

        let listing = source.list_files().await?;
        Ok(self.analyze_codebase(&id, listing).await?)
    }

    /// Analyze a set of files locally and store the result under `id`.
    ///
    /// Files are analyzed in parallel. Files of unknown language, oversized
    /// files and binary files are skipped and listed in the summary.
    pub async fn analyze_codebase(
        &self,
        id: &str,
        listing: impl Into<SourceListing>,
    ) -> Result<CodebaseReport, AnalysisError> {
        let SourceListing { files, skipped } = listing.into();
        let analyzer = self.aggregator.analyzer().clone();
        let max_file_bytes = self.max_file_bytes;

        let (reports, mut skipped_here) = tokio::task::spawn_blocking(move || {
            analyze_files(&analyzer, &files, max_file_bytes)
        })
        .await
        .map_err(|e| AnalysisError::Worker(e.to_string()))?;

        let mut all_skipped = skipped;
        all_skipped.append(&mut skipped_here);

        let report = build_codebase_report(id, reports, all_skipped);
        info!(
            id = %id,
            files = report.files_analyzed,
            issues = report.total_issues,
            "codebase analysis complete"
        );

        self.cache.put(Namespace::Analysis, id, &report).await;
        Ok(report)
    }

    /// Previously stored codebase report.
    pub async fn cached_codebase(&self, id: &str) -> Option<CodebaseReport> {
        self.cache.fetch(Namespace::Analysis, id).await
    }
}

fn analyze_files(
    analyzer: &StaticAnalyzer,
    files: &[SourceFile],
    max_file_bytes: u64,
) -> (Vec<FileReport>, Vec<SkippedFile>) {
    let results: Vec<Result<FileReport, SkippedFile>> = files
        .par_iter()
        .map(|file| {
            let skip = |reason| SkippedFile {
                path: file.path.clone(),
                reason,
            };
            if !file.language.is_known() {
                return Err(skip(SkipReason::UnknownLanguage));
            }
            if file.content.len() as u64 > max_file_bytes {
                return Err(skip(SkipReason::TooLarge));
            }
            match analyzer.analyze(&file.content, file.language) {
                Ok(local) => Ok(FileReport {
                    path: file.path.clone(),
                    language: file.language,
                    metrics: local.metrics,
                    findings: local.findings,
                }),
                Err(e) => {
                    debug!(path = %file.path, error = %e, "skipping file");
                    Err(skip(SkipReason::Binary))
                }
            }
        })
        .collect();

    let mut reports = Vec::new();
    let mut skipped = Vec::new();
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            Err(skip) => skipped.push(skip),
        }
    }
    (reports, skipped)
}

fn build_codebase_report(
    id: &str,
    files: Vec<FileReport>,
    skipped: Vec<SkippedFile>,
) -> CodebaseReport {
    let total_lines = files.iter().map(|f| f.metrics.lines_of_code).sum();
    let mean_complexity = if files.is_empty() {
        0.0
    } else {
        files
            .iter()
            .map(|f| f.metrics.cyclomatic_complexity as f64)
            .sum::<f64>()
            / files.len() as f64
    };

    let dependencies: BTreeSet<String> = files
        .iter()
        .flat_map(|f| f.metrics.dependencies.iter().cloned())
        .collect();

    let mut by_category: BTreeMap<String, usize> = Category::ALL
        .iter()
        .map(|c| (c.as_str().to_string(), 0))
        .collect();
    let mut by_severity: BTreeMap<String, usize> = BTreeMap::new();
    for finding in files.iter().flat_map(|f| f.findings.iter()) {
        *by_category
            .entry(finding.category.as_str().to_string())
            .or_insert(0) += 1;
        *by_severity.entry(finding.severity.to_string()).or_insert(0) += 1;
    }

    let total_issues = files.iter().map(|f| f.findings.total()).sum();
    let health = score::calculate(files.iter().map(|f| &f.findings));
    let status = if !skipped.iter().any(|s| s.reason.loses_coverage()) {
        CodebaseStatus::Completed
    } else {
        CodebaseStatus::Partial
    };

    CodebaseReport {
        id: id.to_string(),
        timestamp: Utc::now(),
        status,
        files_analyzed: files.len(),
        total_issues,
        summary: CodebaseSummary {
            total_lines,
            mean_complexity,
            dependencies,
            findings_by_category: by_category,
            findings_by_severity: by_severity,
            skipped,
            health,
        },
        files,
    }
}
