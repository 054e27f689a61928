//! Integration tests for single-sample analysis through the public API.
//!
//! These exercise the analyzer, the cache and the model boundary together,
//! using test doubles for the completion model and the cache backend.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use autoreview::cache::{CacheBackend, CacheError, CacheStore, FileBackend, Namespace, TtlPolicy};
use autoreview::model::{CompletionModel, ModelConfig, ModelError};
use autoreview::{AnalysisOutcome, AnalysisService, CodeSample, Language, StaticAnalyzer};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(testdata_path().join(name)).expect("fixture should exist")
}

fn memory_service() -> AnalysisService {
    AnalysisService::new(Arc::new(CacheStore::in_memory(TtlPolicy::default())))
}

/// Model that always times out at the transport level.
struct TimeoutModel {
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionModel for TimeoutModel {
    async fn complete(&self, _prompt: &str, _config: &ModelConfig) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ModelError::Timeout)
    }

    fn name(&self) -> &str {
        "timeout"
    }
}

/// Model that answers with a fenced JSON object.
struct FencedModel;

#[async_trait]
impl CompletionModel for FencedModel {
    async fn complete(&self, _prompt: &str, _config: &ModelConfig) -> Result<String, ModelError> {
        Ok("```json\n{\"quality_issues\": [{\"description\": \"no docstring\"}], \
            \"performance_issues\": [\"avoid range(len())\"]}\n```"
            .to_string())
    }

    fn name(&self) -> &str {
        "fenced"
    }
}

/// Cache backend that is never reachable.
struct UnreachableBackend;

#[async_trait]
impl CacheBackend for UnreachableBackend {
    async fn ping(&self) -> bool {
        false
    }
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
    async fn set(&self, _key: &str, _value: &str, _ttl: Option<u64>) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
    fn name(&self) -> &str {
        "unreachable"
    }
}

#[test]
fn test_eval_finding_on_line_one() {
    let analysis = StaticAnalyzer::default()
        .analyze("eval(x)", Language::Python)
        .unwrap();
    let security = &analysis.findings.security;
    assert_eq!(security.len(), 1);
    assert_eq!(security[0].message, "Use of eval() is dangerous");
    assert_eq!(security[0].line_numbers, vec![1]);
}

#[test]
fn test_complexity_counts_control_structures() {
    let code = "\
if a:
    pass
if b:
    pass
if c:
    pass
for x in items:
    pass
";
    let metrics = StaticAnalyzer::default().metrics(code, Language::Python);
    assert_eq!(metrics.cyclomatic_complexity, 5);
}

#[test]
fn test_unknown_language_degrades() {
    let analyzer = StaticAnalyzer::default();
    let language = Language::parse("brainfuck");
    let analysis = analyzer.analyze("++[>+<-]import os", language).unwrap();

    assert!(analysis.metrics.dependencies.is_empty());
    assert_eq!(analysis.metrics.cyclomatic_complexity, 1);
    assert!(analysis.findings.is_empty());

    let json = serde_json::to_value(&analysis.findings).unwrap();
    for category in ["security", "performance", "maintainability"] {
        assert_eq!(json[category], serde_json::json!([]));
    }
}

#[test]
fn test_python_fixture() {
    let code = read_fixture("sample.py");
    let analysis = StaticAnalyzer::default()
        .analyze(&code, Language::Python)
        .unwrap();
    let m = &analysis.metrics;

    assert_eq!(m.lines_of_code, 18);
    assert_eq!(m.cyclomatic_complexity, 4);
    let deps: Vec<&str> = m.dependencies.iter().map(String::as_str).collect();
    assert_eq!(deps, vec!["collections", "os", "sys"]);
    assert_eq!(m.test_coverage_estimate.unit_test_hits, 1);
    assert_eq!(m.test_coverage_estimate.total_coverage_percent, 10);

    let security: Vec<(&str, &[usize])> = analysis
        .findings
        .security
        .iter()
        .map(|f| (f.message.as_str(), f.line_numbers.as_slice()))
        .collect();
    assert_eq!(
        security,
        vec![
            ("Use of eval() is dangerous", &[8usize][..]),
            ("Use of os.system() is dangerous", &[13usize][..]),
        ]
    );
    assert_eq!(analysis.findings.performance[0].line_numbers, vec![11]);
    assert!(analysis.findings.maintainability.is_empty());
}

#[test]
fn test_javascript_fixture() {
    let code = read_fixture("sample.js");
    let analysis = StaticAnalyzer::default()
        .analyze(&code, Language::JavaScript)
        .unwrap();
    let m = &analysis.metrics;

    assert_eq!(m.lines_of_code, 17);
    assert_eq!(m.cyclomatic_complexity, 3);
    let deps: Vec<&str> = m.dependencies.iter().map(String::as_str).collect();
    assert_eq!(deps, vec!["express", "fs", "lodash"]);
    assert_eq!(m.test_coverage_estimate.unit_test_hits, 2);

    assert_eq!(analysis.findings.security.len(), 2);
    assert_eq!(
        analysis.findings.performance[0].message,
        "Use let instead of var in for loops"
    );
    assert_eq!(analysis.findings.maintainability[0].line_numbers, vec![10]);

    // TypeScript shares the JavaScript tables.
    let ts = StaticAnalyzer::default()
        .analyze(&code, Language::TypeScript)
        .unwrap();
    assert_eq!(ts.findings, analysis.findings);
}

#[tokio::test]
async fn test_model_timeout_keeps_local_findings() {
    let model = Arc::new(TimeoutModel {
        calls: AtomicUsize::new(0),
    });
    let service = memory_service().with_model(model.clone());

    let outcome = service
        .analyze(&CodeSample::new("eval(x)", Language::Python))
        .await;
    let report = outcome.report().expect("timeout must not fail the report");

    assert!(report.model_derived.quality_issues.is_empty());
    assert_eq!(report.findings.security.len(), 1);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fenced_model_output() {
    let service = memory_service().with_model(Arc::new(FencedModel));
    let outcome = service
        .analyze(&CodeSample::new(read_fixture("sample.py"), Language::Python))
        .await;
    let report = outcome.report().unwrap();
    assert_eq!(report.model_derived.quality_issues.len(), 1);
    assert_eq!(report.model_derived.performance_optimizations.len(), 1);
    assert!(report.model_derived.best_practices.is_empty());
}

#[tokio::test]
async fn test_repeat_analysis_served_from_cache() {
    let model = Arc::new(TimeoutModel {
        calls: AtomicUsize::new(0),
    });
    let service = memory_service().with_model(model.clone());
    let sample = CodeSample::new(read_fixture("sample.js"), Language::JavaScript);

    let first = service.analyze(&sample).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = service.analyze(&sample).await;

    assert_eq!(first.timestamp(), second.timestamp());
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    let usage = service.usage_snapshot();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].task_type, "code_analysis");
    assert_eq!(usage[0].request_count, 1);
    assert!(usage[0].total_tokens > 0);
}

#[tokio::test]
async fn test_unreachable_cache_still_round_trips() {
    let cache = Arc::new(CacheStore::connect(Arc::new(UnreachableBackend), TtlPolicy::default()).await);
    assert!(!cache.is_primary_available());

    let service = AnalysisService::new(cache.clone());
    let sample = CodeSample::new("import os\n", Language::Python);
    let first = service.analyze(&sample).await;
    let second = service.analyze(&sample).await;
    assert_eq!(first, second);
    assert!(cache.exists(&Namespace::CodeAnalysis.key(&sample.fingerprint())).await);
}

#[tokio::test]
async fn test_file_backend_shared_between_stores() {
    let temp = tempfile::TempDir::new().unwrap();
    let sample = CodeSample::new("eval(x)\n", Language::Python);

    let first = {
        let backend = Arc::new(FileBackend::new(temp.path()));
        let cache = Arc::new(CacheStore::connect(backend, TtlPolicy::default()).await);
        assert!(cache.is_primary_available());
        AnalysisService::new(cache).analyze(&sample).await
    };

    let backend = Arc::new(FileBackend::new(temp.path()));
    let cache = Arc::new(CacheStore::connect(backend, TtlPolicy::default()).await);
    let second = AnalysisService::new(cache).analyze(&sample).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_binary_input_yields_error_report() {
    let model = Arc::new(TimeoutModel {
        calls: AtomicUsize::new(0),
    });
    let service = memory_service().with_model(model.clone());
    let outcome = service
        .analyze(&CodeSample::new("\u{0}\u{1}\u{2}", Language::Python))
        .await;
    assert!(matches!(outcome, AnalysisOutcome::Error(_)));

    let json = serde_json::to_value(&outcome).unwrap();
    let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&"error"));
    assert!(keys.contains(&"timestamp"));

    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert!(service.usage_snapshot().is_empty());
}
