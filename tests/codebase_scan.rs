//! Integration tests for codebase scans over the testdata fixtures.

use std::path::PathBuf;
use std::sync::Arc;

use autoreview::cache::{CacheStore, Namespace, TtlPolicy};
use autoreview::config::Config;
use autoreview::service::CodebaseStatus;
use autoreview::{AnalysisService, LocalDirectory, RepositorySource, StaticAnalyzer};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn service() -> AnalysisService {
    AnalysisService::new(Arc::new(CacheStore::in_memory(TtlPolicy::default())))
}

#[tokio::test]
async fn test_scan_testdata() {
    let source = LocalDirectory::new(testdata_path());
    let service = service();
    let report = service.analyze_repository(&source).await.unwrap();

    assert_eq!(report.status, CodebaseStatus::Completed);
    assert_eq!(report.files_analyzed, 2);
    let paths: Vec<&str> = report.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["sample.js", "sample.py"]);

    let summary = &report.summary;
    assert_eq!(summary.total_lines, 35);
    assert_eq!(summary.mean_complexity, 3.5);
    assert_eq!(summary.dependencies.len(), 6);
    assert_eq!(summary.findings_by_category["security"], 4);
    assert_eq!(summary.findings_by_category["performance"], 2);
    assert_eq!(summary.findings_by_category["maintainability"], 1);
    assert_eq!(summary.findings_by_severity["high"], 4);
    assert_eq!(summary.findings_by_severity["medium"], 3);
    assert_eq!(report.total_issues, 7);

    assert_eq!(summary.health.score, 55);
    assert_eq!(summary.health.grade, "D");
}

#[tokio::test]
async fn test_repeat_scan_uses_cache() {
    let source = LocalDirectory::new(testdata_path());
    let service = service();

    let first = service.analyze_repository(&source).await.unwrap();
    let second = service.analyze_repository(&source).await.unwrap();
    assert_eq!(first.timestamp, second.timestamp);

    assert!(service.cache().exists(&Namespace::Analysis.key(&source.identifier())).await);
    assert!(service.cache().remove(Namespace::Analysis, &source.identifier()).await);

    let third = service.analyze_repository(&source).await.unwrap();
    assert!(third.timestamp >= first.timestamp);
    assert_eq!(third.summary, first.summary);
}

#[tokio::test]
async fn test_scan_with_fixture_config() {
    let config = Config::parse_file(testdata_path().join("autoreview.yaml")).unwrap();
    autoreview::config::validate(&config).unwrap();

    let source = LocalDirectory::new(testdata_path())
        .with_exclusions(&config.analysis.excluded_paths)
        .unwrap();
    let service = service().with_analyzer(StaticAnalyzer::new(config.rule_set().unwrap()));

    let listing = source.list_files().await.unwrap();
    let report = service.analyze_codebase("fixture", listing).await.unwrap();

    assert_eq!(report.files_analyzed, 1);
    let file = &report.files[0];
    assert_eq!(file.path, "sample.py");
    let custom = &file.findings.maintainability;
    assert_eq!(custom.len(), 1);
    assert_eq!(custom[0].message, "OrderedDict is unnecessary on Python 3.7+");
    assert_eq!(custom[0].line_numbers, vec![4]);
    assert_eq!(report.summary.findings_by_severity["low"], 1);
}
