//! Static analyzer combining rule findings and metrics.

use std::sync::Arc;
use thiserror::Error;

use super::complexity::cyclomatic_complexity;
use super::coverage::estimate_test_coverage;
use super::imports::extract_dependencies;
use super::patterns::evaluate_rules;
use super::{Findings, Metrics};
use crate::rules::{Category, Language, RuleSet};

/// Errors that abort local analysis of a sample.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("input looks binary (NUL byte at offset {offset})")]
    BinaryContent { offset: usize },
    #[error("rule compilation failed: {0}")]
    Rules(#[from] crate::rules::RuleError),
    #[error("analysis worker failed: {0}")]
    Worker(String),
}

/// Result of local analysis of one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAnalysis {
    pub metrics: Metrics,
    pub findings: Findings,
}

/// Applies rule tables to source text.
///
/// Cheap to clone; the compiled rules are shared.
#[derive(Debug, Clone)]
pub struct StaticAnalyzer {
    rules: Arc<RuleSet>,
}

impl Default for StaticAnalyzer {
    fn default() -> Self {
        Self::new(RuleSet::builtin())
    }
}

impl StaticAnalyzer {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Compute size, complexity, dependency and coverage metrics.
    ///
    /// Unknown languages yield baseline complexity and no dependencies.
    pub fn metrics(&self, code: &str, language: Language) -> Metrics {
        Metrics {
            lines_of_code: code.lines().count(),
            cyclomatic_complexity: cyclomatic_complexity(
                code,
                self.rules.control_structures(language),
            ),
            dependencies: extract_dependencies(code, self.rules.import_patterns(language)),
            test_coverage_estimate: estimate_test_coverage(
                code,
                self.rules.test_indicators(language),
            ),
        }
    }

    /// Evaluate every category's rules. All categories are present in the
    /// result, empty when nothing matched.
    pub fn findings(&self, code: &str, language: Language) -> Findings {
        let mut findings = Findings::new();
        for category in Category::ALL {
            for finding in evaluate_rules(code, self.rules.rules_for(language, category)) {
                findings.push(finding);
            }
        }
        findings
    }

    /// Reject input that cannot be treated as source text.
    pub fn check_input(code: &str) -> Result<(), AnalysisError> {
        match code.find('\0') {
            Some(offset) => Err(AnalysisError::BinaryContent { offset }),
            None => Ok(()),
        }
    }

    /// Full local analysis.
    ///
    /// Fails only on malformed input that cannot be treated as source text.
    pub fn analyze(&self, code: &str, language: Language) -> Result<LocalAnalysis, AnalysisError> {
        Self::check_input(code)?;

        Ok(LocalAnalysis {
            metrics: self.metrics(code, language),
            findings: self.findings(code, language),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_input() {
        assert!(StaticAnalyzer::check_input("x = 1\n").is_ok());
        assert!(matches!(
            StaticAnalyzer::check_input("ab\0c"),
            Err(AnalysisError::BinaryContent { offset: 2 })
        ));
    }

    #[test]
    fn test_lines_of_code() {
        let analyzer = StaticAnalyzer::default();
        assert_eq!(analyzer.metrics("", Language::Python).lines_of_code, 0);
        assert_eq!(analyzer.metrics("x = 1", Language::Python).lines_of_code, 1);
        assert_eq!(analyzer.metrics("a\nb\nc\n", Language::Python).lines_of_code, 3);
        assert_eq!(analyzer.metrics("a\n\nb", Language::Unknown).lines_of_code, 3);
    }

    #[test]
    fn test_three_ifs_one_for() {
        let analyzer = StaticAnalyzer::default();
        let code = "if a:\n    pass\nif b:\n    pass\nif c:\n    pass\nfor x in y:\n    pass\n";
        assert_eq!(analyzer.metrics(code, Language::Python).cyclomatic_complexity, 5);
    }

    #[test]
    fn test_unknown_language_degrades() {
        let analyzer = StaticAnalyzer::default();
        let code = "++++[>++++<-]>.\nimport os\neval(x)\n";
        let result = analyzer.analyze(code, Language::parse("brainfuck")).unwrap();

        assert!(result.metrics.dependencies.is_empty());
        assert_eq!(result.metrics.cyclomatic_complexity, 1);
        assert_eq!(result.metrics.lines_of_code, 3);
        for category in Category::ALL {
            assert!(result.findings.get(category).is_empty());
        }
    }

    #[test]
    fn test_empty_code() {
        let analyzer = StaticAnalyzer::default();
        let result = analyzer.analyze("", Language::Python).unwrap();
        assert_eq!(result.metrics.lines_of_code, 0);
        assert_eq!(result.metrics.cyclomatic_complexity, 1);
        assert!(result.findings.is_empty());
    }

    #[test]
    fn test_binary_content_rejected() {
        let analyzer = StaticAnalyzer::default();
        let err = analyzer.analyze("abc\0def", Language::Python).unwrap_err();
        assert!(matches!(err, AnalysisError::BinaryContent { offset: 3 }));
    }

    #[test]
    fn test_metrics_example() {
        let analyzer = StaticAnalyzer::default();
        let code = r#"
import os
import sys

def main():
    print("Hello, World!")
    "#;
        let metrics = analyzer.metrics(code, Language::Python);
        let deps: Vec<_> = metrics.dependencies.iter().cloned().collect();
        assert_eq!(deps, vec!["os", "sys"]);
        assert_eq!(metrics.test_coverage_estimate.unit_test_hits, 0);
    }
}
