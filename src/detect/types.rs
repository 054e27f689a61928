//! Core types for static analysis results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::rules::{Category, Severity};

/// A single rule-triggered observation about a code sample.
///
/// `line_numbers` is sorted ascending and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub category: Category,
    pub severity: Severity,
    pub message: String,
    pub line_numbers: Vec<usize>,
}

impl Finding {
    /// First line the finding was reported on.
    pub fn first_line(&self) -> usize {
        self.line_numbers.first().copied().unwrap_or(0)
    }
}

/// Findings grouped by category. Every category is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Findings {
    #[serde(default)]
    pub security: Vec<Finding>,
    #[serde(default)]
    pub performance: Vec<Finding>,
    #[serde(default)]
    pub maintainability: Vec<Finding>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Findings for one category, in rule order.
    pub fn get(&self, category: Category) -> &[Finding] {
        match category {
            Category::Security => &self.security,
            Category::Performance => &self.performance,
            Category::Maintainability => &self.maintainability,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut Vec<Finding> {
        match category {
            Category::Security => &mut self.security,
            Category::Performance => &mut self.performance,
            Category::Maintainability => &mut self.maintainability,
        }
    }

    /// Add a finding under its own category.
    pub fn push(&mut self, finding: Finding) {
        self.get_mut(finding.category).push(finding);
    }

    /// All findings, security first.
    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.security
            .iter()
            .chain(self.performance.iter())
            .chain(self.maintainability.iter())
    }

    pub fn total(&self) -> usize {
        self.security.len() + self.performance.len() + self.maintainability.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Highest severity among all findings.
    pub fn max_severity(&self) -> Option<Severity> {
        self.iter().map(|f| f.severity).max()
    }

    /// Number of findings at or above the given severity.
    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.iter().filter(|f| f.severity >= severity).count()
    }
}

/// Heuristic test coverage estimate.
///
/// This is not a measurement: each test-indicator match counts as ten
/// percent, capped at one hundred.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCoverage {
    pub unit_test_hits: usize,
    pub total_coverage_percent: u8,
}

/// Size, complexity and dependency metrics for a code sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub lines_of_code: usize,
    pub cyclomatic_complexity: usize,
    pub dependencies: BTreeSet<String>,
    pub test_coverage_estimate: TestCoverage,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            lines_of_code: 0,
            cyclomatic_complexity: 1,
            dependencies: BTreeSet::new(),
            test_coverage_estimate: TestCoverage::default(),
        }
    }
}
