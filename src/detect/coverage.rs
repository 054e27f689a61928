//! Test coverage estimate from test-indicator patterns.

use regex::Regex;

use super::TestCoverage;

/// Percentage credited per test-indicator match.
const PERCENT_PER_HIT: usize = 10;

/// Estimate test coverage by counting test indicators.
///
/// A linear placeholder heuristic: `min(100, hits * 10)`. It says nothing
/// about which lines or branches are exercised.
pub fn estimate_test_coverage(code: &str, test_indicators: &[Regex]) -> TestCoverage {
    let unit_test_hits: usize = test_indicators
        .iter()
        .map(|re| re.find_iter(code).count())
        .sum();
    let percent = unit_test_hits.saturating_mul(PERCENT_PER_HIT).min(100);

    TestCoverage {
        unit_test_hits,
        total_coverage_percent: percent as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Language, RuleSet};

    #[test]
    fn test_python_test_indicators() {
        let rules = RuleSet::builtin();
        let code = r#"
def test_function():
    assert True

class TestClass:
    def test_method(self):
        assert 1 == 1

def not_a_test():
    pass
"#;
        let coverage = estimate_test_coverage(code, rules.test_indicators(Language::Python));
        assert_eq!(coverage.unit_test_hits, 3);
        assert_eq!(coverage.total_coverage_percent, 30);
    }

    #[test]
    fn test_coverage_caps_at_100() {
        let rules = RuleSet::builtin();
        let code = (0..15)
            .map(|i| format!("def test_case_{}():\n    pass\n", i))
            .collect::<String>();
        let coverage = estimate_test_coverage(&code, rules.test_indicators(Language::Python));
        assert_eq!(coverage.unit_test_hits, 15);
        assert_eq!(coverage.total_coverage_percent, 100);
    }

    #[test]
    fn test_javascript_test_indicators() {
        let rules = RuleSet::builtin();
        let code = r#"
describe('sum', () => {
    it('adds', () => {
        expect(sum(1, 2)).toBe(3);
    });
});
"#;
        let coverage = estimate_test_coverage(code, rules.test_indicators(Language::JavaScript));
        assert_eq!(coverage.unit_test_hits, 2);
        assert_eq!(coverage.total_coverage_percent, 20);
    }

    #[test]
    fn test_javascript_indicators_ignore_case() {
        let rules = RuleSet::builtin();
        let code = "Describe('x', () => {\n  IT('y', () => {});\n  Test('z', () => {});\n});\n";
        let coverage = estimate_test_coverage(code, rules.test_indicators(Language::JavaScript));
        assert_eq!(coverage.unit_test_hits, 3);
    }

    #[test]
    fn test_no_indicators() {
        let coverage = estimate_test_coverage("print('hi')", &[]);
        assert_eq!(coverage, TestCoverage::default());
    }
}
