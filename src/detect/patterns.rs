//! Rule evaluation producing findings.

use regex::Regex;

use super::Finding;
use crate::rules::Rule;

/// Evaluate rules against `code`.
///
/// Emits one finding per rule that matches anywhere in the text (not one per
/// match). The finding's line numbers come from re-scanning line by line, so
/// a pattern that only matches across a line break produces no finding.
pub fn evaluate_rules(code: &str, rules: &[Rule]) -> Vec<Finding> {
    let mut findings = Vec::new();

    for rule in rules {
        if !rule.pattern.is_match(code) {
            continue;
        }

        let line_numbers = find_line_numbers(code, &rule.pattern);
        if line_numbers.is_empty() {
            continue;
        }

        findings.push(Finding {
            category: rule.category,
            severity: rule.severity,
            message: rule.message.clone(),
            line_numbers,
        });
    }

    findings
}

/// 1-indexed lines on which `pattern` matches, ascending.
pub fn find_line_numbers(code: &str, pattern: &Regex) -> Vec<usize> {
    code.lines()
        .enumerate()
        .filter(|(_, line)| pattern.is_match(line))
        .map(|(i, _)| i + 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Category, Language, RuleSet, Severity};

    fn evaluate(code: &str, language: Language, category: Category) -> Vec<Finding> {
        let rules = RuleSet::builtin();
        evaluate_rules(code, rules.rules_for(language, category))
    }

    #[test]
    fn test_eval_single_line() {
        let findings = evaluate("eval(x)", Language::Python, Category::Security);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].message, "Use of eval() is dangerous");
        assert_eq!(findings[0].line_numbers, vec![1]);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn test_one_finding_per_rule_with_all_lines() {
        let code = "a = eval(x)\nb = 2\nc = eval(y)\n";
        let findings = evaluate(code, Language::Python, Category::Security);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line_numbers, vec![1, 3]);
    }

    #[test]
    fn test_findings_in_rule_order() {
        let code = r#"
import os
import subprocess

def dangerous_function():
    os.system("rm -rf /")
    subprocess.call(["echo", "dangerous"])
    eval("print('hello')")
"#;
        let findings = evaluate(code, Language::Python, Category::Security);
        let messages: Vec<_> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Use of eval() is dangerous",
                "Use of os.system() is dangerous",
                "Use of subprocess.call() is dangerous",
            ]
        );
        assert_eq!(findings[1].line_numbers, vec![6]);
    }

    #[test]
    fn test_python_performance() {
        let code = "for i in range(len(items)):\n    total += items[i]\n";
        let findings = evaluate(code, Language::Python, Category::Performance);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].message, "Use enumerate() instead of range(len())");
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn test_javascript_security_and_performance() {
        let code = r#"
function processData(data) {
    for (var i = 0; i < data.length; i++) {}
    var result = eval(data);
    document.write(result);
}
"#;
        let security = evaluate(code, Language::JavaScript, Category::Security);
        assert!(security.iter().any(|f| f.message == "Use of eval() is dangerous"));
        assert!(security
            .iter()
            .any(|f| f.message == "Use of document.write() is dangerous"));

        let performance = evaluate(code, Language::JavaScript, Category::Performance);
        assert_eq!(performance[0].message, "Use let instead of var in for loops");
        assert_eq!(performance[0].line_numbers, vec![3]);
    }

    #[test]
    fn test_cross_line_match_is_not_emitted() {
        let rule = Rule::new(r"foo\nbar", "split", Category::Maintainability).unwrap();
        let findings = evaluate_rules("foo\nbar\n", &[rule]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_no_rules_no_findings() {
        assert!(evaluate_rules("eval(x)", &[]).is_empty());
    }
}
