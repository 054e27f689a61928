//! Rule tables for pattern-based code analysis.
//!
//! Rules are regular expressions evaluated against raw source text, not an
//! AST. False positives and negatives are expected; the tables stay flat so
//! a rule is just a `(pattern, message)` pair under a language and category.
//!
//! Besides the finding rules, each language carries three auxiliary tables
//! used for metrics: control structures (complexity), import statements
//! (dependencies) and test indicators (coverage estimate).

mod javascript;
mod python;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while compiling rule patterns.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("custom rule targets unknown language {0:?}")]
    UnknownLanguage(String),
}

/// Languages with rule tables.
///
/// Anything unrecognised maps to `Unknown`, which has empty tables and
/// yields baseline metrics instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Unknown,
}

impl Language {
    /// Parse a language name. Never fails; unrecognised names are `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" | "python3" => Language::Python,
            "javascript" | "js" | "node" => Language::JavaScript,
            "typescript" | "ts" => Language::TypeScript,
            _ => Language::Unknown,
        }
    }

    /// Determine the language from a file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "py" | "pyw" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            _ => Language::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Language::Unknown
    }

    /// The language whose tables this language uses.
    fn table_language(&self) -> Language {
        match self {
            Language::TypeScript => Language::JavaScript,
            other => *other,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Finding categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Security,
    Performance,
    Maintainability,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::Security,
        Category::Performance,
        Category::Maintainability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Security => "security",
            Category::Performance => "performance",
            Category::Maintainability => "maintainability",
        }
    }

    /// Severity assigned to findings of this category.
    pub fn default_severity(&self) -> Severity {
        match self {
            Category::Security => Severity::High,
            Category::Performance => Severity::Medium,
            Category::Maintainability => Severity::Medium,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "security" => Ok(Category::Security),
            "performance" => Ok(Category::Performance),
            "maintainability" => Ok(Category::Maintainability),
            _ => Err(format!("unknown category: {}", s)),
        }
    }
}

/// Severity levels for findings, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// A compiled finding rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: Regex,
    pub message: String,
    pub category: Category,
    pub severity: Severity,
}

impl Rule {
    /// Compile a rule with the category's default severity.
    pub fn new(pattern: &str, message: &str, category: Category) -> Result<Self, RuleError> {
        Self::with_severity(pattern, message, category, category.default_severity())
    }

    pub fn with_severity(
        pattern: &str,
        message: &str,
        category: Category,
        severity: Severity,
    ) -> Result<Self, RuleError> {
        Ok(Self {
            pattern: compile(pattern)?,
            message: message.to_string(),
            category,
            severity,
        })
    }
}

/// A rule contributed from configuration rather than the built-in tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRule {
    pub language: String,
    pub category: Category,
    pub pattern: String,
    pub message: String,
    #[serde(default)]
    pub severity: Option<Severity>,
}

/// Raw table for one language, as written in the per-language modules.
pub(crate) struct LanguageTable {
    pub security: &'static [(&'static str, &'static str)],
    pub performance: &'static [(&'static str, &'static str)],
    pub maintainability: &'static [(&'static str, &'static str)],
    pub control_structures: &'static [&'static str],
    pub imports: &'static [&'static str],
    pub test_indicators: &'static [&'static str],
}

/// Compiled tables for one language.
#[derive(Debug, Default)]
struct CompiledLanguage {
    findings: HashMap<Category, Vec<Rule>>,
    control_structures: Vec<Regex>,
    imports: Vec<Regex>,
    test_indicators: Vec<Regex>,
}

static BUILTIN: Lazy<Arc<RuleSet>> = Lazy::new(|| {
    Arc::new(RuleSet::compile_builtin().expect("built-in rule patterns must compile"))
});

/// All rule tables, keyed by language.
#[derive(Debug, Default)]
pub struct RuleSet {
    languages: HashMap<Language, CompiledLanguage>,
}

impl RuleSet {
    /// The shared built-in rule set.
    pub fn builtin() -> Arc<RuleSet> {
        Arc::clone(&BUILTIN)
    }

    /// Built-in rules extended with custom rules.
    ///
    /// Custom rules are appended after the built-in rules of the same
    /// language and category. A custom rule for `typescript` lands in the
    /// shared JavaScript table.
    pub fn with_custom_rules(custom: &[CustomRule]) -> Result<RuleSet, RuleError> {
        let mut set = Self::compile_builtin()?;
        for rule in custom {
            let language = Language::parse(&rule.language);
            if !language.is_known() {
                return Err(RuleError::UnknownLanguage(rule.language.clone()));
            }
            let severity = rule.severity.unwrap_or_else(|| rule.category.default_severity());
            let compiled = Rule::with_severity(&rule.pattern, &rule.message, rule.category, severity)?;
            set.languages
                .entry(language.table_language())
                .or_default()
                .findings
                .entry(rule.category)
                .or_default()
                .push(compiled);
        }
        Ok(set)
    }

    fn compile_builtin() -> Result<RuleSet, RuleError> {
        let mut languages = HashMap::new();
        languages.insert(Language::Python, compile_table(&python::TABLE)?);
        languages.insert(Language::JavaScript, compile_table(&javascript::TABLE)?);
        Ok(RuleSet { languages })
    }

    fn language(&self, language: Language) -> Option<&CompiledLanguage> {
        self.languages.get(&language.table_language())
    }

    /// Finding rules for a language and category, in table order.
    ///
    /// Returns an empty slice for combinations without rules.
    pub fn rules_for(&self, language: Language, category: Category) -> &[Rule] {
        self.language(language)
            .and_then(|l| l.findings.get(&category))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Control-structure patterns feeding the complexity count.
    pub fn control_structures(&self, language: Language) -> &[Regex] {
        self.language(language)
            .map(|l| l.control_structures.as_slice())
            .unwrap_or(&[])
    }

    /// Import-statement patterns; capture group 1 is the module name.
    pub fn import_patterns(&self, language: Language) -> &[Regex] {
        self.language(language)
            .map(|l| l.imports.as_slice())
            .unwrap_or(&[])
    }

    /// Patterns that indicate test code.
    pub fn test_indicators(&self, language: Language) -> &[Regex] {
        self.language(language)
            .map(|l| l.test_indicators.as_slice())
            .unwrap_or(&[])
    }
}

fn compile(pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn compile_table(table: &LanguageTable) -> Result<CompiledLanguage, RuleError> {
    let mut findings = HashMap::new();
    for (category, rules) in [
        (Category::Security, table.security),
        (Category::Performance, table.performance),
        (Category::Maintainability, table.maintainability),
    ] {
        let compiled = rules
            .iter()
            .map(|(pattern, message)| Rule::new(pattern, message, category))
            .collect::<Result<Vec<_>, _>>()?;
        findings.insert(category, compiled);
    }

    let compile_all = |patterns: &[&str]| -> Result<Vec<Regex>, RuleError> {
        patterns.iter().map(|p| compile(p)).collect()
    };

    Ok(CompiledLanguage {
        findings,
        control_structures: compile_all(table.control_structures)?,
        imports: compile_all(table.imports)?,
        test_indicators: compile_all(table.test_indicators)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parse() {
        assert_eq!(Language::parse("Python"), Language::Python);
        assert_eq!(Language::parse("javascript"), Language::JavaScript);
        assert_eq!(Language::parse("TS"), Language::TypeScript);
        assert_eq!(Language::parse("brainfuck"), Language::Unknown);
        assert_eq!(Language::parse(""), Language::Unknown);
    }

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("mjs"), Language::JavaScript);
        assert_eq!(Language::from_extension("tsx"), Language::TypeScript);
        assert_eq!(Language::from_extension("rs"), Language::Unknown);
    }

    #[test]
    fn test_builtin_tables_compile() {
        let rules = RuleSet::builtin();
        for category in Category::ALL {
            assert!(!rules.rules_for(Language::Python, category).is_empty());
            assert!(!rules.rules_for(Language::JavaScript, category).is_empty());
        }
        assert!(!rules.control_structures(Language::Python).is_empty());
        assert!(!rules.import_patterns(Language::JavaScript).is_empty());
    }

    #[test]
    fn test_unknown_language_has_no_rules() {
        let rules = RuleSet::builtin();
        for category in Category::ALL {
            assert!(rules.rules_for(Language::Unknown, category).is_empty());
        }
        assert!(rules.control_structures(Language::Unknown).is_empty());
        assert!(rules.import_patterns(Language::Unknown).is_empty());
        assert!(rules.test_indicators(Language::Unknown).is_empty());
    }

    #[test]
    fn test_typescript_shares_javascript_tables() {
        let rules = RuleSet::builtin();
        let js = rules.rules_for(Language::JavaScript, Category::Security);
        let ts = rules.rules_for(Language::TypeScript, Category::Security);
        assert_eq!(js.len(), ts.len());
    }

    #[test]
    fn test_rule_severity_follows_category() {
        let rules = RuleSet::builtin();
        assert!(rules
            .rules_for(Language::Python, Category::Security)
            .iter()
            .all(|r| r.severity == Severity::High));
        assert!(rules
            .rules_for(Language::Python, Category::Performance)
            .iter()
            .all(|r| r.severity == Severity::Medium));
    }

    #[test]
    fn test_custom_rules_appended() {
        let custom = vec![CustomRule {
            language: "python".to_string(),
            category: Category::Security,
            pattern: r"yaml\.load\(".to_string(),
            message: "Use yaml.safe_load() instead of yaml.load()".to_string(),
            severity: None,
        }];
        let rules = RuleSet::with_custom_rules(&custom).unwrap();
        let security = rules.rules_for(Language::Python, Category::Security);
        let last = security.last().unwrap();
        assert_eq!(last.message, "Use yaml.safe_load() instead of yaml.load()");
        assert_eq!(last.severity, Severity::High);
    }

    #[test]
    fn test_custom_rule_invalid_pattern() {
        let custom = vec![CustomRule {
            language: "javascript".to_string(),
            category: Category::Maintainability,
            pattern: "(unclosed".to_string(),
            message: "broken".to_string(),
            severity: Some(Severity::Low),
        }];
        let err = RuleSet::with_custom_rules(&custom).unwrap_err();
        assert!(matches!(err, RuleError::InvalidPattern { .. }));
    }

    #[test]
    fn test_custom_rule_unknown_language() {
        let custom = vec![CustomRule {
            language: "cobol".to_string(),
            category: Category::Performance,
            pattern: "PERFORM".to_string(),
            message: "loop".to_string(),
            severity: None,
        }];
        assert!(matches!(
            RuleSet::with_custom_rules(&custom),
            Err(RuleError::UnknownLanguage(_))
        ));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
    }
}
