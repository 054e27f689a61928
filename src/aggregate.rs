//! Unified analysis report assembly.
//!
//! A report combines local static analysis with model-derived sections. The
//! local half always succeeds or the whole report becomes an `ErrorReport`;
//! the model half silently degrades to empty sections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::detect::{AnalysisError, Findings, LocalAnalysis, Metrics, StaticAnalyzer};
use crate::model::ModelError;
use crate::rules::Language;

/// Report sections produced by the completion model.
///
/// Every field defaults to empty when missing or of the wrong type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDerived {
    #[serde(default)]
    pub quality_issues: Vec<Value>,
    #[serde(default)]
    pub security_vulnerabilities: Vec<Value>,
    #[serde(default)]
    pub performance_optimizations: Vec<Value>,
    #[serde(default)]
    pub best_practices: Vec<Value>,
    #[serde(default)]
    pub improvement_suggestions: Vec<Value>,
    #[serde(default)]
    pub structure_analysis: Map<String, Value>,
}

impl ModelDerived {
    /// Parse raw completion text.
    ///
    /// Accepts a bare JSON object or one wrapped in a Markdown code fence.
    /// Anything that is not a JSON object is an error.
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        let body = strip_code_fence(text);
        let value: Value =
            serde_json::from_str(body).map_err(|e| ModelError::InvalidOutput(e.to_string()))?;
        if !value.is_object() {
            return Err(ModelError::InvalidOutput(format!(
                "expected a JSON object, got {}",
                json_type_name(&value)
            )));
        }
        Ok(Self::from_value(&value))
    }

    /// Extract fields from a parsed object, defaulting each one separately.
    pub fn from_value(value: &Value) -> Self {
        let list = |keys: &[&str]| -> Vec<Value> {
            keys.iter()
                .find_map(|k| value.get(*k).and_then(Value::as_array))
                .cloned()
                .unwrap_or_default()
        };

        Self {
            quality_issues: list(&["quality_issues"]),
            security_vulnerabilities: list(&["security_vulnerabilities"]),
            performance_optimizations: list(&["performance_optimizations", "performance_issues"]),
            best_practices: list(&["best_practices"]),
            improvement_suggestions: list(&["improvement_suggestions"]),
            structure_analysis: value
                .get("structure_analysis")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.quality_issues.is_empty()
            && self.security_vulnerabilities.is_empty()
            && self.performance_optimizations.is_empty()
            && self.best_practices.is_empty()
            && self.improvement_suggestions.is_empty()
            && self.structure_analysis.is_empty()
    }
}

/// Remove a surrounding ```json ... ``` fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string ("json") up to the first newline.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A complete analysis of one code sample. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub timestamp: DateTime<Utc>,
    pub language: Language,
    pub metrics: Metrics,
    pub findings: Findings,
    pub model_derived: ModelDerived,
}

/// Replacement for a report whose local analysis failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new(error: impl std::fmt::Display) -> Self {
        Self {
            error: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// What callers receive: a report, or an error object in its place.
///
/// Serialized untagged, so the two are told apart by the `error` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Report(AnalysisReport),
    Error(ErrorReport),
}

impl AnalysisOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, AnalysisOutcome::Error(_))
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Report(r) => Some(r),
            AnalysisOutcome::Error(_) => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AnalysisOutcome::Report(r) => r.timestamp,
            AnalysisOutcome::Error(e) => e.timestamp,
        }
    }
}

impl From<Result<AnalysisReport, AnalysisError>> for AnalysisOutcome {
    fn from(result: Result<AnalysisReport, AnalysisError>) -> Self {
        match result {
            Ok(report) => AnalysisOutcome::Report(report),
            Err(e) => AnalysisOutcome::Error(ErrorReport::new(e)),
        }
    }
}

/// Merges local analysis with model output into one report.
#[derive(Debug, Clone, Default)]
pub struct ReportAggregator {
    analyzer: StaticAnalyzer,
}

impl ReportAggregator {
    pub fn new(analyzer: StaticAnalyzer) -> Self {
        Self { analyzer }
    }

    pub fn analyzer(&self) -> &StaticAnalyzer {
        &self.analyzer
    }

    /// Analyze `code` locally and combine it with `model_output`.
    ///
    /// `None` means the model call failed or was not made; the model
    /// sections are then empty and the local findings are unaffected.
    pub fn build(
        &self,
        code: &str,
        language: Language,
        model_output: Option<ModelDerived>,
    ) -> Result<AnalysisReport, AnalysisError> {
        let local = self.analyzer.analyze(code, language)?;
        Ok(Self::assemble(local, language, model_output))
    }

    /// Combine an already computed local analysis with model output.
    pub fn assemble(
        local: LocalAnalysis,
        language: Language,
        model_output: Option<ModelDerived>,
    ) -> AnalysisReport {
        AnalysisReport {
            timestamp: Utc::now(),
            language,
            metrics: local.metrics,
            findings: local.findings,
            model_derived: model_output.unwrap_or_default(),
        }
    }
}
