//! Output formatting for analysis results.
//!
//! Two formats:
//! - Pretty: colored terminal output for people
//! - JSON: the serialized report, unchanged, for programs

use colored::*;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;

use crate::aggregate::{AnalysisOutcome, AnalysisReport, ModelDerived};
use crate::detect::{Finding, Findings};
use crate::rules::Severity;
use crate::score::HealthScore;
use crate::service::CodebaseReport;

/// Output formats accepted on the command line.
pub const FORMATS: &[&str] = &["pretty", "json"];

/// Result of a `--fail-on` severity gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    pub fail_on: Severity,
    pub offending: usize,
}

impl Gate {
    pub fn evaluate<'a, I>(fail_on: Severity, findings: I) -> Self
    where
        I: IntoIterator<Item = &'a Findings>,
    {
        Self {
            fail_on,
            offending: findings
                .into_iter()
                .map(|f| f.count_at_least(fail_on))
                .sum(),
        }
    }

    pub fn passed(&self) -> bool {
        self.offending == 0
    }
}

// =============================================================================
// JSON Format
// =============================================================================

/// Serialize any report as pretty-printed JSON.
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Write a report to stdout as JSON.
pub fn write_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", render_json(value)?);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write a single-sample analysis in pretty format.
pub fn write_pretty(path: &str, outcome: &AnalysisOutcome, gate: Option<Gate>) {
    print!("{}", render_pretty(path, outcome, gate));
}

/// Write a codebase analysis in pretty format.
pub fn write_pretty_codebase(path: &str, report: &CodebaseReport, gate: Option<Gate>) {
    print!("{}", render_pretty_codebase(path, report, gate));
}

pub fn render_pretty(path: &str, outcome: &AnalysisOutcome, gate: Option<Gate>) -> String {
    let mut out = String::new();
    write_header(&mut out);
    let _ = writeln!(out, "  {}{}", "File:     ".dimmed(), path);

    match outcome {
        AnalysisOutcome::Error(e) => {
            let _ = writeln!(out);
            let _ = writeln!(out, "  {} {}", "✗ ERROR".red(), e.error);
            let _ = writeln!(out, "  {}", e.timestamp.to_rfc3339().dimmed());
            let _ = writeln!(out);
        }
        AnalysisOutcome::Report(report) => {
            write_report_body(&mut out, report);
            if let Some(gate) = gate {
                write_gate(&mut out, &gate);
                let _ = writeln!(out);
            }
        }
    }
    out
}

fn write_header(out: &mut String) {
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  {} v{}",
        "autoreview".cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    let _ = writeln!(out);
}

fn write_report_body(out: &mut String, report: &AnalysisReport) {
    let m = &report.metrics;
    let _ = writeln!(out, "  {}{}", "Language: ".dimmed(), report.language);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  Lines: {}  Complexity: {}  Test coverage (est.): {}%",
        m.lines_of_code, m.cyclomatic_complexity, m.test_coverage_estimate.total_coverage_percent
    );
    if !m.dependencies.is_empty() {
        let deps: Vec<&str> = m.dependencies.iter().map(String::as_str).collect();
        let _ = writeln!(out, "  Dependencies: {}", deps.join(", "));
    }
    let _ = writeln!(out);

    write_findings(out, report.findings.iter().map(|f| (None, f)).collect());
    write_model_derived(out, &report.model_derived);
}

fn write_findings(out: &mut String, findings: Vec<(Option<&str>, &Finding)>) {
    if findings.is_empty() {
        let _ = writeln!(out, "  {}", "No findings.".green());
        let _ = writeln!(out);
        return;
    }

    let _ = writeln!(out, "  {} ({}):", "Findings".bold(), findings.len());
    let _ = writeln!(out);
    for (file, f) in findings {
        let _ = write!(out, "    {} ", severity_tag(f.severity));
        let _ = write!(out, "  {:<16}", f.category.as_str().dimmed());
        if let Some(file) = file {
            let _ = write!(out, "{}", file.blue());
        }
        let _ = writeln!(out, "{}", format!(":{}", format_lines(&f.line_numbers)).dimmed());
        let _ = writeln!(out, "            {}", f.message);
        let _ = writeln!(out);
    }
}

/// `1,4,9`, with long lists shortened.
fn format_lines(lines: &[usize]) -> String {
    const SHOWN: usize = 5;
    let mut text: Vec<String> = lines.iter().take(SHOWN).map(|l| l.to_string()).collect();
    if lines.len() > SHOWN {
        text.push(format!("+{} more", lines.len() - SHOWN));
    }
    text.join(",")
}

fn severity_tag(severity: Severity) -> ColoredString {
    match severity {
        Severity::High => "HIGH".red(),
        Severity::Medium => "MED ".yellow(),
        Severity::Low => "LOW ".blue(),
    }
}

fn write_model_derived(out: &mut String, derived: &ModelDerived) {
    if derived.is_empty() {
        let _ = writeln!(out, "  {}", "Model analysis: not available".dimmed());
        let _ = writeln!(out);
        return;
    }

    let _ = writeln!(out, "  {}", "Model analysis:".bold());
    let sections: [(&str, &[Value]); 5] = [
        ("Quality", derived.quality_issues.as_slice()),
        ("Security", derived.security_vulnerabilities.as_slice()),
        ("Performance", derived.performance_optimizations.as_slice()),
        ("Best practices", derived.best_practices.as_slice()),
        ("Suggestions", derived.improvement_suggestions.as_slice()),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "    {} ({})", title.bold(), items.len());
        for item in items {
            let _ = writeln!(out, "      - {}", describe(item));
        }
    }
    let _ = writeln!(out);
}

/// One-line text for a model-derived item.
fn describe(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let text = ["description", "issue", "message", "suggestion"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| item.to_string());
            match map.get("line").and_then(Value::as_u64) {
                Some(line) => format!("{} (line {})", text, line),
                None => text,
            }
        }
        other => other.to_string(),
    }
}

fn write_gate(out: &mut String, gate: &Gate) {
    if gate.passed() {
        let _ = write!(out, "  {}", "✓ PASS".green());
    } else {
        let _ = write!(out, "  {}", "✗ FAIL".red());
    }
    let _ = writeln!(
        out,
        "  {}",
        format!(
            "{} finding(s) at or above {}",
            gate.offending, gate.fail_on
        )
        .dimmed()
    );
}

pub fn render_pretty_codebase(path: &str, report: &CodebaseReport, gate: Option<Gate>) -> String {
    let mut out = String::new();
    write_header(&mut out);
    let _ = writeln!(out, "  {}{}", "Scanning: ".dimmed(), path);
    let _ = writeln!(out);

    let summary = &report.summary;
    let _ = write!(out, "  Health: ");
    write_colored_score(&mut out, &summary.health);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  Files: {}  Lines: {}  Mean complexity: {:.1}  Issues: {}",
        report.files_analyzed, summary.total_lines, summary.mean_complexity, report.total_issues
    );
    if !summary.skipped.is_empty() {
        let _ = writeln!(
            out,
            "  {}",
            format!("({} files skipped)", summary.skipped.len()).dimmed()
        );
    }
    if !summary.dependencies.is_empty() {
        let _ = writeln!(out, "  Dependencies: {}", summary.dependencies.len());
    }
    let _ = writeln!(out);

    let findings: Vec<(Option<&str>, &Finding)> = report
        .files
        .iter()
        .flat_map(|file| file.findings.iter().map(move |f| (Some(file.path.as_str()), f)))
        .collect();
    write_findings(&mut out, findings);

    if !summary.health.breakdown.is_empty() {
        let _ = writeln!(out, "  {}", "Breakdown:".bold());
        let mut entries: Vec<(&String, &u32)> = summary.health.breakdown.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(a.1));
        for (category, points) in entries {
            let count = summary
                .findings_by_category
                .get(category.as_str())
                .copied()
                .unwrap_or(0);
            let plural = if count != 1 { "s" } else { "" };
            let _ = writeln!(
                out,
                "    {:<20} {:>3} pts ({} finding{})",
                category, points, count, plural
            );
        }
        let _ = writeln!(out);
    }

    if let Some(gate) = gate {
        write_gate(&mut out, &gate);
        let _ = writeln!(out);
    }
    out
}

fn write_colored_score(out: &mut String, health: &HealthScore) {
    let s = health.score;
    let score = match s {
        s if s <= 10 => s.to_string().green().bold(),
        s if s <= 25 => s.to_string().green(),
        s if s <= 50 => s.to_string().yellow(),
        s if s <= 75 => s.to_string().yellow().bold(),
        _ => s.to_string().red(),
    };
    let grade = match health.grade.as_str() {
        "A" => health.grade.green().bold(),
        "B" => health.grade.green(),
        "C" => health.grade.yellow(),
        "D" => health.grade.yellow().bold(),
        _ => health.grade.red(),
    };
    let _ = write!(out, "{}  Grade: {}", score, grade);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{ErrorReport, ReportAggregator};
    use crate::rules::Language;
    use serde_json::json;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_render_pretty_report() {
        plain();
        let report = ReportAggregator::default()
            .build("import os\neval(x)\n", Language::Python, None)
            .unwrap();
        let text = render_pretty("app.py", &AnalysisOutcome::Report(report), None);
        assert!(text.contains("File:     app.py"));
        assert!(text.contains("Dependencies: os"));
        assert!(text.contains("HIGH"));
        assert!(text.contains("Use of eval() is dangerous"));
        assert!(text.contains("Model analysis: not available"));
    }

    #[test]
    fn test_render_pretty_error() {
        plain();
        let outcome = AnalysisOutcome::Error(ErrorReport::new("input looks binary"));
        let text = render_pretty("blob.py", &outcome, None);
        assert!(text.contains("ERROR input looks binary"));
    }

    #[test]
    fn test_gate() {
        let report = ReportAggregator::default()
            .build("eval(x)\nfor i in range(len(items)):\n    pass\n", Language::Python, None)
            .unwrap();
        assert!(!Gate::evaluate(Severity::High, [&report.findings]).passed());
        assert_eq!(Gate::evaluate(Severity::Medium, [&report.findings]).offending, 2);

        let clean = Findings::new();
        assert!(Gate::evaluate(Severity::Low, [&clean]).passed());
    }

    #[test]
    fn test_describe_items() {
        assert_eq!(describe(&json!("use logging")), "use logging");
        assert_eq!(
            describe(&json!({"description": "magic number", "line": 4})),
            "magic number (line 4)"
        );
        assert_eq!(describe(&json!(3)), "3");
    }

    #[test]
    fn test_format_lines() {
        assert_eq!(format_lines(&[1, 2]), "1,2");
        assert_eq!(format_lines(&[1, 2, 3, 4, 5, 6, 7]), "1,2,3,4,5,+2 more");
    }

    #[test]
    fn test_render_json_has_error_key_only_for_errors() {
        let outcome = AnalysisOutcome::Error(ErrorReport::new("boom"));
        let text = render_json(&outcome).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["error"], "boom");
    }
}
