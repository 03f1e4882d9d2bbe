use super::{Summary, sorted_by_location};
use crate::linter::{AnalysisOutcome, AnalysisWarning};
use colored::{ColoredString, Colorize};
use pslint_common::{Diagnostic, Severity};
use std::path::Path;

pub(crate) fn report(outcome: &AnalysisOutcome, path: &Path) {
    for diagnostic in sorted_by_location(&outcome.diagnostics) {
        let (location, label, message) = parts(diagnostic, path);
        println!("{}: {}: {}", location, colorize(&label, diagnostic.severity).bold(), message);
    }

    for warning in &outcome.warnings {
        eprintln!("{}", format_warning(warning, path).dimmed());
    }

    if let Some(summary) = format_summary(&Summary::of(outcome)) {
        println!();
        println!("{}", summary);
    }
}

/// Location, `severity[rule]` label and message of one diagnostic.
fn parts(diagnostic: &Diagnostic, path: &Path) -> (String, String, String) {
    let file = diagnostic.script_path.as_deref().unwrap_or(path);
    let location = format!(
        "{}:{}:{}",
        file.display(),
        diagnostic.line(),
        diagnostic.column()
    );
    let label = format!(
        "{}[{}]",
        severity_label(diagnostic.severity),
        diagnostic.rule_name
    );
    let mut message = diagnostic.message.clone();
    if diagnostic.has_corrections() {
        message.push_str(" (fixable)");
    }
    (location, label, message)
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Information => "info",
        Severity::Warning => "warning",
        Severity::Error => "error",
        Severity::ParseError => "parse-error",
    }
}

fn colorize(s: &str, severity: Severity) -> ColoredString {
    match severity {
        Severity::Information => s.blue(),
        Severity::Warning => s.yellow(),
        Severity::Error => s.red(),
        Severity::ParseError => s.magenta(),
    }
}

fn format_warning(warning: &AnalysisWarning, path: &Path) -> String {
    let location = match (&warning.file, warning.line) {
        (Some(file), Some(line)) => format!("{}:{}", file.display(), line),
        (Some(file), None) => file.display().to_string(),
        (None, _) => path.display().to_string(),
    };
    format!("{}: note[{}]: {}", location, warning.kind, warning.message)
}

fn format_summary(summary: &Summary) -> Option<String> {
    let mut parts = Vec::new();
    if summary.errors > 0 {
        parts.push(format!("{} error(s)", summary.errors));
    }
    if summary.warnings > 0 {
        parts.push(format!("{} warning(s)", summary.warnings));
    }
    if summary.information > 0 {
        parts.push(format!("{} info(s)", summary.information));
    }
    if summary.suppressed > 0 {
        parts.push(format!("{} suppressed", summary.suppressed));
    }

    if parts.is_empty() {
        None
    } else {
        Some(format!("Found {}", parts.join(", ")))
    }
}

#[cfg(test)]
fn format_line(diagnostic: &Diagnostic, path: &Path) -> String {
    let (location, label, message) = parts(diagnostic, path);
    format!("{}: {}: {}", location, label, message)
}
