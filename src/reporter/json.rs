use super::{Summary, sorted_by_location};
use crate::linter::{AnalysisOutcome, AnalysisWarning};
use pslint_common::Diagnostic;
use std::path::Path;

#[derive(serde::Serialize)]
struct JsonReport<'a> {
    file: String,
    diagnostics: Vec<&'a Diagnostic>,
    warnings: &'a [AnalysisWarning],
    summary: Summary,
}

pub(crate) fn report(outcome: &AnalysisOutcome, path: &Path) {
    match format(outcome, path) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing report for {}: {}", path.display(), e),
    }
}

pub(crate) fn format(outcome: &AnalysisOutcome, path: &Path) -> serde_json::Result<String> {
    let report = JsonReport {
        file: path.display().to_string(),
        diagnostics: sorted_by_location(&outcome.diagnostics),
        warnings: &outcome.warnings,
        summary: Summary::of(outcome),
    };
    serde_json::to_string_pretty(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linter::WarningKind;
    use pslint_common::parser::ast::Span;
    use pslint_common::{Correction, Extent, Position, Severity};

    fn make_diagnostic(rule: &str, message: &str, severity: Severity, line: usize, column: usize) -> Diagnostic {
        let extent = Extent::new(
            Span::new(Position::new(line, column, 0), Position::new(line, column + 3, 3)),
            None,
            "gci",
        );
        Diagnostic::new(rule, message, severity, extent)
    }

    fn parse(outcome: &AnalysisOutcome) -> serde_json::Value {
        serde_json::from_str(&format(outcome, Path::new("script.ps1")).unwrap()).unwrap()
    }

    #[test]
    fn test_json_structure() {
        let diagnostic = make_diagnostic("PSAvoidUsingCmdletAliases", "alias", Severity::Warning, 10, 5)
            .with_rule_id("gci");
        let extent = diagnostic.extent.clone();
        let diagnostic = diagnostic.with_correction(Correction::new(extent, "Get-ChildItem", "Replace gci with Get-ChildItem"));
        let outcome = AnalysisOutcome {
            diagnostics: vec![diagnostic],
            ..Default::default()
        };
        let json = parse(&outcome);

        assert_eq!(json["file"], "script.ps1");
        let d = &json["diagnostics"][0];
        assert_eq!(d["rule_name"], "PSAvoidUsingCmdletAliases");
        assert_eq!(d["severity"], "Warning");
        assert_eq!(d["rule_id"], "gci");
        assert_eq!(d["extent"]["start"]["line"], 10);
        assert_eq!(d["extent"]["start"]["column"], 5);
        assert_eq!(d["corrections"][0]["replacement"], "Get-ChildItem");
        assert_eq!(json["summary"]["warnings"], 1);
        assert_eq!(json["summary"]["errors"], 0);
    }

    #[test]
    fn test_json_summary_counts() {
        let outcome = AnalysisOutcome {
            diagnostics: vec![
                make_diagnostic("r1", "err", Severity::Error, 1, 1),
                make_diagnostic("r2", "warn", Severity::Warning, 2, 1),
                make_diagnostic("r3", "info", Severity::Information, 3, 1),
                make_diagnostic("r4", "info", Severity::Information, 4, 1),
            ],
            suppressed: vec![make_diagnostic("r5", "hidden", Severity::Warning, 5, 1)],
            ..Default::default()
        };
        let json = parse(&outcome);

        assert_eq!(json["summary"]["errors"], 1);
        assert_eq!(json["summary"]["warnings"], 1);
        assert_eq!(json["summary"]["information"], 2);
        assert_eq!(json["summary"]["suppressed"], 1);
    }

    #[test]
    fn test_json_sorted_by_line_and_column() {
        let outcome = AnalysisOutcome {
            diagnostics: vec![
                make_diagnostic("r1", "third", Severity::Error, 10, 1),
                make_diagnostic("r2", "first", Severity::Warning, 1, 5),
                make_diagnostic("r3", "second", Severity::Error, 1, 10),
            ],
            ..Default::default()
        };
        let json = parse(&outcome);

        let diagnostics = json["diagnostics"].as_array().unwrap();
        assert_eq!(diagnostics[0]["message"], "first");
        assert_eq!(diagnostics[1]["message"], "second");
        assert_eq!(diagnostics[2]["message"], "third");
    }

    #[test]
    fn test_json_includes_warnings() {
        let outcome = AnalysisOutcome {
            warnings: vec![
                AnalysisWarning::new(WarningKind::RuleExecutionFailure, "Rule 'PSBad' failed")
                    .with_rule("PSBad"),
            ],
            ..Default::default()
        };
        let json = parse(&outcome);

        assert!(json["diagnostics"].as_array().unwrap().is_empty());
        assert_eq!(json["warnings"][0]["kind"], "RuleExecutionFailure");
        assert_eq!(json["warnings"][0]["rule_name"], "PSBad");
    }
}
