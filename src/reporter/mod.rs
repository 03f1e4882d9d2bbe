mod errorformat;
mod json;

use crate::linter::AnalysisOutcome;
use pslint_common::{Diagnostic, Severity};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    ErrorFormat,
    Json,
}

pub struct Reporter {
    format: OutputFormat,
}

impl Reporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Print the outcome of analyzing `path` to stdout.
    pub fn report(&self, outcome: &AnalysisOutcome, path: &Path) {
        match self.format {
            OutputFormat::ErrorFormat => errorformat::report(outcome, path),
            OutputFormat::Json => json::report(outcome, path),
        }
    }
}

/// Diagnostic counts per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub information: usize,
    pub suppressed: usize,
}

impl Summary {
    pub fn of(outcome: &AnalysisOutcome) -> Self {
        let count = |severity: Severity| {
            outcome
                .diagnostics
                .iter()
                .filter(|d| d.severity == severity)
                .count()
        };
        Self {
            errors: count(Severity::Error) + count(Severity::ParseError),
            warnings: count(Severity::Warning),
            information: count(Severity::Information),
            suppressed: outcome.suppressed.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Diagnostics ordered by line, then column. Ties keep rule order.
fn sorted_by_location(diagnostics: &[Diagnostic]) -> Vec<&Diagnostic> {
    let mut sorted: Vec<_> = diagnostics.iter().collect();
    sorted.sort_by_key(|d| (d.line(), d.column()));
    sorted
}
