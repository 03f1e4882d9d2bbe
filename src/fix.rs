//! Applying corrections.
//!
//! Each diagnostic contributes at most one edit: its first correction.
//! Edits are sorted by start position (stable, so ties keep diagnostic
//! order) and applied in one left-to-right sweep. An edit starting before
//! the end of the previously applied one is skipped as a conflict, so the
//! result never depends on how overlapping edits would interleave.
//!
//! ```
//! use pslint::fix::apply_corrections;
//!
//! let outcome = apply_corrections("gci", &[], None);
//! assert_eq!(outcome.text, "gci");
//! assert_eq!(outcome.applied, 0);
//! ```

use pslint_common::{Correction, Diagnostic, Position};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Why a correction was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Overlaps an edit that starts earlier
    ConflictingCorrection,
    /// Targets a different file than the one being corrected
    CrossFileCorrection,
    /// Points outside the text
    OutOfRange,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::ConflictingCorrection => write!(f, "overlaps another correction"),
            SkipReason::CrossFileCorrection => write!(f, "targets another file"),
            SkipReason::OutOfRange => write!(f, "lies outside the text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedCorrection {
    pub rule_name: String,
    pub correction: Correction,
    pub reason: SkipReason,
}

/// Result of [`apply_corrections`]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CorrectionOutcome {
    /// The corrected text
    pub text: String,
    /// Number of corrections applied
    pub applied: usize,
    pub skipped: Vec<SkippedCorrection>,
}

/// Byte offsets of line starts, for converting line/column positions.
struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, starts }
    }

    /// Byte offset of a 1-based line and character column. The column one
    /// past the last character of a line addresses the line end.
    fn offset(&self, position: &Position) -> Option<usize> {
        let line = position.line.checked_sub(1)?;
        let column = position.column.checked_sub(1)?;
        let start = *self.starts.get(line)?;
        let end = match self.starts.get(line + 1) {
            Some(next) => next - 1,
            None => self.text.len(),
        };
        let line_text = &self.text[start..end];

        let mut chars = line_text.char_indices();
        match chars.nth(column) {
            Some((i, _)) => Some(start + i),
            None if column == line_text.chars().count() => Some(end),
            None => None,
        }
    }
}

struct Edit<'a> {
    rule_name: &'a str,
    correction: &'a Correction,
    start: usize,
    end: usize,
}

/// Merge the first correction of every diagnostic into `source`.
///
/// `file` is the file `source` was read from; corrections whose extent names
/// another file are skipped.
pub fn apply_corrections(
    source: &str,
    diagnostics: &[Diagnostic],
    file: Option<&Path>,
) -> CorrectionOutcome {
    let index = LineIndex::new(source);
    let mut skipped = Vec::new();
    let mut skip = |rule_name: &str, correction: &Correction, reason: SkipReason| {
        debug!(rule = rule_name, %reason, line = correction.extent.start.line, "correction skipped");
        skipped.push(SkippedCorrection {
            rule_name: rule_name.to_string(),
            correction: correction.clone(),
            reason,
        });
    };

    let mut edits = Vec::new();
    for diagnostic in diagnostics {
        let Some(correction) = diagnostic.corrections.first() else {
            continue;
        };
        let rule_name = diagnostic.rule_name.as_str();
        if !correction.extent.is_in_file(file) {
            skip(rule_name, correction, SkipReason::CrossFileCorrection);
            continue;
        }
        let range = index
            .offset(&correction.extent.start)
            .zip(index.offset(&correction.extent.end));
        match range {
            Some((start, end)) if start <= end => edits.push(Edit {
                rule_name,
                correction,
                start,
                end,
            }),
            _ => skip(rule_name, correction, SkipReason::OutOfRange),
        }
    }

    edits.sort_by_key(|edit| edit.start);

    let mut text = String::with_capacity(source.len());
    let mut cursor = 0;
    let mut applied = 0;
    for edit in edits {
        if edit.start < cursor {
            skip(edit.rule_name, edit.correction, SkipReason::ConflictingCorrection);
            continue;
        }
        text.push_str(&source[cursor..edit.start]);
        text.push_str(&edit.correction.replacement);
        cursor = edit.end;
        applied += 1;
    }
    text.push_str(&source[cursor..]);

    CorrectionOutcome {
        text,
        applied,
        skipped,
    }
}

/// Apply corrections to a file in place.
pub fn fix_file(path: &Path, diagnostics: &[Diagnostic]) -> std::io::Result<CorrectionOutcome> {
    let content = fs::read_to_string(path)?;
    let outcome = apply_corrections(&content, diagnostics, Some(path));
    if outcome.applied > 0 {
        fs::write(path, &outcome.text)?;
    }
    Ok(outcome)
}

/// Apply corrections to a file in place, returning the number applied.
pub fn apply_fixes(path: &Path, diagnostics: &[Diagnostic]) -> std::io::Result<usize> {
    fix_file(path, diagnostics).map(|outcome| outcome.applied)
}
