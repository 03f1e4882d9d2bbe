use pslint_common::parser::ast::{Position, ScriptAst, Span};
use pslint_common::{
    Correction, Diagnostic, Extent, Rule, RuleContext, RuleDescriptor, RuleError, Severity,
};
use std::path::Path;
use std::sync::LazyLock;

pub const NAME: &str = "PSAvoidTrailingWhitespace";

static DESCRIPTOR: LazyLock<RuleDescriptor> = LazyLock::new(|| {
    RuleDescriptor::builtin(
        NAME,
        "Avoid Trailing Whitespace",
        "Lines should not end with whitespace characters.",
        Severity::Information,
    )
});

/// Check for trailing whitespace at the end of lines
pub struct AvoidTrailingWhitespace;

impl AvoidTrailingWhitespace {
    /// Check trailing whitespace on content string directly
    pub fn check_content(&self, content: &str, file: Option<&Path>) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut line_offset = 0;

        for (index, raw_line) in content.split('\n').enumerate() {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
            let trimmed = line.trim_end_matches([' ', '\t']);

            if trimmed.len() < line.len() {
                let line_number = index + 1;
                let start_column = trimmed.chars().count() + 1;
                let end_column = line.chars().count() + 1;
                let span = Span::new(
                    Position::new(line_number, start_column, line_offset + trimmed.len()),
                    Position::new(line_number, end_column, line_offset + line.len()),
                );
                let extent = Extent::new(span, file, &line[trimmed.len()..]);

                diagnostics.push(
                    Diagnostic::new(
                        NAME,
                        "Line has trailing whitespace",
                        DESCRIPTOR.default_severity,
                        extent.clone(),
                    )
                    .with_correction(Correction::new(extent, "", "Remove trailing whitespace")),
                );
            }

            line_offset += raw_line.len() + 1;
        }

        diagnostics
    }
}

impl Rule for AvoidTrailingWhitespace {
    fn descriptor(&self) -> &RuleDescriptor {
        &DESCRIPTOR
    }

    fn is_reentrant(&self) -> bool {
        true
    }

    fn analyze(
        &self,
        ast: &ScriptAst,
        path: Option<&Path>,
        _context: &RuleContext<'_>,
    ) -> Result<Vec<Diagnostic>, RuleError> {
        Ok(self.check_content(ast.source(), ast.file().or(path)))
    }
}
