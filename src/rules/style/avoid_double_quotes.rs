use pslint_common::parser::ast::{NodeKind, QuoteKind, ScriptAst};
use pslint_common::{
    Correction, Diagnostic, Rule, RuleContext, RuleDescriptor, RuleError, Severity,
};
use std::path::Path;
use std::sync::LazyLock;

pub const NAME: &str = "PSAvoidUsingDoubleQuotesForConstantString";

static DESCRIPTOR: LazyLock<RuleDescriptor> = LazyLock::new(|| {
    RuleDescriptor::builtin(
        NAME,
        "Avoid using double quotes if the string is constant",
        "Use single quotes if the string is constant. Only reported when enabled \
         with Enable = $true.",
        Severity::Information,
    )
});

/// Reports double-quoted strings with nothing to expand.
///
/// Opt-in: runs only when its settings contain `Enable = $true`.
pub struct AvoidUsingDoubleQuotesForConstantString;

impl Rule for AvoidUsingDoubleQuotesForConstantString {
    fn descriptor(&self) -> &RuleDescriptor {
        &DESCRIPTOR
    }

    fn is_reentrant(&self) -> bool {
        true
    }

    fn analyze(
        &self,
        ast: &ScriptAst,
        _path: Option<&Path>,
        context: &RuleContext<'_>,
    ) -> Result<Vec<Diagnostic>, RuleError> {
        if context.arguments().get_bool("Enable") != Some(true) {
            return Ok(Vec::new());
        }

        let mut diagnostics = Vec::new();
        ast.walk(&mut |node| {
            let NodeKind::StringConstant {
                value,
                quote: QuoteKind::Double,
            } = &node.kind
            else {
                return;
            };
            // Escapes and embedded quotes would need rewriting
            let raw = &node.extent.text;
            if raw.contains(['`', '\'']) {
                return;
            }

            diagnostics.push(
                Diagnostic::new(
                    NAME,
                    &format!("The string {} is constant; use single quotes.", raw),
                    DESCRIPTOR.default_severity,
                    node.extent.clone(),
                )
                .with_correction(Correction::new(
                    node.extent.clone(),
                    &format!("'{}'", value),
                    "Replace double quotes with single quotes",
                )),
            );
        });
        Ok(diagnostics)
    }
}
