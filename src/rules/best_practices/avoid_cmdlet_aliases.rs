use pslint_common::parser::ast::{Node, NodeKind, ScriptAst};
use pslint_common::{
    Correction, Diagnostic, Rule, RuleContext, RuleDescriptor, RuleError, Severity,
};
use std::path::Path;
use std::sync::LazyLock;

pub const NAME: &str = "PSAvoidUsingCmdletAliases";

static DESCRIPTOR: LazyLock<RuleDescriptor> = LazyLock::new(|| {
    RuleDescriptor::builtin(
        NAME,
        "Avoid Using Cmdlet Aliases",
        "An alias is an alternate name or nickname for a cmdlet. Aliases make \
         scripts harder to read and may not exist on other machines.",
        Severity::Warning,
    )
    .with_arguments(&["AllowList"])
});

/// Reports commands invoked through an alias and proposes the full name.
///
/// Arguments: `AllowList`, aliases that are never reported.
pub struct AvoidUsingCmdletAliases;

impl AvoidUsingCmdletAliases {
    fn check_command(
        &self,
        node: &Node,
        allow_list: &[String],
        context: &RuleContext<'_>,
    ) -> Option<Diagnostic> {
        let NodeKind::Command {
            name,
            name_extent,
            arguments,
        } = &node.kind
        else {
            return None;
        };

        if allow_list.iter().any(|a| a.eq_ignore_ascii_case(name)) {
            return None;
        }
        // `foreach ($x in $y)` is the loop keyword, not ForEach-Object
        if name.eq_ignore_ascii_case("foreach")
            && arguments.first().is_some_and(|arg| {
                matches!(arg.kind, NodeKind::Paren(_) | NodeKind::SubExpression(_))
            })
        {
            return None;
        }

        let command = context.aliases().resolve(name)?;
        let message = format!(
            "'{}' is an alias of '{}'. Aliases can introduce problems and make scripts hard \
             to maintain. Please consider changing the alias to its full content.",
            name, command
        );
        Some(
            Diagnostic::new(NAME, &message, DESCRIPTOR.default_severity, name_extent.clone())
                .with_rule_id(name)
                .with_correction(Correction::new(
                    name_extent.clone(),
                    command,
                    &format!("Replace {} with {}", name, command),
                )),
        )
    }
}

impl Rule for AvoidUsingCmdletAliases {
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
        let args = context.arguments();
        let allow_list = match args.get("AllowList") {
            None => Vec::new(),
            Some(value) => value.as_string_list().ok_or_else(|| {
                RuleError::invalid_argument(
                    "AllowList",
                    format!("expected a string or an array of strings, found {}", value.type_name()),
                )
            })?,
        };

        let mut diagnostics = Vec::new();
        ast.walk(&mut |node| {
            if let Some(diagnostic) = self.check_command(node, &allow_list, context) {
                diagnostics.push(diagnostic);
            }
        });
        Ok(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pslint_common::parser::parse_string;
    use pslint_common::{AliasTable, CancellationToken, LiteralValue, NameMap};

    fn check_with(source: &str, arguments: &NameMap<LiteralValue>) -> Result<Vec<Diagnostic>, RuleError> {
        let ast = parse_string(source).unwrap();
        let aliases = AliasTable::builtin();
        let token = CancellationToken::new();
        let context = RuleContext::new(&aliases, arguments, &token);
        AvoidUsingCmdletAliases.analyze(&ast, None, &context)
    }

    fn check(source: &str) -> Vec<Diagnostic> {
        check_with(source, &NameMap::new()).unwrap()
    }

    #[test]
    fn test_no_aliases() {
        assert!(check("Get-ChildItem -Path . | Where-Object { $_.Length -gt 1 }").is_empty());
    }

    #[test]
    fn test_reports_aliases_in_pipeline() {
        let diagnostics = check("gci -Recurse | ? { $_.Length -gt 1kb } | % { $_.Name }");
        let ids: Vec<_> = diagnostics.iter().map(|d| d.rule_id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["gci", "?", "%"]);
        assert_eq!(diagnostics[0].line(), 1);
        assert_eq!(diagnostics[0].column(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert!(diagnostics[0].message.contains("'gci' is an alias of 'Get-ChildItem'"));
    }

    #[test]
    fn test_correction_replaces_name_only() {
        let diagnostics = check("  ls -Force");
        let correction = &diagnostics[0].corrections[0];
        assert_eq!(correction.replacement, "Get-ChildItem");
        assert_eq!(correction.extent.text, "ls");
        assert_eq!(correction.extent.start.column, 3);
        assert_eq!(correction.extent.end.column, 5);
        assert_eq!(correction.description, "Replace ls with Get-ChildItem");
    }

    #[test]
    fn test_aliases_inside_functions_and_blocks() {
        let source = "function Get-Sizes {\n    param($Path)\n    dir $Path | foreach { $_.Length }\n}\nif ($true) { cls }";
        let diagnostics = check(source);
        let lines: Vec<_> = diagnostics.iter().map(|d| d.line()).collect();
        assert_eq!(lines, vec![3, 3, 5]);
    }

    #[test]
    fn test_foreach_keyword_is_not_alias() {
        assert!(check("foreach ($item in $items) { Write-Output $item }").is_empty());
    }

    #[test]
    fn test_case_insensitive_alias_lookup() {
        let diagnostics = check("GCI");
        assert_eq!(diagnostics[0].corrections[0].replacement, "Get-ChildItem");
    }

    #[test]
    fn test_allow_list() {
        let mut args = NameMap::new();
        args.insert("AllowList", LiteralValue::Array(vec!["CD".into(), "ls".into()]));
        let diagnostics = check_with("cd $HOME\nls\ngci", &args).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule_id.as_deref(), Some("gci"));
    }

    #[test]
    fn test_invalid_allow_list() {
        let mut args = NameMap::new();
        args.insert("AllowList", LiteralValue::Bool(true));
        let err = check_with("gci", &args).unwrap_err();
        assert!(matches!(err, RuleError::InvalidArgument { ref key, .. } if key == "AllowList"));
    }

    #[test]
    fn test_arguments_are_not_commands() {
        assert!(check("Write-Output gci ls").is_empty());
        assert!(check("$x = @{ ls = 1 }").is_empty());
    }
}
