//! Suppression attribute support for pslint
//!
//! Diagnostics can be suppressed with `SuppressMessageAttribute` placed on a
//! `param()` block (script or function) or in front of a `class` definition.
//!
//! # Attribute Format
//!
//! ```powershell
//! function Get-Thing {
//!     [Diagnostics.CodeAnalysis.SuppressMessageAttribute('PSAvoidUsingCmdletAliases', '')]
//!     param()
//!     gci
//! }
//! ```
//!
//! - First positional argument: the rule name (required, simple or `Module\Rule`)
//! - Second positional argument: a rule suppression id; `''` matches every finding
//! - `Scope`: `Function` or `Class`, restricts matching to constructs of that kind;
//!   `All` accepts either
//! - `Target`: a glob (or, when it is not a valid glob, a regular expression)
//!   matched against the name of the nearest enclosing construct
//! - `Justification`: free text, recorded but not interpreted

use crate::diagnostic::Diagnostic;
use crate::rule::names_match;
use glob::{MatchOptions, Pattern};
use pslint_parser::ast::{Attribute, ConstructKind, Extent, Node, NodeKind, ScriptAst};
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Attribute type names recognized as suppressions, after namespace stripping.
const ATTRIBUTE_NAMES: &[&str] = &["SuppressMessageAttribute", "SuppressMessage"];

const ATTRIBUTE_NAMESPACES: &[&str] = &[
    "System.Diagnostics.CodeAnalysis.",
    "Diagnostics.CodeAnalysis.",
];

/// The kind of construct a scoped suppression is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionScope {
    Function,
    Class,
    All,
}

impl SuppressionScope {
    pub fn parse(text: &str) -> Option<Self> {
        if text.eq_ignore_ascii_case("function") {
            Some(SuppressionScope::Function)
        } else if text.eq_ignore_ascii_case("class") {
            Some(SuppressionScope::Class)
        } else if text.eq_ignore_ascii_case("all") {
            Some(SuppressionScope::All)
        } else {
            None
        }
    }

    fn accepts(self, kind: ConstructKind) -> bool {
        match self {
            SuppressionScope::Function => kind == ConstructKind::Function,
            SuppressionScope::Class => kind == ConstructKind::Class,
            SuppressionScope::All => true,
        }
    }
}

/// A pattern matched against construct names
#[derive(Debug, Clone)]
pub enum SuppressionTarget {
    Literal(String),
    Glob(Pattern),
    Regex(Regex),
}

impl SuppressionTarget {
    /// Interpret `text` as a literal name, a glob, or a regular expression,
    /// in that order of preference.
    pub fn parse(text: &str) -> Self {
        if !text.contains(['*', '?', '[']) {
            return SuppressionTarget::Literal(text.to_string());
        }
        if let Ok(pattern) = Pattern::new(text) {
            return SuppressionTarget::Glob(pattern);
        }
        match RegexBuilder::new(text).case_insensitive(true).build() {
            Ok(regex) => SuppressionTarget::Regex(regex),
            Err(_) => SuppressionTarget::Literal(text.to_string()),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            SuppressionTarget::Literal(text) => text.eq_ignore_ascii_case(name),
            SuppressionTarget::Glob(pattern) => pattern.matches_with(
                name,
                MatchOptions {
                    case_sensitive: false,
                    ..MatchOptions::new()
                },
            ),
            SuppressionTarget::Regex(regex) => regex.is_match(name),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SuppressionTarget::Literal(text) => text,
            SuppressionTarget::Glob(pattern) => pattern.as_str(),
            SuppressionTarget::Regex(regex) => regex.as_str(),
        }
    }
}

/// One suppression attribute
#[derive(Debug, Clone)]
pub struct SuppressionEntry {
    pub rule_name: String,
    pub rule_suppression_id: Option<String>,
    pub scope: Option<SuppressionScope>,
    pub target: Option<SuppressionTarget>,
    pub justification: Option<String>,
    /// Location of the attribute itself
    pub extent: Extent,
}

impl SuppressionEntry {
    pub fn new(rule_name: &str, extent: Extent) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            rule_suppression_id: None,
            scope: None,
            target: None,
            justification: None,
            extent,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.rule_suppression_id = Some(id.to_string());
        self
    }

    pub fn with_scope(mut self, scope: SuppressionScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(SuppressionTarget::parse(target));
        self
    }

    fn matches_rule(&self, diagnostic: &Diagnostic) -> bool {
        if !names_match(&self.rule_name, &diagnostic.rule_name) {
            return false;
        }
        match &self.rule_suppression_id {
            Some(id) => diagnostic.rule_id.as_deref() == Some(id.as_str()),
            None => true,
        }
    }
}

/// The kind of source region a suppression is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Script,
    Function,
    Class,
}

impl From<ConstructKind> for RegionKind {
    fn from(kind: ConstructKind) -> Self {
        match kind {
            ConstructKind::Function => RegionKind::Function,
            ConstructKind::Class => RegionKind::Class,
        }
    }
}

/// A named source region and the suppressions attached to it
#[derive(Debug, Clone)]
pub struct SuppressedRegion {
    pub kind: RegionKind,
    pub name: String,
    pub extent: Extent,
    pub entries: Vec<SuppressionEntry>,
}

/// A function or class that scoped and targeted suppressions can refer to
#[derive(Debug, Clone)]
pub struct ConstructInfo {
    pub kind: ConstructKind,
    pub name: String,
    pub extent: Extent,
}

/// A problem with a suppression attribute
#[derive(Debug, Clone)]
pub struct SuppressionWarning {
    pub message: String,
    pub extent: Extent,
    /// The rule the suppression names, when it could be read
    pub rule_name: Option<String>,
}

impl SuppressionWarning {
    fn new(message: String, extent: &Extent, rule_name: Option<&str>) -> Self {
        Self {
            message,
            extent: extent.clone(),
            rule_name: rule_name.map(str::to_string),
        }
    }

    pub fn line(&self) -> usize {
        self.extent.start_line()
    }
}

/// Result of filtering diagnostics through a [`SuppressionMatcher`]
#[derive(Debug, Default)]
pub struct FilterResult {
    /// Diagnostics that were not suppressed
    pub kept: Vec<Diagnostic>,
    /// Diagnostics dropped by a suppression
    pub suppressed: Vec<Diagnostic>,
    /// Suppressions that matched nothing
    pub unused: Vec<SuppressionWarning>,
}

/// Matches diagnostics against suppression regions
#[derive(Debug, Clone, Default)]
pub struct SuppressionMatcher {
    regions: Vec<SuppressedRegion>,
    /// Outermost first, as found in pre-order
    constructs: Vec<ConstructInfo>,
}

impl SuppressionMatcher {
    /// Build a matcher from regions and constructs supplied by the caller.
    ///
    /// `constructs` must be in pre-order (outer constructs before the ones
    /// nested inside them).
    pub fn new(regions: Vec<SuppressedRegion>, constructs: Vec<ConstructInfo>) -> Self {
        Self {
            regions,
            constructs,
        }
    }

    /// Collect suppression attributes from a parsed script, returning any warnings
    pub fn from_ast(ast: &ScriptAst) -> (Self, Vec<SuppressionWarning>) {
        let mut warnings = Vec::new();
        let mut regions = Vec::new();

        if let Some(block) = &ast.param_block {
            let entries = entries_from_attributes(&block.attributes, &mut warnings);
            if !entries.is_empty() {
                let name = ast
                    .file()
                    .and_then(|path| path.file_stem())
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                regions.push(SuppressedRegion {
                    kind: RegionKind::Script,
                    name,
                    extent: ast.extent.clone(),
                    entries,
                });
            }
        }

        let named = ast.named_constructs();
        for construct in &named {
            let entries = entries_from_attributes(construct.attributes, &mut warnings);
            if !entries.is_empty() {
                regions.push(SuppressedRegion {
                    kind: construct.kind.into(),
                    name: construct.name.to_string(),
                    extent: construct.extent.clone(),
                    entries,
                });
            }
        }

        let constructs = named
            .into_iter()
            .map(|construct| ConstructInfo {
                kind: construct.kind,
                name: construct.name.to_string(),
                extent: construct.extent.clone(),
            })
            .collect();

        (Self::new(regions, constructs), warnings)
    }

    pub fn regions(&self) -> &[SuppressedRegion] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Split diagnostics into kept and suppressed ones
    pub fn filter(&self, diagnostics: Vec<Diagnostic>) -> FilterResult {
        let mut used: Vec<Vec<bool>> = self
            .regions
            .iter()
            .map(|region| vec![false; region.entries.len()])
            .collect();
        let mut result = FilterResult::default();

        for diagnostic in diagnostics {
            let mut suppressed = false;
            for (region_index, region) in self.regions.iter().enumerate() {
                if !region.extent.is_in_file(diagnostic.extent.file.as_deref())
                    || !region.extent.contains(&diagnostic.extent)
                {
                    continue;
                }
                for (entry_index, entry) in region.entries.iter().enumerate() {
                    if self.entry_applies(entry, &diagnostic) {
                        used[region_index][entry_index] = true;
                        suppressed = true;
                    }
                }
            }

            if suppressed {
                debug!(
                    rule = %diagnostic.rule_name,
                    line = diagnostic.line(),
                    "diagnostic suppressed"
                );
                result.suppressed.push(diagnostic);
            } else {
                result.kept.push(diagnostic);
            }
        }

        for (region, flags) in self.regions.iter().zip(used) {
            for (entry, was_used) in region.entries.iter().zip(flags) {
                if !was_used {
                    result.unused.push(SuppressionWarning::new(
                        format!(
                            "Suppression of '{}' did not match any diagnostic",
                            entry.rule_name
                        ),
                        &entry.extent,
                        Some(&entry.rule_name),
                    ));
                }
            }
        }

        result
    }

    fn entry_applies(&self, entry: &SuppressionEntry, diagnostic: &Diagnostic) -> bool {
        if !entry.matches_rule(diagnostic) {
            return false;
        }
        if entry.scope.is_none() && entry.target.is_none() {
            return true;
        }
        let Some(construct) = self.nearest_construct(&diagnostic.extent, entry.scope) else {
            return false;
        };
        entry
            .target
            .as_ref()
            .is_none_or(|target| target.matches(&construct.name))
    }

    /// The innermost construct enclosing `extent`, optionally of one kind.
    fn nearest_construct(
        &self,
        extent: &Extent,
        scope: Option<SuppressionScope>,
    ) -> Option<&ConstructInfo> {
        self.constructs
            .iter()
            .filter(|construct| {
                scope.is_none_or(|scope| scope.accepts(construct.kind))
                    && construct.extent.is_in_file(extent.file.as_deref())
                    && construct.extent.contains(extent)
            })
            .last()
    }
}

fn entries_from_attributes(
    attributes: &[Attribute],
    warnings: &mut Vec<SuppressionWarning>,
) -> Vec<SuppressionEntry> {
    let mut entries = Vec::new();
    for attribute in attributes {
        if !is_suppression_attribute(&attribute.type_name) {
            continue;
        }
        match entry_from_attribute(attribute, warnings) {
            Ok(entry) => entries.push(entry),
            Err(warning) => warnings.push(warning),
        }
    }
    entries
}

fn is_suppression_attribute(type_name: &str) -> bool {
    let name = ATTRIBUTE_NAMESPACES
        .iter()
        .find_map(|namespace| {
            type_name
                .get(..namespace.len())
                .filter(|prefix| prefix.eq_ignore_ascii_case(namespace))
                .map(|_| &type_name[namespace.len()..])
        })
        .unwrap_or(type_name);
    ATTRIBUTE_NAMES
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(name))
}

/// Read one suppression attribute.
///
/// A missing or non-literal rule name makes the whole attribute unusable;
/// problems with optional arguments only drop that argument.
fn entry_from_attribute(
    attribute: &Attribute,
    warnings: &mut Vec<SuppressionWarning>,
) -> Result<SuppressionEntry, SuppressionWarning> {
    let extent = &attribute.extent;
    let Some(first) = attribute.positional.first() else {
        return Err(SuppressionWarning::new(
            "SuppressMessageAttribute requires a rule name".to_string(),
            extent,
            None,
        ));
    };
    let Some(rule_name) = string_literal(first) else {
        return Err(SuppressionWarning::new(
            format!(
                "SuppressMessageAttribute rule name must be a string literal, found {}",
                first.kind.describe()
            ),
            extent,
            None,
        ));
    };

    let mut entry = SuppressionEntry::new(rule_name, extent.clone());

    if let Some(second) = attribute.positional.get(1) {
        match string_literal(second) {
            Some("") => {}
            Some(id) => entry.rule_suppression_id = Some(id.to_string()),
            None => warnings.push(SuppressionWarning::new(
                format!(
                    "Ignoring non-literal suppression id for '{}'",
                    rule_name
                ),
                extent,
                Some(rule_name),
            )),
        }
    }

    for argument in &attribute.named {
        let value = argument.value.as_ref().and_then(string_literal);
        let name = argument.name.as_str();
        if name.eq_ignore_ascii_case("Scope") {
            match value.map(|v| (v, SuppressionScope::parse(v))) {
                Some((_, Some(scope))) => entry.scope = Some(scope),
                Some((text, None)) => warnings.push(SuppressionWarning::new(
                    format!("Unknown suppression scope '{}' for '{}'", text, rule_name),
                    extent,
                    Some(rule_name),
                )),
                None => warnings.push(non_literal_warning(name, rule_name, extent)),
            }
        } else if name.eq_ignore_ascii_case("Target") {
            match value {
                Some(text) => entry.target = Some(SuppressionTarget::parse(text)),
                None => warnings.push(non_literal_warning(name, rule_name, extent)),
            }
        } else if name.eq_ignore_ascii_case("Justification") {
            entry.justification = value.map(str::to_string);
        }
    }

    Ok(entry)
}

fn non_literal_warning(argument: &str, rule_name: &str, extent: &Extent) -> SuppressionWarning {
    SuppressionWarning::new(
        format!(
            "Ignoring non-literal {} argument of the suppression for '{}'",
            argument, rule_name
        ),
        extent,
        Some(rule_name),
    )
}

fn string_literal(node: &Node) -> Option<&str> {
    match &node.kind {
        NodeKind::StringConstant { value, .. } => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use pslint_parser::ast::{Position, Span};
    use pslint_parser::parse_string;

    /// A diagnostic on the first command named `command`.
    fn diagnostic_on_line(rule: &str, line: usize) -> Diagnostic {
        let span = Span::new(Position::new(line, 5, 0), Position::new(line, 8, 0));
        Diagnostic::new(rule, "test", Severity::Warning, Extent::new(span, None, "gci"))
    }

    fn diagnostic_at(ast: &ScriptAst, rule: &str, command: &str) -> Diagnostic {
        let node = ast
            .find_all(|node| matches!(&node.kind, NodeKind::Command { name, .. } if name == command))
            .into_iter()
            .next()
            .expect("command present");
        Diagnostic::new(rule, "test", Severity::Warning, node.extent.clone())
    }

    #[test]
    fn test_target_patterns() {
        let target = SuppressionTarget::parse("start-ba[rz]");
        assert!(matches!(target, SuppressionTarget::Glob(_)));
        assert!(target.matches("start-bar"));
        assert!(target.matches("start-baz"));
        assert!(target.matches("Start-Bar"));
        assert!(!target.matches("start-foo"));
        assert!(!target.matches("start-bam"));
    }

    #[test]
    fn test_target_literal_and_regex() {
        let literal = SuppressionTarget::parse("Get-Thing");
        assert!(matches!(literal, SuppressionTarget::Literal(_)));
        assert!(literal.matches("get-thing"));

        // An unclosed bracket is not a valid glob, but is a valid escaped regex
        let regex = SuppressionTarget::parse(r"^Get-\[x");
        assert!(matches!(regex, SuppressionTarget::Regex(_)));
        assert!(regex.matches("get-[x1"));
        assert!(!regex.matches("Set-[x"));

        // Neither a glob nor a regex
        let neither = SuppressionTarget::parse("Get-[x");
        assert!(matches!(neither, SuppressionTarget::Literal(_)));
    }

    #[test]
    fn test_attribute_name_recognition() {
        assert!(is_suppression_attribute("SuppressMessageAttribute"));
        assert!(is_suppression_attribute("suppressmessage"));
        assert!(is_suppression_attribute(
            "Diagnostics.CodeAnalysis.SuppressMessageAttribute"
        ));
        assert!(is_suppression_attribute(
            "System.Diagnostics.CodeAnalysis.SuppressMessage"
        ));
        assert!(!is_suppression_attribute("CmdletBinding"));
    }

    #[test]
    fn test_function_suppression() {
        let source = r#"
function Get-Quiet {
    [Diagnostics.CodeAnalysis.SuppressMessageAttribute('PSAvoidUsingCmdletAliases', '')]
    param()
    gci
}
function Get-Loud {
    ls
}
"#;
        let ast = parse_string(source).unwrap();
        let (matcher, warnings) = SuppressionMatcher::from_ast(&ast);
        assert!(warnings.is_empty());
        assert_eq!(matcher.regions().len(), 1);
        assert_eq!(matcher.regions()[0].kind, RegionKind::Function);

        let result = matcher.filter(vec![
            diagnostic_at(&ast, "PSAvoidUsingCmdletAliases", "gci"),
            diagnostic_at(&ast, "PSAvoidUsingCmdletAliases", "ls"),
            diagnostic_at(&ast, "PSOtherRule", "gci"),
        ]);
        assert_eq!(result.suppressed.len(), 1);
        assert_eq!(result.kept.len(), 2);
        assert!(result.unused.is_empty());
    }

    #[test]
    fn test_script_level_suppression_with_scope_and_target() {
        let source = r#"
[SuppressMessageAttribute('PSAvoidUsingCmdletAliases', '', Scope = 'Function', Target = 'start-ba[rz]')]
param()

function start-bar { gci }
function start-baz { gci }
function start-foo { gci }
function start-bam { gci }
gci
"#;
        let ast = parse_string(source).unwrap();
        let (matcher, warnings) = SuppressionMatcher::from_ast(&ast);
        assert!(warnings.is_empty());

        let diagnostics: Vec<Diagnostic> = ast
            .find_all(|node| matches!(&node.kind, NodeKind::Command { name, .. } if name == "gci"))
            .into_iter()
            .map(|node| {
                Diagnostic::new(
                    "PSAvoidUsingCmdletAliases",
                    "alias",
                    Severity::Warning,
                    node.extent.clone(),
                )
            })
            .collect();
        assert_eq!(diagnostics.len(), 5);

        let result = matcher.filter(diagnostics);
        let suppressed_lines: Vec<usize> = result.suppressed.iter().map(|d| d.line()).collect();
        assert_eq!(suppressed_lines, vec![5, 6]);
        assert_eq!(result.kept.len(), 3);
    }

    #[test]
    fn test_all_scope_matches_any_construct() {
        let source = r#"
[SuppressMessageAttribute('PSRule', '', Scope = 'All', Target = 'Widget*')]
param()

function Widget-Run { gci }
class WidgetStore {
    [void] Load() { gci }
}
function Get-Other { gci }
gci
"#;
        let ast = parse_string(source).unwrap();
        let (matcher, warnings) = SuppressionMatcher::from_ast(&ast);
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
        assert_eq!(SuppressionScope::parse("all"), Some(SuppressionScope::All));

        let diagnostics: Vec<Diagnostic> = [5, 7, 9, 10]
            .into_iter()
            .map(|line| diagnostic_on_line("PSRule", line))
            .collect();

        let result = matcher.filter(diagnostics);
        let suppressed_lines: Vec<usize> = result.suppressed.iter().map(|d| d.line()).collect();
        assert_eq!(suppressed_lines, vec![5, 7]);
        assert_eq!(result.kept.len(), 2);
    }

    #[test]
    fn test_class_suppression() {
        let source = "[SuppressMessageAttribute('PSRule', '')]\nclass Widget {\n  [void] Run() { gci }\n}\ngci\n";
        let ast = parse_string(source).unwrap();
        let (matcher, _) = SuppressionMatcher::from_ast(&ast);
        assert_eq!(matcher.regions()[0].kind, RegionKind::Class);
        assert_eq!(matcher.regions()[0].name, "Widget");

        let class_extent = matcher.regions()[0].extent.clone();
        let inside = Extent::new(
            Span::new(Position::new(3, 18, 0), Position::new(3, 21, 0)),
            None,
            "gci",
        );
        assert!(class_extent.contains(&inside));

        let result = matcher.filter(vec![
            Diagnostic::new("PSRule", "inside", Severity::Warning, inside),
            diagnostic_at(&ast, "PSRule", "gci"),
        ]);
        assert_eq!(result.suppressed.len(), 1);
        assert_eq!(result.kept.len(), 1);
        assert_eq!(result.kept[0].line(), 5);
    }

    #[test]
    fn test_suppression_id_must_match() {
        let source = "function f {\n  [SuppressMessageAttribute('PSRule', 'gci')]\n  param()\n  gci\n  ls\n}\n";
        let ast = parse_string(source).unwrap();
        let (matcher, _) = SuppressionMatcher::from_ast(&ast);

        let result = matcher.filter(vec![
            diagnostic_at(&ast, "PSRule", "gci").with_rule_id("gci"),
            diagnostic_at(&ast, "PSRule", "ls").with_rule_id("ls"),
            diagnostic_at(&ast, "PSRule", "ls"),
        ]);
        assert_eq!(result.suppressed.len(), 1);
        assert_eq!(result.suppressed[0].rule_id.as_deref(), Some("gci"));
        assert_eq!(result.kept.len(), 2);
    }

    #[test]
    fn test_namespaced_rule_names() {
        let source = "function f {\n  [SuppressMessageAttribute('PSRule', '')]\n  param()\n  gci\n}\n";
        let ast = parse_string(source).unwrap();
        let (matcher, _) = SuppressionMatcher::from_ast(&ast);
        let result = matcher.filter(vec![diagnostic_at(&ast, "MyModule\\psrule", "gci")]);
        assert_eq!(result.suppressed.len(), 1);
    }

    #[test]
    fn test_unused_and_invalid_suppressions() {
        let source = r#"
function f {
    [SuppressMessageAttribute($ruleName)]
    [SuppressMessageAttribute('PSUnused', '', Scope = 'Module')]
    [SuppressMessageAttribute()]
    param()
    gci
}
"#;
        let ast = parse_string(source).unwrap();
        let (matcher, warnings) = SuppressionMatcher::from_ast(&ast);
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].message.contains("must be a string literal"));
        assert!(warnings[1].message.contains("Unknown suppression scope 'Module'"));
        assert!(warnings[2].message.contains("requires a rule name"));

        let result = matcher.filter(vec![diagnostic_at(&ast, "PSOther", "gci")]);
        assert_eq!(result.kept.len(), 1);
        assert_eq!(result.unused.len(), 1);
        assert_eq!(result.unused[0].rule_name.as_deref(), Some("PSUnused"));
    }

    #[test]
    fn test_diagnostic_in_other_file_is_not_suppressed() {
        let source = "function f {\n  [SuppressMessageAttribute('PSRule', '')]\n  param()\n  gci\n}\n";
        let path = std::path::Path::new("a.ps1");
        let ast = pslint_parser::parse_source(source, Some(path)).unwrap();
        let (matcher, _) = SuppressionMatcher::from_ast(&ast);

        let mut diagnostic = diagnostic_at(&ast, "PSRule", "gci");
        diagnostic.extent.file = Some(std::path::PathBuf::from("b.ps1"));
        let result = matcher.filter(vec![diagnostic]);
        assert_eq!(result.kept.len(), 1);
    }
}
