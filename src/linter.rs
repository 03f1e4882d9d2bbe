use crate::registry::RuleRegistry;
use crate::settings::Configuration;
use pslint_common::{
    AliasTable, CancellationToken, Diagnostic, Rule, RunContext, ScriptAst, SourceType,
    SuppressionMatcher, SuppressionWarning,
};
use rayon::prelude::*;
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Category of a recovered problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningKind {
    /// A rule returned an error or panicked
    RuleExecutionFailure,
    /// A rule argument key the rule does not declare
    UnknownArgument,
    /// A rule argument with a value of the wrong shape
    InvalidArgument,
    /// Arguments configured for a rule that does not exist
    UnknownRule,
    /// A settings value that could not be interpreted
    InvalidSetting,
    /// A custom rule module could not be loaded
    CustomRuleLoad,
    /// A malformed or unused suppression attribute
    Suppression,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WarningKind::RuleExecutionFailure => "rule-execution-failure",
            WarningKind::UnknownArgument => "unknown-argument",
            WarningKind::InvalidArgument => "invalid-argument",
            WarningKind::UnknownRule => "unknown-rule",
            WarningKind::InvalidSetting => "invalid-setting",
            WarningKind::CustomRuleLoad => "custom-rule-load",
            WarningKind::Suppression => "suppression",
        };
        f.write_str(name)
    }
}

/// A non-fatal problem found while setting up or running an analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisWarning {
    pub kind: WarningKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl AnalysisWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            rule_name: None,
            file: None,
            line: None,
        }
    }

    pub fn with_rule(mut self, rule_name: &str) -> Self {
        self.rule_name = Some(rule_name.to_string());
        self
    }

    pub fn with_location(mut self, file: Option<&Path>, line: usize) -> Self {
        self.file = file.map(Path::to_path_buf);
        self.line = Some(line);
        self
    }

    fn from_suppression(warning: SuppressionWarning, file: Option<&Path>) -> Self {
        let line = warning.line();
        let mut converted = Self::new(WarningKind::Suppression, warning.message)
            .with_location(warning.extent.file.as_deref().or(file), line);
        converted.rule_name = warning.rule_name;
        converted
    }
}

impl std::fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: ", file.display(), line)?,
            (Some(file), None) => write!(f, "{}: ", file.display())?,
            _ => {}
        }
        write!(f, "{}", self.message)
    }
}

/// What running the active rules over one script produced
#[derive(Debug, Clone, Default)]
pub struct LintOutput {
    pub diagnostics: Vec<Diagnostic>,
    pub warnings: Vec<AnalysisWarning>,
    /// Set when cancellation stopped the run before every rule had run
    pub cancelled: bool,
}

/// Profiling information for a single rule
#[derive(Debug, Clone)]
pub struct RuleProfile {
    /// Rule name
    pub name: String,
    /// Builtin or custom
    pub source_type: SourceType,
    /// Time taken to execute the rule
    pub duration: Duration,
    /// Number of diagnostics reported by this rule
    pub diagnostic_count: usize,
}

enum RuleRun {
    Completed(Vec<Diagnostic>),
    Failed(AnalysisWarning),
    Skipped,
}

/// Runs a fixed set of rules over scripts.
///
/// A rule that returns an error or panics is reported as a
/// [`WarningKind::RuleExecutionFailure`] warning and its diagnostics are
/// discarded; the other rules are unaffected.
pub struct Linter {
    rules: Vec<Arc<dyn Rule>>,
    context: RunContext,
    /// Held while a non-reentrant rule runs
    serial: Mutex<()>,
}

impl Linter {
    pub fn new(rules: Vec<Arc<dyn Rule>>, context: RunContext) -> Self {
        Self {
            rules,
            context,
            serial: Mutex::new(()),
        }
    }

    /// Select the rules `config` activates and build the run context.
    pub fn from_registry(
        registry: &RuleRegistry,
        config: &Configuration,
        cancellation: CancellationToken,
    ) -> (Self, Vec<AnalysisWarning>) {
        let selection = registry.select(config);
        let context = RunContext::new(
            AliasTable::builtin(),
            config.rule_arguments.clone(),
            cancellation,
        );
        (Self::new(selection.rules, context), selection.warnings)
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn cancellation(&self) -> &CancellationToken {
        self.context.cancellation()
    }

    /// Whether `name` is one of the rules this linter runs.
    pub fn runs_rule(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.descriptor().matches_name(name))
    }

    fn run_rule(&self, rule: &dyn Rule, ast: &ScriptAst, path: Option<&Path>) -> RuleRun {
        if self.context.cancellation().is_cancelled() {
            return RuleRun::Skipped;
        }

        let descriptor = rule.descriptor();
        let context = self.context.for_rule(descriptor);
        let _guard = if rule.is_reentrant() {
            None
        } else {
            Some(self.serial.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
        };
        if self.context.cancellation().is_cancelled() {
            return RuleRun::Skipped;
        }

        let result = catch_unwind(AssertUnwindSafe(|| rule.analyze(ast, path, &context)));
        let failure = match result {
            Ok(Ok(mut diagnostics)) => {
                if let Some(path) = path {
                    for diagnostic in &mut diagnostics {
                        diagnostic.script_path.get_or_insert_with(|| path.to_path_buf());
                    }
                }
                return RuleRun::Completed(diagnostics);
            }
            Ok(Err(e)) => format!("Rule '{}' failed: {}", descriptor.full_name(), e),
            Err(payload) => format!(
                "Rule '{}' panicked: {}",
                descriptor.full_name(),
                panic_message(payload.as_ref())
            ),
        };

        warn!("{}", failure);
        let mut warning = AnalysisWarning::new(WarningKind::RuleExecutionFailure, failure)
            .with_rule(&descriptor.full_name());
        warning.file = path.map(Path::to_path_buf);
        RuleRun::Failed(warning)
    }

    fn collect(runs: Vec<RuleRun>) -> LintOutput {
        let mut output = LintOutput::default();
        for run in runs {
            match run {
                RuleRun::Completed(diagnostics) => output.diagnostics.extend(diagnostics),
                RuleRun::Failed(warning) => output.warnings.push(warning),
                RuleRun::Skipped => output.cancelled = true,
            }
        }
        output
    }

    /// Run every rule over one script.
    ///
    /// Reentrant rules run in parallel; diagnostics keep rule order.
    pub fn lint(&self, ast: &ScriptAst, path: Option<&Path>) -> LintOutput {
        let runs: Vec<RuleRun> = self
            .rules
            .par_iter()
            .map(|rule| self.run_rule(rule.as_ref(), ast, path))
            .collect();
        Self::collect(runs)
    }

    /// Run every rule sequentially and record how long each one took.
    pub fn lint_with_profile(
        &self,
        ast: &ScriptAst,
        path: Option<&Path>,
    ) -> (LintOutput, Vec<RuleProfile>) {
        let mut runs = Vec::with_capacity(self.rules.len());
        let mut profiles = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let start = Instant::now();
            let run = self.run_rule(rule.as_ref(), ast, path);
            let duration = start.elapsed();
            let diagnostic_count = match &run {
                RuleRun::Completed(diagnostics) => diagnostics.len(),
                _ => 0,
            };
            profiles.push(RuleProfile {
                name: rule.descriptor().full_name(),
                source_type: rule.descriptor().source_type,
                duration,
                diagnostic_count,
            });
            runs.push(run);
        }
        (Self::collect(runs), profiles)
    }

    /// Run the rules, then drop diagnostics covered by suppression attributes.
    pub fn lint_and_suppress(&self, ast: &ScriptAst, path: Option<&Path>) -> AnalysisOutcome {
        let output = self.lint(ast, path);
        self.suppress(ast, path, output)
    }

    pub(crate) fn suppress(
        &self,
        ast: &ScriptAst,
        path: Option<&Path>,
        output: LintOutput,
    ) -> AnalysisOutcome {
        let (matcher, suppression_warnings) = SuppressionMatcher::from_ast(ast);
        let result = matcher.filter(output.diagnostics);

        let mut warnings = output.warnings;
        warnings.extend(
            suppression_warnings
                .into_iter()
                .map(|w| AnalysisWarning::from_suppression(w, path)),
        );
        // Suppressions for rules that did not run are not "unused"
        warnings.extend(
            result
                .unused
                .into_iter()
                .filter(|w| w.rule_name.as_deref().is_none_or(|name| self.runs_rule(name)))
                .map(|w| AnalysisWarning::from_suppression(w, path)),
        );

        if !result.suppressed.is_empty() {
            debug!(count = result.suppressed.len(), "diagnostics suppressed");
        }
        AnalysisOutcome {
            diagnostics: result.kept,
            suppressed: result.suppressed,
            warnings,
            cancelled: output.cancelled,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The result of analyzing one script
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisOutcome {
    /// Diagnostics that survived suppression
    pub diagnostics: Vec<Diagnostic>,
    /// Diagnostics dropped by suppression attributes
    pub suppressed: Vec<Diagnostic>,
    pub warnings: Vec<AnalysisWarning>,
    pub cancelled: bool,
}

impl AnalysisOutcome {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Run the rules `configuration` activates over an already parsed script.
///
/// Setup warnings (unknown arguments, unknown rules) are included in the
/// outcome.
pub fn run_analysis(
    registry: &RuleRegistry,
    ast: &ScriptAst,
    file_path: Option<&Path>,
    configuration: &Configuration,
) -> AnalysisOutcome {
    let (linter, setup_warnings) =
        Linter::from_registry(registry, configuration, CancellationToken::new());
    let mut outcome = linter.lint_and_suppress(ast, file_path);
    let mut warnings = setup_warnings;
    warnings.append(&mut outcome.warnings);
    outcome.warnings = warnings;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::{Concurrency, FailingRule, FixedRule, PanickingRule, TrackingRule};
    use pslint_common::parser::parse_string;
    use pslint_common::{RuleDescriptor, Severity};

    fn descriptor(name: &str) -> RuleDescriptor {
        RuleDescriptor::builtin(name, name, "test", Severity::Warning)
    }

    fn finding(rule: &str, ast: &ScriptAst) -> Diagnostic {
        Diagnostic::new(rule, "found", Severity::Warning, ast.statements[0].extent.clone())
    }

    fn linter(rules: Vec<Arc<dyn Rule>>) -> Linter {
        Linter::new(rules, RunContext::default())
    }

    #[test]
    fn test_failing_rules_do_not_block_others() {
        let ast = parse_string("Get-Thing").unwrap();
        let good: Arc<dyn Rule> =
            Arc::new(FixedRule::new(descriptor("PSGood"), vec![finding("PSGood", &ast)]));
        let linter = linter(vec![
            Arc::new(FailingRule::new(descriptor("PSFailing"))),
            good,
            Arc::new(PanickingRule::new(descriptor("PSPanicking"))),
        ]);

        let output = linter.lint(&ast, None);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].rule_name, "PSGood");
        assert_eq!(output.warnings.len(), 2);
        assert!(output
            .warnings
            .iter()
            .all(|w| w.kind == WarningKind::RuleExecutionFailure));
        assert_eq!(output.warnings[0].rule_name.as_deref(), Some("PSFailing"));
        assert!(output.warnings[1].message.contains("panicked: rule exploded"));
        assert!(!output.cancelled);
    }

    #[test]
    fn test_diagnostics_keep_rule_order() {
        let ast = parse_string("x").unwrap();
        let rules: Vec<Arc<dyn Rule>> = (0..8)
            .map(|i| {
                let name = format!("PSRule{}", i);
                Arc::new(FixedRule::new(descriptor(&name), vec![finding(&name, &ast)]))
                    as Arc<dyn Rule>
            })
            .collect();
        let output = linter(rules).lint(&ast, None);
        let names: Vec<_> = output.diagnostics.iter().map(|d| d.rule_name.clone()).collect();
        let expected: Vec<_> = (0..8).map(|i| format!("PSRule{}", i)).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_cancelled_before_run() {
        let ast = parse_string("x").unwrap();
        let token = CancellationToken::new();
        let linter = Linter::new(
            vec![Arc::new(FixedRule::new(descriptor("PSRule"), vec![finding("PSRule", &ast)]))],
            RunContext::new(AliasTable::builtin(), Default::default(), token.clone()),
        );
        token.cancel();
        let output = linter.lint(&ast, None);
        assert!(output.cancelled);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_rules_run_one_at_a_time_by_default() {
        let ast = parse_string("x").unwrap();
        let concurrency = Arc::new(Concurrency::default());
        let rules: Vec<Arc<dyn Rule>> = (0..8)
            .map(|i| {
                Arc::new(TrackingRule::new(
                    descriptor(&format!("PSRule{}", i)),
                    concurrency.clone(),
                    false,
                )) as Arc<dyn Rule>
            })
            .collect();

        let output = linter(rules).lint(&ast, None);
        assert!(output.warnings.is_empty());
        assert_eq!(concurrency.max(), 1);
    }

    #[test]
    fn test_non_reentrant_rules_serialized_among_reentrant_ones() {
        let ast = parse_string("x").unwrap();
        let serial = Arc::new(Concurrency::default());
        let parallel = Arc::new(Concurrency::default());
        let rules: Vec<Arc<dyn Rule>> = (0..8)
            .map(|i| {
                let reentrant = i % 2 == 0;
                let concurrency = if reentrant { &parallel } else { &serial };
                Arc::new(TrackingRule::new(
                    descriptor(&format!("PSRule{}", i)),
                    concurrency.clone(),
                    reentrant,
                )) as Arc<dyn Rule>
            })
            .collect();

        linter(rules).lint(&ast, None);
        assert_eq!(serial.max(), 1);
    }

    #[test]
    fn test_cancelled_while_waiting_for_serial_rule() {
        let ast = parse_string("x").unwrap();
        let token = CancellationToken::new();
        let linter = Linter::new(
            vec![Arc::new(FixedRule::new(descriptor("PSRule"), vec![finding("PSRule", &ast)]))],
            RunContext::new(AliasTable::builtin(), Default::default(), token.clone()),
        );

        let guard = linter.serial.lock().unwrap();
        let output = std::thread::scope(|scope| {
            let handle = scope.spawn(|| linter.lint(&ast, None));
            std::thread::sleep(std::time::Duration::from_millis(50));
            token.cancel();
            drop(guard);
            handle.join().unwrap()
        });
        assert!(output.cancelled);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_script_path_is_filled_in() {
        let ast = parse_string("x").unwrap();
        let linter = linter(vec![Arc::new(FixedRule::new(
            descriptor("PSRule"),
            vec![finding("PSRule", &ast)],
        ))]);
        let output = linter.lint(&ast, Some(Path::new("script.ps1")));
        assert_eq!(
            output.diagnostics[0].script_path.as_deref(),
            Some(Path::new("script.ps1"))
        );
    }

    #[test]
    fn test_profile() {
        let ast = parse_string("x").unwrap();
        let linter = linter(vec![
            Arc::new(FixedRule::new(descriptor("PSA"), vec![finding("PSA", &ast)])),
            Arc::new(FailingRule::new(descriptor("PSB"))),
        ]);
        let (output, profiles) = linter.lint_with_profile(&ast, None);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].name, "PSA");
        assert_eq!(profiles[0].diagnostic_count, 1);
        assert_eq!(profiles[1].diagnostic_count, 0);
    }

    #[test]
    fn test_suppression_and_unused_warnings() {
        let source = "function Get-It {\n    [Diagnostics.CodeAnalysis.SuppressMessageAttribute('PSRule', '')]\n    [Diagnostics.CodeAnalysis.SuppressMessageAttribute('PSOther', '')]\n    [Diagnostics.CodeAnalysis.SuppressMessageAttribute('PSNotRunning', '')]\n    param()\n    x\n}\n";
        let ast = parse_string(source).unwrap();
        let inner = match &ast.statements[0].kind {
            pslint_common::parser::ast::NodeKind::FunctionDefinition(f) => {
                f.body.statements[0].extent.clone()
            }
            other => panic!("unexpected {:?}", other),
        };
        let diagnostic = Diagnostic::new("PSRule", "found", Severity::Warning, inner);
        let linter = linter(vec![
            Arc::new(FixedRule::new(descriptor("PSRule"), vec![diagnostic])),
            Arc::new(FixedRule::empty(descriptor("PSOther"))),
        ]);

        let outcome = linter.lint_and_suppress(&ast, None);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.suppressed.len(), 1);
        assert_eq!(outcome.warnings.len(), 1, "{:?}", outcome.warnings);
        assert_eq!(outcome.warnings[0].kind, WarningKind::Suppression);
        assert_eq!(outcome.warnings[0].rule_name.as_deref(), Some("PSOther"));
    }

    #[test]
    fn test_run_analysis_with_configuration() {
        let registry = RuleRegistry::with_builtin_rules();
        let ast = parse_string("gci | % { $_ }\n").unwrap();
        let config = Configuration {
            include_rules: vec!["PSAvoidUsingCmdletAliases".to_string()],
            ..Default::default()
        };
        let outcome = run_analysis(&registry, &ast, None, &config);
        let ids: Vec<_> = outcome
            .diagnostics
            .iter()
            .map(|d| d.rule_id.clone().unwrap_or_default())
            .collect();
        assert_eq!(ids, vec!["gci", "%"]);
        assert!(outcome.warnings.is_empty());
    }
}
