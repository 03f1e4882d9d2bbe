use pslint::parser::ast::NodeKind;
use pslint::plugin::ModuleRuleLoader;
use pslint::settings::SETTINGS_FILE_NAME;
use pslint::{
    Analyzer, Configuration, Diagnostic, Rule, RuleDescriptor, RuleError, RuleRegistry,
    SettingsError, SettingsInput, SettingsMode, Severity, apply_fixes, resolve_settings,
};
use pslint_common::{RuleContext, ScriptAst};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn fixture_dir(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fixture_script(name: &str) -> PathBuf {
    fixture_dir(name).join("script.ps1")
}

fn default_analyzer() -> Analyzer {
    Analyzer::new(&RuleRegistry::with_builtin_rules(), &Configuration::default())
}

#[test]
fn test_clean_script() {
    let outcome = default_analyzer()
        .analyze_file(&fixture_script("clean"))
        .expect("Failed to analyze clean script");

    assert!(
        outcome.diagnostics.is_empty(),
        "Expected no diagnostics, got: {:?}",
        outcome.diagnostics
    );
    assert!(outcome.warnings.is_empty());
}

#[test]
fn test_aliases_and_whitespace() {
    let path = fixture_script("aliases");
    let outcome = default_analyzer().analyze_file(&path).unwrap();

    let found: Vec<_> = outcome
        .diagnostics
        .iter()
        .map(|d| (d.rule_name.as_str(), d.line(), d.column()))
        .collect();
    assert_eq!(
        found,
        vec![
            ("PSAvoidUsingCmdletAliases", 1, 1),
            ("PSAvoidUsingCmdletAliases", 1, 16),
            ("PSAvoidTrailingWhitespace", 2, 20),
        ]
    );
    assert!(
        outcome
            .diagnostics
            .iter()
            .all(|d| d.script_path.as_deref() == Some(path.as_path()))
    );
}

#[test]
fn test_fix_rewrites_script() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("script.ps1");
    fs::copy(fixture_script("aliases"), &path).unwrap();

    let analyzer = default_analyzer();
    let outcome = analyzer.analyze_file(&path).unwrap();
    let applied = apply_fixes(&path, &outcome.diagnostics).unwrap();

    assert_eq!(applied, 3);
    let expected = fs::read_to_string(fixture_dir("aliases").join("fixed.ps1")).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), expected);

    // A second pass finds nothing left to fix
    let outcome = analyzer.analyze_file(&path).unwrap();
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn test_suppression_attribute() {
    let outcome = default_analyzer()
        .analyze_file(&fixture_script("suppressed"))
        .unwrap();

    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].rule_id.as_deref(), Some("ls"));
    assert_eq!(outcome.suppressed.len(), 1);
    assert_eq!(outcome.suppressed[0].rule_id.as_deref(), Some("gci"));
    assert!(outcome.warnings.is_empty());
}

#[test]
fn test_settings_discovered_in_working_directory() {
    let dir = fixture_dir("project");
    let resolved = resolve_settings(None, Some(&dir)).unwrap();

    assert_eq!(resolved.mode, SettingsMode::File);
    assert_eq!(resolved.source, Some(dir.join(SETTINGS_FILE_NAME)));
    assert_eq!(
        resolved.configuration.exclude_rules,
        vec!["PSAvoidTrailingWhitespace"]
    );

    let analyzer = Analyzer::new(&RuleRegistry::with_builtin_rules(), &resolved.configuration);
    let outcome = analyzer.analyze_file(&dir.join("script.ps1")).unwrap();
    let ids: Vec<_> = outcome
        .diagnostics
        .iter()
        .map(|d| d.rule_id.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(ids, vec!["gci"]);
}

#[test]
fn test_no_settings_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let resolved = resolve_settings(None, Some(dir.path())).unwrap();
    assert_eq!(resolved.mode, SettingsMode::None);
    assert_eq!(resolved.configuration, Configuration::default());
}

#[test]
fn test_explicit_settings_path_relative_to_working_directory() {
    let dir = fixture_dir("project");
    let resolved = resolve_settings(
        Some(SettingsInput::from(SETTINGS_FILE_NAME)),
        Some(&dir),
    )
    .unwrap();
    assert_eq!(resolved.mode, SettingsMode::File);
    assert_eq!(resolved.configuration.rule_arguments.len(), 1);
}

#[test]
fn test_preset_by_name() {
    let resolved = resolve_settings(Some("codeformatting".into()), None).unwrap();
    assert_eq!(resolved.mode, SettingsMode::Preset);

    let analyzer = Analyzer::new(&RuleRegistry::with_builtin_rules(), &resolved.configuration);
    let outcome = analyzer.analyze_source("gci \"name\" \n", None).unwrap();
    let names: Vec<_> = outcome
        .diagnostics
        .iter()
        .map(|d| d.rule_name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["PSAvoidTrailingWhitespace", "PSAvoidUsingDoubleQuotesForConstantString"]
    );
}

#[test]
fn test_settings_with_code_are_rejected() {
    let dir = fixture_dir("invalid_settings");
    let err = resolve_settings(None, Some(&dir)).unwrap_err();

    assert!(matches!(err, SettingsError::UnsupportedLiteral { .. }));
    let message = err.to_string();
    assert!(message.contains("line 3"), "unexpected message: {}", message);
}

#[test]
fn test_missing_settings_file() {
    let err = resolve_settings(Some("does-not-exist.psd1".into()), None).unwrap_err();
    assert!(matches!(err, SettingsError::Io { .. }));
}

/// Reports every `Write-Host` call.
struct AvoidWriteHost {
    descriptor: RuleDescriptor,
}

impl Rule for AvoidWriteHost {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn analyze(
        &self,
        ast: &ScriptAst,
        _path: Option<&Path>,
        _context: &RuleContext<'_>,
    ) -> Result<Vec<Diagnostic>, RuleError> {
        let diagnostics = ast
            .find_all(|node| {
                matches!(&node.kind, NodeKind::Command { name, .. } if name.eq_ignore_ascii_case("Write-Host"))
            })
            .into_iter()
            .map(|node| {
                Diagnostic::new(
                    &self.descriptor.name,
                    "Avoid Write-Host",
                    self.descriptor.default_severity,
                    node.extent.clone(),
                )
            })
            .collect();
        Ok(diagnostics)
    }
}

#[test]
fn test_custom_rules_replace_builtins() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("TeamRules.psm1"), "").unwrap();
    let settings = format!("@{{ CustomRulePath = @('{}') }}", dir.path().display());
    let configuration = Configuration::from_source(&settings, None).unwrap();

    let mut loader = ModuleRuleLoader::new();
    loader.register("TeamRules", || {
        let rule: Arc<dyn Rule> = Arc::new(AvoidWriteHost {
            descriptor: RuleDescriptor::custom(
                "TeamRules",
                "AvoidWriteHost",
                "Avoid Write-Host",
                "Write-Host bypasses the pipeline.",
                Severity::Warning,
            ),
        });
        vec![rule]
    });

    let mut registry = RuleRegistry::with_builtin_rules();
    let warnings = registry.load_custom_rules(&configuration, &loader);
    assert!(warnings.is_empty());

    let analyzer = Analyzer::new(&registry, &configuration);
    let outcome = analyzer.analyze_source("gci\nWrite-Host 'hi'\n", None).unwrap();
    let names: Vec<_> = outcome
        .diagnostics
        .iter()
        .map(|d| d.rule_name.as_str())
        .collect();
    assert_eq!(names, vec!["AvoidWriteHost"]);
}
