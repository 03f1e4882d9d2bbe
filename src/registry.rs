//! Rule registry and active-set selection.

use crate::linter::{AnalysisWarning, WarningKind};
use crate::plugin::RuleLoader;
use crate::settings::Configuration;
use glob::{MatchOptions, Pattern};
use pslint_common::{Rule, RuleDescriptor, Severity, SourceType};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// All rules known to this process, builtin and custom.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::new();
        for rule in crate::rules::builtin_rules() {
            registry.register(rule);
        }
        registry
    }

    /// Add a rule. A rule whose full name is already registered is ignored.
    pub fn register(&mut self, rule: Arc<dyn Rule>) -> bool {
        let name = rule.descriptor().full_name();
        if self
            .rules
            .iter()
            .any(|r| r.descriptor().full_name().eq_ignore_ascii_case(&name))
        {
            warn!("Rule '{}' is already registered", name);
            return false;
        }
        self.rules.push(rule);
        true
    }

    /// Load custom rules from the configuration's `CustomRulePath` entries.
    ///
    /// Load failures are returned as warnings.
    pub fn load_custom_rules(
        &mut self,
        config: &Configuration,
        loader: &dyn RuleLoader,
    ) -> Vec<AnalysisWarning> {
        let mut warnings = Vec::new();
        for path in &config.custom_rule_paths {
            match loader.load(Path::new(path), config.recurse_custom_rule_path) {
                Ok(loaded) => {
                    for failure in loaded.failures {
                        warnings.push(AnalysisWarning::new(
                            WarningKind::CustomRuleLoad,
                            failure.to_string(),
                        ));
                    }
                    for rule in loaded.rules {
                        self.register(rule);
                    }
                }
                Err(e) => {
                    warn!("Failed to load custom rules from {}: {}", path, e);
                    warnings.push(AnalysisWarning::new(WarningKind::CustomRuleLoad, e.to_string()));
                }
            }
        }
        warnings
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look a rule up by simple or namespaced name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.iter().find(|r| r.descriptor().matches_name(name))
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &RuleDescriptor> {
        self.rules.iter().map(|r| r.descriptor())
    }

    /// The rules a configuration activates, in registration order.
    pub fn select(&self, config: &Configuration) -> Selection {
        let mut warnings = Vec::new();

        let severities = parse_severities(&config.severities, &mut warnings);
        let all_builtins = config.include_default_rules || config.custom_rule_paths.is_empty();

        let mut active = Vec::new();
        for rule in &self.rules {
            let descriptor = rule.descriptor();

            let candidate = match descriptor.source_type {
                SourceType::Builtin => {
                    all_builtins || matches_any(descriptor, &config.include_rules)
                }
                SourceType::Custom => true,
            };
            if !candidate {
                continue;
            }
            if !config.include_rules.is_empty() && !matches_any(descriptor, &config.include_rules) {
                continue;
            }
            if matches_any(descriptor, &config.exclude_rules) {
                debug!(rule = %descriptor.name, "excluded by settings");
                continue;
            }
            if !severities.is_empty() && !severities.contains(&descriptor.default_severity) {
                continue;
            }
            if !is_enabled(descriptor, config, &mut warnings) {
                debug!(rule = %descriptor.name, "disabled by Enable = $false");
                continue;
            }

            check_argument_keys(descriptor, config, &mut warnings);
            active.push(Arc::clone(rule));
        }

        for name in config.rule_arguments.keys() {
            if self.get(name).is_none() {
                warnings.push(
                    AnalysisWarning::new(
                        WarningKind::UnknownRule,
                        format!("Settings configure arguments for unknown rule '{}'", name),
                    )
                    .with_rule(name),
                );
            }
        }

        debug!(active = active.len(), registered = self.rules.len(), "rules selected");
        Selection {
            rules: active,
            warnings,
        }
    }
}

/// The active rules for one configuration, with the problems found while
/// selecting them.
#[derive(Clone, Default)]
pub struct Selection {
    pub rules: Vec<Arc<dyn Rule>>,
    pub warnings: Vec<AnalysisWarning>,
}

impl Selection {
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.descriptor().matches_name(name))
    }
}

/// Whether `pattern` names the rule. Patterns may use `*`, `?` and `[...]`.
pub fn rule_matches(descriptor: &RuleDescriptor, pattern: &str) -> bool {
    if !pattern.contains(['*', '?', '[']) {
        return descriptor.matches_name(pattern);
    }
    let Ok(glob) = Pattern::new(pattern) else {
        return descriptor.matches_name(pattern);
    };
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    glob.matches_with(&descriptor.name, options)
        || glob.matches_with(&descriptor.full_name(), options)
}

fn matches_any(descriptor: &RuleDescriptor, patterns: &[String]) -> bool {
    patterns.iter().any(|p| rule_matches(descriptor, p))
}

fn parse_severities(values: &[String], warnings: &mut Vec<AnalysisWarning>) -> Vec<Severity> {
    let mut severities = Vec::new();
    for value in values {
        match value.parse::<Severity>() {
            Ok(severity) => severities.push(severity),
            Err(e) => warnings.push(AnalysisWarning::new(WarningKind::InvalidSetting, e.to_string())),
        }
    }
    severities
}

fn is_enabled(
    descriptor: &RuleDescriptor,
    config: &Configuration,
    warnings: &mut Vec<AnalysisWarning>,
) -> bool {
    let Some(args) = arguments_for(descriptor, config) else {
        return true;
    };
    match args.get("Enable") {
        None => true,
        Some(value) => match value.as_bool() {
            Some(enabled) => enabled,
            None => {
                warnings.push(
                    AnalysisWarning::new(
                        WarningKind::InvalidArgument,
                        format!(
                            "Argument 'Enable' of rule '{}' must be a boolean, found {}",
                            descriptor.name,
                            value.type_name()
                        ),
                    )
                    .with_rule(&descriptor.name),
                );
                true
            }
        },
    }
}

fn check_argument_keys(
    descriptor: &RuleDescriptor,
    config: &Configuration,
    warnings: &mut Vec<AnalysisWarning>,
) {
    let Some(args) = arguments_for(descriptor, config) else {
        return;
    };
    for key in args.keys() {
        if !descriptor.accepts_argument(key) {
            warnings.push(
                AnalysisWarning::new(
                    WarningKind::UnknownArgument,
                    format!("Rule '{}' has no argument '{}'", descriptor.name, key),
                )
                .with_rule(&descriptor.name),
            );
        }
    }
}

fn arguments_for<'a>(
    descriptor: &RuleDescriptor,
    config: &'a Configuration,
) -> Option<&'a pslint_common::NameMap<pslint_common::LiteralValue>> {
    config
        .rule_arguments
        .iter()
        .find(|(name, _)| descriptor.matches_name(name))
        .map(|(_, args)| args)
}
