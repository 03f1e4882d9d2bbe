use crate::context::RuleContext;
use crate::diagnostic::{Diagnostic, Severity};
use pslint_parser::ast::ScriptAst;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Where a rule comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceType {
    Builtin,
    Custom,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Builtin => write!(f, "Builtin"),
            SourceType::Custom => write!(f, "Custom"),
        }
    }
}

/// Static information about a rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleDescriptor {
    pub name: String,
    pub common_name: String,
    pub description: String,
    pub source_type: SourceType,
    pub default_severity: Severity,
    /// Argument keys the rule understands. `Enable` is always accepted.
    pub argument_schema: Vec<String>,
    /// Module a custom rule was loaded from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl RuleDescriptor {
    pub fn builtin(
        name: &str,
        common_name: &str,
        description: &str,
        default_severity: Severity,
    ) -> Self {
        Self {
            name: name.to_string(),
            common_name: common_name.to_string(),
            description: description.to_string(),
            source_type: SourceType::Builtin,
            default_severity,
            argument_schema: Vec::new(),
            module: None,
        }
    }

    pub fn custom(
        module: &str,
        name: &str,
        common_name: &str,
        description: &str,
        default_severity: Severity,
    ) -> Self {
        Self {
            source_type: SourceType::Custom,
            module: Some(module.to_string()),
            ..Self::builtin(name, common_name, description, default_severity)
        }
    }

    pub fn with_arguments(mut self, keys: &[&str]) -> Self {
        self.argument_schema = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// `Module\Name` for custom rules, the plain name otherwise.
    pub fn full_name(&self) -> String {
        match &self.module {
            Some(module) => format!("{}\\{}", module, self.name),
            None => self.name.clone(),
        }
    }

    /// Case-insensitive match against the simple or namespaced name.
    pub fn matches_name(&self, name: &str) -> bool {
        names_match(&self.full_name(), name)
    }

    pub fn accepts_argument(&self, key: &str) -> bool {
        key.eq_ignore_ascii_case("Enable")
            || self
                .argument_schema
                .iter()
                .any(|k| k.eq_ignore_ascii_case(key))
    }
}

/// Whether two rule names refer to the same rule.
///
/// Comparison is case-insensitive. A namespaced name (`Module\Rule`) also
/// matches its simple form.
pub fn names_match(a: &str, b: &str) -> bool {
    if a.eq_ignore_ascii_case(b) {
        return true;
    }
    let (a_module, a_name) = split_name(a);
    let (b_module, b_name) = split_name(b);
    if !a_name.eq_ignore_ascii_case(b_name) {
        return false;
    }
    match (a_module, b_module) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => true,
    }
}

fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('\\') {
        Some((module, rule)) => (Some(module), rule),
        None => (None, name),
    }
}

/// Failure reported by a rule instead of diagnostics
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid value for argument '{key}': {message}")]
    InvalidArgument { key: String, message: String },

    #[error("{0}")]
    Failed(String),
}

impl RuleError {
    pub fn invalid_argument(key: &str, message: impl Into<String>) -> Self {
        RuleError::InvalidArgument {
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        RuleError::Failed(message.into())
    }
}

/// An analysis rule
pub trait Rule: Send + Sync {
    fn descriptor(&self) -> &RuleDescriptor;

    /// Analyze one script.
    fn analyze(
        &self,
        ast: &ScriptAst,
        path: Option<&Path>,
        context: &RuleContext<'_>,
    ) -> Result<Vec<Diagnostic>, RuleError>;

    /// Whether the rule may run concurrently with other rules on the same script.
    ///
    /// Rules that do not opt in are run one at a time.
    fn is_reentrant(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        &self.descriptor().name
    }
}
