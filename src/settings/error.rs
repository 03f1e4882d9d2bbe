//! Settings error types

use crate::literal::UnsupportedLiteral;
use pslint_common::parser::error::ParseError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort settings resolution. No partial configuration is
/// produced when one of these is returned.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{}{source}", location(.path))]
    UnsupportedLiteral {
        path: Option<PathBuf>,
        #[source]
        source: UnsupportedLiteral,
    },

    #[error("No hashtable literal found in settings file '{}'", .path.display())]
    NoConfigurationLiteral { path: PathBuf },

    #[error("Setting '{key}' must be a {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{}", rule_arguments_message(.rule, .found))]
    InvalidRuleArguments {
        /// The rule whose arguments are mis-shaped, or `None` for the `Rules` value itself
        rule: Option<String>,
        found: &'static str,
    },

    #[error("Setting '{key}' must be a string or an array of strings, found {found}")]
    InvalidValueShape { key: String, found: &'static str },

    #[error(
        "Unknown setting '{key}' (expected one of Severity, IncludeRules, ExcludeRules, \
         CustomRulePath, IncludeDefaultRules, RecurseCustomRulePath, Rules)"
    )]
    UnknownSetting { key: String },

    #[error("Failed to read settings file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file '{}': {source}", .path.display())]
    ParserFailure {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

impl SettingsError {
    pub fn unsupported_literal(path: Option<&Path>, source: UnsupportedLiteral) -> Self {
        Self::UnsupportedLiteral {
            path: path.map(Path::to_path_buf),
            source,
        }
    }

    pub fn no_configuration_literal(path: impl Into<PathBuf>) -> Self {
        Self::NoConfigurationLiteral { path: path.into() }
    }

    pub fn type_mismatch(key: &str, expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            key: key.to_string(),
            expected,
            found,
        }
    }

    pub fn invalid_rule_arguments(rule: Option<&str>, found: &'static str) -> Self {
        Self::InvalidRuleArguments {
            rule: rule.map(str::to_string),
            found,
        }
    }

    pub fn invalid_value_shape(key: &str, found: &'static str) -> Self {
        Self::InvalidValueShape {
            key: key.to_string(),
            found,
        }
    }

    pub fn unknown_setting(key: &str) -> Self {
        Self::UnknownSetting {
            key: key.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parser_failure(path: impl Into<PathBuf>, source: ParseError) -> Self {
        Self::ParserFailure {
            path: path.into(),
            source,
        }
    }
}

fn location(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!("{}: ", path.display()),
        None => String::new(),
    }
}

fn rule_arguments_message(rule: &Option<String>, found: &str) -> String {
    match rule {
        Some(rule) => format!(
            "Arguments for rule '{}' must be a hashtable, found {}",
            rule, found
        ),
        None => format!(
            "Setting 'Rules' must be a hashtable of rule names to argument hashtables, found {}",
            found
        ),
    }
}
