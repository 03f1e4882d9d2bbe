use pslint_parser::ast::Extent;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Information,
    Warning,
    Error,
    ParseError,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Information,
        Severity::Warning,
        Severity::Error,
        Severity::ParseError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Information => "Information",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::ParseError => "ParseError",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown severity '{0}' (expected Information, Warning, Error or ParseError)")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|severity| severity.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSeverity(s.to_string()))
    }
}

/// A proposed replacement for one source extent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correction {
    /// Region to replace
    pub extent: Extent,
    /// Text that replaces the region
    pub replacement: String,
    /// Human-readable summary of the edit
    pub description: String,
}

impl Correction {
    pub fn new(extent: Extent, replacement: &str, description: &str) -> Self {
        Self {
            extent,
            replacement: replacement.to_string(),
            description: description.to_string(),
        }
    }

    /// The file this correction applies to, if known.
    pub fn file(&self) -> Option<&Path> {
        self.extent.file.as_deref()
    }
}

/// A rule violation found in one script
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub rule_name: String,
    pub message: String,
    pub severity: Severity,
    pub extent: Extent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_path: Option<PathBuf>,
    /// Distinguishes findings of one rule; matched by suppression ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Proposed edits in preference order. Only the first is ever applied.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub corrections: Vec<Correction>,
}

impl Diagnostic {
    pub fn new(rule_name: &str, message: &str, severity: Severity, extent: Extent) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            message: message.to_string(),
            severity,
            script_path: extent.file.clone(),
            extent,
            rule_id: None,
            corrections: Vec::new(),
        }
    }

    pub fn with_rule_id(mut self, rule_id: &str) -> Self {
        self.rule_id = Some(rule_id.to_string());
        self
    }

    pub fn with_script_path(mut self, path: &Path) -> Self {
        self.script_path = Some(path.to_path_buf());
        self
    }

    pub fn with_correction(mut self, correction: Correction) -> Self {
        self.corrections.push(correction);
        self
    }

    pub fn line(&self) -> usize {
        self.extent.start_line()
    }

    pub fn column(&self) -> usize {
        self.extent.start_column()
    }

    pub fn has_corrections(&self) -> bool {
        !self.corrections.is_empty()
    }
}
