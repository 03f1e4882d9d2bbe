//! Static analysis for PowerShell scripts.
//!
//! Settings are read from `.psd1` literal files without executing them
//! ([`settings`]), the rules they activate run over a parsed script with
//! per-rule failure isolation ([`linter`]), and the corrections attached to
//! the resulting diagnostics can be merged back into the source ([`fix`]).
//!
//! ```
//! use pslint::{Analyzer, Configuration, RuleRegistry};
//!
//! let registry = RuleRegistry::with_builtin_rules();
//! let analyzer = Analyzer::new(&registry, &Configuration::default());
//! let outcome = analyzer.analyze_source("gci | % { $_.Name }", None).unwrap();
//!
//! let fixed = pslint::fix::apply_corrections("gci | % { $_.Name }", &outcome.diagnostics, None);
//! assert_eq!(fixed.text, "Get-ChildItem | ForEach-Object { $_.Name }");
//! ```

pub mod fix;
pub mod linter;
pub mod literal;
pub mod plugin;
pub mod registry;
#[cfg(feature = "cli")]
pub mod reporter;
pub mod rules;
pub mod settings;

pub use pslint_common::parser;

pub use fix::{CorrectionOutcome, SkipReason, SkippedCorrection, apply_corrections, apply_fixes};
pub use linter::{
    AnalysisOutcome, AnalysisWarning, Linter, RuleProfile, WarningKind, run_analysis,
};
pub use pslint_common::{
    CancellationToken, Correction, Diagnostic, Extent, LiteralValue, NameMap, Rule,
    RuleDescriptor, RuleError, Severity, SourceType,
};
pub use registry::RuleRegistry;
#[cfg(feature = "cli")]
pub use reporter::{OutputFormat, Reporter};
pub use settings::{
    Configuration, ResolvedSettings, SettingsError, SettingsInput, SettingsMode,
    SettingsResolver, resolve_settings,
};

use parser::error::ParseError;
use parser::{DefaultParser, ScriptParser};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a script could not be analyzed
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", display_path(path.as_deref()))]
    ParserFailure {
        path: Option<PathBuf>,
        #[source]
        source: ParseError,
    },
}

fn display_path(path: Option<&Path>) -> String {
    path.map_or_else(|| "<input>".to_string(), |p| p.display().to_string())
}

/// Parses scripts and runs one configured set of rules over them.
pub struct Analyzer {
    linter: Linter,
    setup_warnings: Vec<AnalysisWarning>,
    parser: Box<dyn ScriptParser>,
}

impl Analyzer {
    pub fn new(registry: &RuleRegistry, configuration: &Configuration) -> Self {
        Self::with_cancellation(registry, configuration, CancellationToken::new())
    }

    pub fn with_cancellation(
        registry: &RuleRegistry,
        configuration: &Configuration,
        cancellation: CancellationToken,
    ) -> Self {
        let (linter, setup_warnings) =
            Linter::from_registry(registry, configuration, cancellation);
        Self {
            linter,
            setup_warnings,
            parser: Box::new(DefaultParser),
        }
    }

    /// Replace the parser used by [`analyze_source`](Self::analyze_source).
    pub fn with_parser(mut self, parser: impl ScriptParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn linter(&self) -> &Linter {
        &self.linter
    }

    /// Problems found while selecting rules (unknown rules or arguments).
    ///
    /// Reported once per analyzer, not per file.
    pub fn setup_warnings(&self) -> &[AnalysisWarning] {
        &self.setup_warnings
    }

    fn parse(&self, source: &str, path: Option<&Path>) -> Result<parser::ParseOutput, AnalysisError> {
        let mut output = self.parser.parse(source, path);
        if output.errors.is_empty() {
            return Ok(output);
        }
        Err(AnalysisError::ParserFailure {
            path: path.map(Path::to_path_buf),
            source: output.errors.swap_remove(0),
        })
    }

    pub fn analyze_source(
        &self,
        source: &str,
        path: Option<&Path>,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let output = self.parse(source, path)?;
        Ok(self.linter.lint_and_suppress(&output.ast, path))
    }

    /// Like [`analyze_source`](Self::analyze_source), running rules
    /// sequentially and timing each one.
    pub fn analyze_source_with_profile(
        &self,
        source: &str,
        path: Option<&Path>,
    ) -> Result<(AnalysisOutcome, Vec<RuleProfile>), AnalysisError> {
        let output = self.parse(source, path)?;
        let (lint_output, profiles) = self.linter.lint_with_profile(&output.ast, path);
        Ok((self.linter.suppress(&output.ast, path, lint_output), profiles))
    }

    pub fn analyze_file(&self, path: &Path) -> Result<AnalysisOutcome, AnalysisError> {
        let source = read_script(path)?;
        self.analyze_source(&source, Some(path))
    }

    /// Analyze several files in parallel. Results keep the input order.
    pub fn analyze_files(
        &self,
        paths: &[PathBuf],
    ) -> Vec<(PathBuf, Result<AnalysisOutcome, AnalysisError>)> {
        paths
            .par_iter()
            .map(|path| (path.clone(), self.analyze_file(path)))
            .collect()
    }
}

fn read_script(path: &Path) -> Result<String, AnalysisError> {
    std::fs::read_to_string(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })
}
