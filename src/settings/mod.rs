//! Settings resolution.
//!
//! Settings are PowerShell data files (`.psd1`) holding one hashtable
//! literal. [`resolve_settings`] picks the source that applies and turns it
//! into a [`Configuration`]:
//!
//! 1. an explicit hashtable ([`SettingsInput::Map`]) is used as is;
//! 2. an explicit string naming a preset loads that preset's file;
//! 3. any other explicit string is a path to a settings file;
//! 4. without explicit input, `PSScriptAnalyzerSettings.psd1` is looked up in
//!    the working directory;
//! 5. otherwise the built-in defaults apply.
//!
//! Settings files are never executed; see [`crate::literal`].

mod error;
mod preset;

pub use error::SettingsError;
pub use preset::{PRESETS_DIR_ENV, PresetStore};

use crate::literal::evaluate;
use pslint_common::parser::parse_source;
use pslint_common::{LiteralValue, NameMap};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File picked up from the working directory when no settings are given.
pub const SETTINGS_FILE_NAME: &str = "PSScriptAnalyzerSettings.psd1";

/// Commented settings file written by `pslint settings init`.
pub const DEFAULT_SETTINGS_TEMPLATE: &str = r#"# pslint settings
#
# This file is read as data: only literals (strings, numbers, $true/$false,
# @() arrays and @{} hashtables) are allowed.
@{
    # Only report findings with these severities.
    # Information, Warning, Error, ParseError
    Severity = @('Error', 'Warning')

    # Run only these rules. Wildcards are allowed.
    IncludeRules = @()

    # Never run these rules. Wildcards are allowed.
    ExcludeRules = @()

    # Directories or modules providing custom rules.
    # CustomRulePath = @('.\rules')
    # RecurseCustomRulePath = $true
    # IncludeDefaultRules = $true

    # Per-rule arguments.
    Rules = @{
        PSAvoidUsingCmdletAliases = @{
            AllowList = @()
        }
        PSAvoidTrailingWhitespace = @{
            Enable = $true
        }
    }
}
"#;

/// Where the configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SettingsMode {
    /// Built-in defaults
    None,
    /// Looking for the implicit settings file; resolves to `File` or `None`
    Auto,
    File,
    Hashtable,
    Preset,
}

impl std::fmt::Display for SettingsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SettingsMode::None => "None",
            SettingsMode::Auto => "Auto",
            SettingsMode::File => "File",
            SettingsMode::Hashtable => "Hashtable",
            SettingsMode::Preset => "Preset",
        };
        f.write_str(name)
    }
}

/// Settings passed explicitly by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsInput {
    /// An already evaluated settings hashtable
    Map(NameMap<LiteralValue>),
    /// A preset name or a path to a settings file
    Text(String),
}

impl From<NameMap<LiteralValue>> for SettingsInput {
    fn from(map: NameMap<LiteralValue>) -> Self {
        SettingsInput::Map(map)
    }
}

impl From<&str> for SettingsInput {
    fn from(text: &str) -> Self {
        SettingsInput::Text(text.to_string())
    }
}

impl From<String> for SettingsInput {
    fn from(text: String) -> Self {
        SettingsInput::Text(text)
    }
}

impl From<&Path> for SettingsInput {
    fn from(path: &Path) -> Self {
        SettingsInput::Text(path.display().to_string())
    }
}

/// Normalized analysis settings. Built once per run, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Configuration {
    pub severities: Vec<String>,
    pub include_rules: Vec<String>,
    pub exclude_rules: Vec<String>,
    pub custom_rule_paths: Vec<String>,
    pub recurse_custom_rule_path: bool,
    pub include_default_rules: bool,
    /// Rule name to that rule's arguments
    pub rule_arguments: NameMap<NameMap<LiteralValue>>,
}

type BooleanSetter = fn(&mut Configuration, bool);

const BOOLEAN_SETTINGS: &[(&str, BooleanSetter)] = &[
    ("IncludeDefaultRules", set_include_default_rules),
    ("RecurseCustomRulePath", set_recurse_custom_rule_path),
];

fn set_include_default_rules(config: &mut Configuration, value: bool) {
    config.include_default_rules = value;
}

fn set_recurse_custom_rule_path(config: &mut Configuration, value: bool) {
    config.recurse_custom_rule_path = value;
}

impl Configuration {
    /// Build a configuration from an evaluated settings hashtable.
    pub fn from_map(map: &NameMap<LiteralValue>) -> Result<Self, SettingsError> {
        let mut config = Configuration::default();

        for (key, value) in map.iter() {
            if let Some((_, set)) = BOOLEAN_SETTINGS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(key))
            {
                let flag = value
                    .as_bool()
                    .ok_or_else(|| SettingsError::type_mismatch(key, "boolean", value.type_name()))?;
                set(&mut config, flag);
                continue;
            }

            match key.to_ascii_lowercase().as_str() {
                "severity" => {
                    config.severities = string_set(key, value, false)?;
                }
                "includerules" => {
                    config.include_rules = string_set(key, value, false)?;
                }
                "excluderules" => {
                    config.exclude_rules = string_set(key, value, false)?;
                }
                "customrulepath" => {
                    config.custom_rule_paths = string_set(key, value, true)?;
                }
                "rules" => {
                    config.rule_arguments = rule_arguments(value)?;
                }
                _ => return Err(SettingsError::unknown_setting(key)),
            }
        }

        Ok(config)
    }

    /// Parse settings file content.
    ///
    /// `path` is used in error messages and to resolve relative
    /// `CustomRulePath` entries against the file's directory.
    pub fn from_source(source: &str, path: Option<&Path>) -> Result<Self, SettingsError> {
        let label = path.unwrap_or(Path::new("<settings>"));
        let ast = parse_source(source, path)
            .map_err(|e| SettingsError::parser_failure(label, e))?;
        let table = ast
            .first_hashtable()
            .ok_or_else(|| SettingsError::no_configuration_literal(label))?;
        let value = evaluate(table).map_err(|e| SettingsError::unsupported_literal(path, e))?;

        let mut config = match &value {
            LiteralValue::Map(map) => Self::from_map(map)?,
            other => {
                return Err(SettingsError::type_mismatch(
                    "<root>",
                    "hashtable",
                    other.type_name(),
                ));
            }
        };

        if let Some(dir) = path.and_then(Path::parent) {
            config.resolve_custom_rule_paths(dir);
        }
        Ok(config)
    }

    /// Read and parse a settings file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let source = fs::read_to_string(path).map_err(|e| SettingsError::io(path, e))?;
        Self::from_source(&source, Some(path))
    }

    fn resolve_custom_rule_paths(&mut self, base: &Path) {
        for entry in &mut self.custom_rule_paths {
            let path = Path::new(entry.as_str());
            if path.is_relative() && !base.as_os_str().is_empty() {
                *entry = base.join(path).display().to_string();
            }
        }
    }

    /// Render as a settings file. Only non-default settings are written.
    pub fn to_settings_text(&self) -> String {
        let mut map = NameMap::new();
        let list = |items: &[String]| {
            LiteralValue::Array(items.iter().map(|s| LiteralValue::from(s.as_str())).collect())
        };
        if !self.severities.is_empty() {
            map.insert("Severity", list(&self.severities));
        }
        if !self.include_rules.is_empty() {
            map.insert("IncludeRules", list(&self.include_rules));
        }
        if !self.exclude_rules.is_empty() {
            map.insert("ExcludeRules", list(&self.exclude_rules));
        }
        if !self.custom_rule_paths.is_empty() {
            map.insert("CustomRulePath", list(&self.custom_rule_paths));
        }
        if self.include_default_rules {
            map.insert("IncludeDefaultRules", LiteralValue::Bool(true));
        }
        if self.recurse_custom_rule_path {
            map.insert("RecurseCustomRulePath", LiteralValue::Bool(true));
        }
        if !self.rule_arguments.is_empty() {
            let rules = self
                .rule_arguments
                .iter()
                .map(|(name, args)| (name, LiteralValue::Map(args.clone())))
                .collect();
            map.insert("Rules", LiteralValue::Map(rules));
        }
        let mut text = LiteralValue::Map(map).to_literal_text();
        text.push('\n');
        text
    }
}

/// A string or string array, deduplicated in first-seen order.
fn string_set(
    key: &str,
    value: &LiteralValue,
    case_sensitive: bool,
) -> Result<Vec<String>, SettingsError> {
    let items = value
        .as_string_list()
        .ok_or_else(|| SettingsError::invalid_value_shape(key, value.type_name()))?;

    let mut set: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let seen = set.iter().any(|s| {
            if case_sensitive {
                *s == item
            } else {
                s.eq_ignore_ascii_case(&item)
            }
        });
        if !seen {
            set.push(item);
        }
    }
    Ok(set)
}

fn rule_arguments(
    value: &LiteralValue,
) -> Result<NameMap<NameMap<LiteralValue>>, SettingsError> {
    let rules = value
        .as_map()
        .ok_or_else(|| SettingsError::invalid_rule_arguments(None, value.type_name()))?;

    let mut arguments = NameMap::new();
    for (rule, args) in rules.iter() {
        let args = args
            .as_map()
            .ok_or_else(|| SettingsError::invalid_rule_arguments(Some(rule), args.type_name()))?;
        arguments.insert(rule, args.clone());
    }
    Ok(arguments)
}

/// The outcome of settings resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSettings {
    pub mode: SettingsMode,
    /// The settings file read, for `File` and `Preset`
    pub source: Option<PathBuf>,
    pub configuration: Configuration,
}

impl ResolvedSettings {
    fn defaults() -> Self {
        Self {
            mode: SettingsMode::None,
            source: None,
            configuration: Configuration::default(),
        }
    }
}

/// Resolves settings against a preset directory.
#[derive(Debug, Clone, Default)]
pub struct SettingsResolver {
    presets: PresetStore,
}

impl SettingsResolver {
    pub fn new(presets: PresetStore) -> Self {
        Self { presets }
    }

    pub fn presets(&self) -> &PresetStore {
        &self.presets
    }

    /// Any non-empty text is a preset name or a settings path, even if it
    /// is only whitespace. Empty text and `None` fall back to discovery in
    /// `working_directory`.
    pub fn resolve(
        &self,
        input: Option<SettingsInput>,
        working_directory: Option<&Path>,
    ) -> Result<ResolvedSettings, SettingsError> {
        match input {
            Some(SettingsInput::Map(map)) => {
                debug!("settings: explicit hashtable");
                Ok(ResolvedSettings {
                    mode: SettingsMode::Hashtable,
                    source: None,
                    configuration: Configuration::from_map(&map)?,
                })
            }
            Some(SettingsInput::Text(text)) if !text.is_empty() => {
                if let Some(path) = self.presets.find(&text) {
                    debug!(preset = %text, path = %path.display(), "settings: preset");
                    return load(SettingsMode::Preset, path);
                }
                let path = resolve_settings_path(&text, working_directory);
                debug!(path = %path.display(), "settings: explicit file");
                load(SettingsMode::File, path)
            }
            _ => self.resolve_auto(working_directory),
        }
    }

    fn resolve_auto(&self, working_directory: Option<&Path>) -> Result<ResolvedSettings, SettingsError> {
        let Some(dir) = working_directory else {
            debug!("settings: defaults");
            return Ok(ResolvedSettings::defaults());
        };

        let candidate = dir.join(SETTINGS_FILE_NAME);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "settings: found in working directory");
            load(SettingsMode::File, candidate)
        } else {
            debug!(dir = %dir.display(), "settings: no settings file in working directory, using defaults");
            Ok(ResolvedSettings::defaults())
        }
    }
}

fn load(mode: SettingsMode, path: PathBuf) -> Result<ResolvedSettings, SettingsError> {
    let configuration = Configuration::from_file(&path)?;
    Ok(ResolvedSettings {
        mode,
        source: Some(path),
        configuration,
    })
}

/// Best-effort resolution of a settings path: relative to the working
/// directory, wildcards expanded to their first match. Falls back to the
/// text itself.
fn resolve_settings_path(text: &str, working_directory: Option<&Path>) -> PathBuf {
    let literal = PathBuf::from(text);
    let joined = match working_directory {
        Some(dir) if literal.is_relative() => dir.join(&literal),
        _ => literal.clone(),
    };
    if joined.exists() {
        return joined;
    }

    if text.contains(['*', '?', '[']) {
        let pattern = joined.display().to_string();
        if let Ok(paths) = glob::glob(&pattern) {
            let mut matches: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
            matches.sort();
            if let Some(first) = matches.into_iter().next() {
                return first;
            }
        }
    }

    literal
}

/// Resolve settings using the default preset directory.
pub fn resolve_settings(
    input: Option<SettingsInput>,
    working_directory: Option<&Path>,
) -> Result<ResolvedSettings, SettingsError> {
    SettingsResolver::default().resolve(input, working_directory)
}
