//! Custom rule module loader
//!
//! Discovers module files under a custom rule path and instantiates their
//! rules from factories registered by module name.

use super::error::PluginError;
use pslint_common::{NameMap, Rule};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// File extensions recognized as rule modules.
pub const MODULE_EXTENSIONS: &[&str] = &["psm1", "psd1", "dll"];

/// Rules found under one custom rule path.
#[derive(Default)]
pub struct LoadedRules {
    pub rules: Vec<Arc<dyn Rule>>,
    /// Modules that could not be loaded; the remaining ones still are.
    pub failures: Vec<PluginError>,
}

/// Discovers custom rules.
pub trait RuleLoader: Send + Sync {
    /// Load the rules provided by `path`, a module file or a directory of
    /// modules. An `Err` means nothing could be loaded from `path` at all.
    fn load(&self, path: &Path, recurse: bool) -> Result<LoadedRules, PluginError>;
}

/// Builds the rules of one module.
pub type RuleFactory = Box<dyn Fn() -> Vec<Arc<dyn Rule>> + Send + Sync>;

/// Loader resolving module files to registered rule factories.
///
/// A module named `Team.Rules` is served by the factory registered under
/// that name, whichever of `Team.Rules.psm1`, `Team.Rules.psd1` or
/// `Team.Rules.dll` is found.
#[derive(Default)]
pub struct ModuleRuleLoader {
    factories: NameMap<RuleFactory>,
}

impl ModuleRuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for `module`, replacing any previous one.
    pub fn register<F>(&mut self, module: &str, factory: F)
    where
        F: Fn() -> Vec<Arc<dyn Rule>> + Send + Sync + 'static,
    {
        self.factories.insert(module, Box::new(factory));
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.factories.keys()
    }

    /// Load a single module file
    pub fn load_module(&self, path: &Path) -> Result<Vec<Arc<dyn Rule>>, PluginError> {
        if !is_module_file(path) {
            return Err(PluginError::invalid_module_file(path));
        }
        let module = module_name(path);
        let factory = self
            .factories
            .get(&module)
            .ok_or_else(|| PluginError::unknown_module(path, &module))?;

        let rules = factory();
        if rules.is_empty() {
            return Err(PluginError::empty_module(path, module));
        }
        debug!(module = %module, count = rules.len(), "loaded custom rules");
        Ok(rules)
    }
}

impl RuleLoader for ModuleRuleLoader {
    fn load(&self, path: &Path, recurse: bool) -> Result<LoadedRules, PluginError> {
        if !path.exists() {
            return Err(PluginError::path_not_found(path));
        }

        if path.is_file() {
            return self.load_module(path).map(|rules| LoadedRules {
                rules,
                failures: Vec::new(),
            });
        }

        let mut files = Vec::new();
        collect_module_files(path, recurse, &mut files)?;

        let mut loaded = LoadedRules::default();
        let mut seen_modules: Vec<String> = Vec::new();
        for file in files {
            // Foo.psd1 and Foo.psm1 describe the same module
            let module = module_name(&file);
            if seen_modules.iter().any(|m| m.eq_ignore_ascii_case(&module)) {
                continue;
            }
            seen_modules.push(module);

            match self.load_module(&file) {
                Ok(rules) => loaded.rules.extend(rules),
                Err(e) => {
                    warn!("Failed to load custom rules from {}: {}", file.display(), e);
                    loaded.failures.push(e);
                }
            }
        }
        Ok(loaded)
    }
}

fn is_module_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MODULE_EXTENSIONS.iter().any(|m| m.eq_ignore_ascii_case(ext)))
}

fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Module files under `dir`, sorted, descending into subdirectories when `recurse` is set.
fn collect_module_files(
    dir: &Path,
    recurse: bool,
    files: &mut Vec<PathBuf>,
) -> Result<(), PluginError> {
    let entries = fs::read_dir(dir).map_err(|e| PluginError::io_error(dir, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PluginError::io_error(dir, e))?;
        paths.push(entry.path());
    }
    paths.sort();

    let mut subdirs = Vec::new();
    for path in paths {
        if path.is_dir() {
            subdirs.push(path);
        } else if is_module_file(&path) {
            files.push(path);
        }
    }

    if recurse {
        for subdir in subdirs {
            collect_module_files(&subdir, recurse, files)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::FixedRule;
    use pslint_common::{Diagnostic, RuleDescriptor, Severity};
    use tempfile::tempdir;

    fn team_rules() -> Vec<Arc<dyn Rule>> {
        let descriptor =
            RuleDescriptor::custom("Team", "Measure-Thing", "Thing", "test", Severity::Warning);
        vec![Arc::new(FixedRule::new(descriptor, Vec::<Diagnostic>::new()))]
    }

    fn loader() -> ModuleRuleLoader {
        let mut loader = ModuleRuleLoader::new();
        loader.register("Team", team_rules);
        loader
    }

    #[test]
    fn test_load_nonexistent_path() {
        let result = loader().load(Path::new("/nonexistent/rules"), false);
        assert!(matches!(result, Err(PluginError::PathNotFound { .. })));
    }

    #[test]
    fn test_load_module_file() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("Team.psm1");
        fs::write(&module, "").unwrap();

        let loaded = loader().load(&module, false).unwrap();
        assert_eq!(loaded.rules.len(), 1);
        assert_eq!(loaded.rules[0].descriptor().full_name(), "Team\\Measure-Thing");
    }

    #[test]
    fn test_invalid_module_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Team.txt");
        fs::write(&file, "").unwrap();

        let result = loader().load(&file, false);
        assert!(matches!(result, Err(PluginError::InvalidModuleFile { .. })));
    }

    #[test]
    fn test_directory_reports_unknown_modules() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Team.psd1"), "").unwrap();
        fs::write(dir.path().join("Team.psm1"), "").unwrap();
        fs::write(dir.path().join("Other.psm1"), "").unwrap();
        fs::write(dir.path().join("readme.md"), "").unwrap();

        let loaded = loader().load(dir.path(), false).unwrap();
        assert_eq!(loaded.rules.len(), 1, "Team is loaded once");
        assert_eq!(loaded.failures.len(), 1);
        assert!(matches!(
            &loaded.failures[0],
            PluginError::UnknownModule { module, .. } if module == "Other"
        ));
    }

    #[test]
    fn test_recursion() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("team.psm1"), "").unwrap();

        assert!(loader().load(dir.path(), false).unwrap().rules.is_empty());
        assert_eq!(loader().load(dir.path(), true).unwrap().rules.len(), 1);
    }

    #[test]
    fn test_empty_module() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("Nothing.psm1");
        fs::write(&module, "").unwrap();

        let mut loader = ModuleRuleLoader::new();
        loader.register("Nothing", Vec::new);
        assert!(matches!(
            loader.load(&module, false),
            Err(PluginError::EmptyModule { .. })
        ));
    }
}
