//! Named settings files shipped with pslint.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the presets directory.
pub const PRESETS_DIR_ENV: &str = "PSLINT_PRESETS_DIR";

/// Enumerates `*.psd1` files in a settings directory. A preset's name is the
/// file stem, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetStore {
    dir: PathBuf,
}

impl PresetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory named by `PSLINT_PRESETS_DIR`, or the bundled `presets/`.
    pub fn from_env() -> Self {
        match std::env::var_os(PRESETS_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::new(dir),
            _ => Self::bundled(),
        }
    }

    pub fn bundled() -> Self {
        Self::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("presets"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entries(&self) -> Vec<(String, PathBuf)> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "presets directory not readable");
                return Vec::new();
            }
        };

        let mut presets: Vec<(String, PathBuf)> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("psd1"))
            })
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?.to_string();
                Some((stem, path))
            })
            .collect();
        presets.sort_by_key(|(name, _)| name.to_lowercase());
        presets
    }

    /// Preset names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries().into_iter().map(|(name, _)| name).collect()
    }

    /// The file backing the preset `name`.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.entries()
            .into_iter()
            .find(|(stem, _)| stem.eq_ignore_ascii_case(name))
            .map(|(_, path)| path)
    }
}

impl Default for PresetStore {
    fn default() -> Self {
        Self::from_env()
    }
}
