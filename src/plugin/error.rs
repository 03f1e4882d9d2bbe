//! Custom rule loading errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when discovering or loading custom rule modules
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Failed to read custom rule path '{path}': {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Custom rule path not found: {path}")]
    PathNotFound { path: PathBuf },

    #[error("Invalid module file '{path}': expected a .psm1, .psd1 or .dll file")]
    InvalidModuleFile { path: PathBuf },

    #[error("No rule factory registered for module '{module}' ('{path}')")]
    UnknownModule { path: PathBuf, module: String },

    #[error("Module '{module}' ('{path}') provides no rules")]
    EmptyModule { path: PathBuf, module: String },
}

impl PluginError {
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }

    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    pub fn invalid_module_file(path: impl Into<PathBuf>) -> Self {
        Self::InvalidModuleFile { path: path.into() }
    }

    pub fn unknown_module(path: impl Into<PathBuf>, module: impl Into<String>) -> Self {
        Self::UnknownModule {
            path: path.into(),
            module: module.into(),
        }
    }

    pub fn empty_module(path: impl Into<PathBuf>, module: impl Into<String>) -> Self {
        Self::EmptyModule {
            path: path.into(),
            module: module.into(),
        }
    }

    /// The file or directory the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::IoError { path, .. }
            | Self::PathNotFound { path }
            | Self::InvalidModuleFile { path }
            | Self::UnknownModule { path, .. }
            | Self::EmptyModule { path, .. } => path,
        }
    }
}
