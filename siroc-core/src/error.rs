//! Error types and result aliases.

use std::path::PathBuf;

use thiserror::Error;

use crate::bundler::BundlerError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error in {context}: {error}")]
    Json {
        error: serde_json::Error,
        context: String,
    },

    #[error("Could not locate a package.json in {} or its parent directories.", root.display())]
    ManifestNotFound { root: PathBuf },

    #[error("Invalid package.json at {}: {message}", path.display())]
    InvalidManifest { path: PathBuf, message: String },

    #[error(
        "Incomplete build override: `input`, `output` and `format` must be given together (missing: {missing})"
    )]
    PartialOverride { missing: String },

    #[error("Plugin `{plugin}` is misconfigured: {message}")]
    Plugin { plugin: String, message: String },

    #[error("Invalid external pattern `{pattern}`: {message}")]
    InvalidExternal { pattern: String, message: String },

    #[error(transparent)]
    Bundler(#[from] BundlerError),

    #[error("Invalid workspace pattern `{pattern}`: {message}")]
    Glob { pattern: String, message: String },

    #[error("Invalid version {version}: {message}")]
    Version { version: String, message: String },

    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("Watcher error for {package}: {message}")]
    Watch { package: String, message: String },

    #[error("Task failed for {package}: {message}")]
    Package { package: String, message: String },
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            error,
            context: "package.json".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
