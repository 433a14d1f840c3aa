//! The bundler seam: an opaque compiler driven by [`BuildConfig`] values.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::build_config::BuildConfig;

/// Where in the sources a bundler error originated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

/// Structured error returned by a bundler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundlerError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
    #[serde(default)]
    pub loc: Option<SourceLocation>,
}

impl BundlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            loc: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.loc = Some(SourceLocation {
            file: file.into(),
            line,
            column,
        });
        self
    }
}

impl fmt::Display for BundlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "[{}] ", code)?;
        }
        write!(f, "{}", self.message)?;
        if let Some(loc) = &self.loc {
            write!(f, "\nat {}:{}:{}", loc.file, loc.line, loc.column)?;
        }
        Ok(())
    }
}

impl std::error::Error for BundlerError {}

/// One file written by the bundler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFile {
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    #[serde(default)]
    pub outputs: Vec<OutputFile>,
}

impl BuildReport {
    pub fn total_size(&self) -> u64 {
        self.outputs.iter().map(|o| o.size).sum()
    }
}

/// Lifecycle events emitted while watching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A rebuild cycle started.
    Start,
    /// One config started bundling.
    BundleStart { inputs: Vec<PathBuf> },
    /// One config finished bundling.
    BundleEnd {
        report: BuildReport,
        duration_ms: u64,
    },
    /// Every config of the cycle finished.
    End,
    Error(BundlerError),
}

/// Formats a size the way build logs show it.
pub fn format_size(bytes: u64) -> String {
    if bytes > 500 {
        format!("{:.1} kB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

#[async_trait]
pub trait Bundler: Send + Sync {
    /// Compiles and writes one configuration.
    async fn build(&self, config: &BuildConfig) -> Result<BuildReport, BundlerError>;

    /// Starts watching the given configurations. The stream never ends on its own.
    fn watch(&self, configs: Vec<BuildConfig>)
        -> Result<UnboundedReceiver<WatchEvent>, BundlerError>;
}
