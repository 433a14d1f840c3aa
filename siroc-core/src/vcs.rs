//! Read-only access to version control.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::exec::exec_async;

/// One line of `git log`, split into its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub message: String,
    pub commit: String,
    pub author_name: String,
    pub author_email: String,
}

/// Version-control queries. Failures surface as empty results.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn short_commit(&self) -> String;
    async fn branch(&self) -> String;
    async fn last_tag(&self) -> Option<String>;
    /// Commits reachable from `to` but not from `from` (all of `to` if `from` is `None`).
    async fn log(&self, from: Option<&str>, to: &str) -> Vec<LogEntry>;
}

/// [`VersionControl`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct Git {
    cwd: PathBuf,
}

impl Git {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    async fn run(&self, args: &str) -> String {
        let out = exec_async(&self.cwd, &format!("git {}", args), true).await;
        if out.success {
            out.stdout
        } else {
            String::new()
        }
    }
}

#[async_trait]
impl VersionControl for Git {
    async fn short_commit(&self) -> String {
        self.run("rev-parse --short HEAD").await
    }

    async fn branch(&self) -> String {
        self.run("rev-parse --abbrev-ref HEAD").await
    }

    async fn last_tag(&self) -> Option<String> {
        self.run("--no-pager tag -l --sort=taggerdate")
            .await
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(str::to_string)
    }

    async fn log(&self, from: Option<&str>, to: &str) -> Vec<LogEntry> {
        let range = match from {
            Some(from) => format!("{}...{}", from, to),
            None => to.to_string(),
        };
        let output = self
            .run(&format!("--no-pager log {} --pretty=%s|%h|%an|%ae", range))
            .await;
        parse_log(&output)
    }
}

/// Parses `subject|hash|author|email` lines. The subject may itself contain `|`.
pub fn parse_log(output: &str) -> Vec<LogEntry> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut fields = line.rsplitn(4, '|');
            let author_email = fields.next()?;
            let author_name = fields.next()?;
            let commit = fields.next()?;
            let message = fields.next()?;
            Some(LogEntry {
                message: message.to_string(),
                commit: commit.to_string(),
                author_name: author_name.to_string(),
                author_email: author_email.to_string(),
            })
        })
        .collect()
}
