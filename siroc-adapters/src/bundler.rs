//! A bundler that lives in another process.
//!
//! Each build spawns the configured command, writes one [`BuildConfig`] as
//! JSON to its stdin and reads a single JSON object from its stdout: either
//! `{"report": {...}}` or `{"error": {"code", "message", "loc"}}`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace, warn};

use siroc_core::build_config::BuildConfig;
use siroc_core::bundler::{BuildReport, Bundler, BundlerError, WatchEvent};

const DEFAULT_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Deserialize)]
struct BundlerResponse {
    #[serde(default)]
    report: Option<BuildReport>,
    #[serde(default)]
    error: Option<BundlerError>,
}

#[derive(Debug, Clone)]
pub struct CommandBundler {
    program: String,
    args: Vec<String>,
    debounce: Duration,
}

impl CommandBundler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }

    /// Splits a command line such as `node scripts/bundle.mjs` on whitespace.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).with_args(parts.map(str::to_string)))
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, config: &BuildConfig) -> Result<BuildReport, BundlerError> {
        let request = serde_json::to_vec(config)
            .map_err(|e| BundlerError::new(format!("Failed to encode build config: {}", e)))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BundlerError::new(format!("Failed to start `{}`: {}", self.program, e))
                    .with_code("SPAWN_FAILED")
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&request).await.map_err(|e| {
                BundlerError::new(format!("Failed to send build config: {}", e))
            })?;
        }

        let output = child.wait_with_output().await.map_err(|e| {
            BundlerError::new(format!("Failed to wait for `{}`: {}", self.program, e))
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        trace!(program = %self.program, stderr = %stderr.trim(), "bundler finished");

        match serde_json::from_str::<BundlerResponse>(stdout.trim()) {
            Ok(BundlerResponse {
                error: Some(error), ..
            }) => Err(error),
            Ok(BundlerResponse {
                report: Some(report),
                ..
            }) if output.status.success() => Ok(report),
            _ if !output.status.success() => Err(BundlerError::new(format!(
                "`{}` exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ))
            .with_code("BUNDLER_EXIT")),
            Ok(_) => Err(BundlerError::new("Bundler response has neither a report nor an error")
                .with_code("BAD_RESPONSE")),
            Err(e) => Err(BundlerError::new(format!("Unreadable bundler response: {}", e))
                .with_code("BAD_RESPONSE")),
        }
    }

    /// Builds every config once, reporting progress on `events`.
    ///
    /// Returns false once nobody is listening any more.
    async fn cycle(&self, configs: &[BuildConfig], events: &UnboundedSender<WatchEvent>) -> bool {
        if events.send(WatchEvent::Start).is_err() {
            return false;
        }
        for config in configs {
            let _ = events.send(WatchEvent::BundleStart {
                inputs: vec![config.input.clone()],
            });
            let started = Instant::now();
            let event = match self.run(config).await {
                Ok(report) => WatchEvent::BundleEnd {
                    report,
                    duration_ms: started.elapsed().as_millis() as u64,
                },
                Err(e) => WatchEvent::Error(e),
            };
            if events.send(event).is_err() {
                return false;
            }
        }
        events.send(WatchEvent::End).is_ok()
    }
}

#[async_trait]
impl Bundler for CommandBundler {
    async fn build(&self, config: &BuildConfig) -> Result<BuildReport, BundlerError> {
        debug!(program = %self.program, input = %config.input.display(), "bundling");
        self.run(config).await
    }

    fn watch(&self, configs: Vec<BuildConfig>) -> Result<UnboundedReceiver<WatchEvent>, BundlerError> {
        let (changes_tx, mut changes) = mpsc::unbounded_channel::<Event>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = changes_tx.send(event);
                }
                Err(e) => warn!("watch error: {}", e),
            },
            NotifyConfig::default(),
        )
        .map_err(|e| BundlerError::new(format!("Failed to create watcher: {}", e)))?;

        for dir in source_dirs(&configs) {
            watcher
                .watch(&dir, RecursiveMode::Recursive)
                .map_err(|e| {
                    BundlerError::new(format!("Failed to watch {}: {}", dir.display(), e))
                })?;
        }

        let (events_tx, events) = mpsc::unbounded_channel();
        let bundler = self.clone();
        tokio::spawn(async move {
            let _watcher = watcher;
            if !bundler.cycle(&configs, &events_tx).await {
                return;
            }
            while let Some(event) = changes.recv().await {
                if !is_relevant(&event) {
                    continue;
                }
                // Collapse bursts of writes into one rebuild.
                while let Ok(Some(_)) = tokio::time::timeout(bundler.debounce, changes.recv()).await {}
                if !bundler.cycle(&configs, &events_tx).await {
                    break;
                }
            }
        });

        Ok(events)
    }
}

/// Directories holding the inputs of `configs`, without nested duplicates.
fn source_dirs(configs: &[BuildConfig]) -> Vec<PathBuf> {
    let dirs: BTreeSet<PathBuf> = configs
        .iter()
        .filter_map(|config| config.input.parent().map(|p| p.to_path_buf()))
        .collect();
    let mut out: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        if !out.iter().any(|kept| dir.starts_with(kept)) {
            out.push(dir);
        }
    }
    out
}

fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_lines() {
        let bundler = CommandBundler::from_command_line("node scripts/bundle.mjs --quiet").unwrap();
        assert_eq!(bundler.program(), "node");
        assert_eq!(bundler.args, vec!["scripts/bundle.mjs", "--quiet"]);
        assert!(CommandBundler::from_command_line("   ").is_none());
    }
}
