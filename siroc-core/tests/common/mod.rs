#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use siroc_core::build_config::BuildConfig;
use siroc_core::bundler::{BuildReport, Bundler, BundlerError, OutputFile, WatchEvent};
use siroc_core::config::{ConfigStore, PackageOptions};
use siroc_core::package::{Package, Services};
use siroc_core::vcs::{LogEntry, VersionControl};

#[derive(Debug, Default)]
pub struct FakeVcs {
    pub commit: String,
    pub entries: Vec<LogEntry>,
}

impl FakeVcs {
    pub fn new(commit: &str) -> Self {
        Self {
            commit: commit.to_string(),
            entries: Vec::new(),
        }
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn short_commit(&self) -> String {
        self.commit.clone()
    }

    async fn branch(&self) -> String {
        "main".to_string()
    }

    async fn last_tag(&self) -> Option<String> {
        Some("v1.0.0".to_string())
    }

    async fn log(&self, _from: Option<&str>, _to: &str) -> Vec<LogEntry> {
        self.entries.clone()
    }
}

/// Records every config it is asked to build and fails for inputs under `failing`.
#[derive(Default)]
pub struct FakeBundler {
    pub built: Mutex<Vec<BuildConfig>>,
    pub failing: Vec<PathBuf>,
    watchers: Mutex<Vec<UnboundedSender<WatchEvent>>>,
}

impl FakeBundler {
    pub fn failing_under(dir: &Path) -> Self {
        Self {
            failing: vec![dir.to_path_buf()],
            ..Self::default()
        }
    }

    pub fn built_inputs(&self) -> Vec<PathBuf> {
        self.built.lock().unwrap().iter().map(|c| c.input.clone()).collect()
    }
}

#[async_trait]
impl Bundler for FakeBundler {
    async fn build(&self, config: &BuildConfig) -> Result<BuildReport, BundlerError> {
        if self.failing.iter().any(|dir| config.input.starts_with(dir)) {
            return Err(BundlerError::new("Unexpected token")
                .with_code("PARSE_ERROR")
                .with_location(config.input.display().to_string(), 1, 5));
        }
        self.built.lock().unwrap().push(config.clone());

        let mut outputs = Vec::new();
        for output in &config.output {
            if let Some(path) = output.entry_path() {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).unwrap();
                }
                fs::write(&path, "module.exports = {}\n").unwrap();
                outputs.push(OutputFile {
                    file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
                    size: 21,
                    path,
                });
            }
        }
        Ok(BuildReport { outputs })
    }

    fn watch(&self, configs: Vec<BuildConfig>) -> Result<UnboundedReceiver<WatchEvent>, BundlerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(WatchEvent::Start);
        for config in configs {
            let _ = tx.send(WatchEvent::BundleStart {
                inputs: vec![config.input.clone()],
            });
        }
        let _ = tx.send(WatchEvent::End);
        self.watchers.lock().unwrap().push(tx);
        Ok(rx)
    }
}

pub fn services(commit: &str) -> Services {
    Services::new(Arc::new(FakeVcs::new(commit)), Arc::new(ConfigStore::new()))
}

pub fn write_manifest(dir: &Path, manifest: Value) {
    fs::create_dir_all(dir).unwrap();
    let text = serde_json::to_string_pretty(&manifest).unwrap();
    fs::write(dir.join("package.json"), text + "\n").unwrap();
}

pub fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

pub fn read_manifest(dir: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(dir.join("package.json")).unwrap()).unwrap()
}

pub async fn load(dir: &Path) -> Package {
    load_with(PackageOptions::new(dir)).await
}

pub async fn load_with(options: PackageOptions) -> Package {
    Package::load(options, services("abc1234")).await.unwrap()
}
