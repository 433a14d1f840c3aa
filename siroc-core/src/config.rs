//! Per-package options and the config-file lookup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::build_config::BuildOptions;
use crate::hooks::{CommandList, Hooks};

/// Config files looked up in the package root, in priority order.
/// `package.js` is the legacy name.
pub const CONFIG_FILES: [&str; 4] = [
    "siroc.config.ts",
    "siroc.config.js",
    "siroc.config.json",
    "package.js",
];

/// Fields a config file may set. Every field is optional and replaces the
/// corresponding default wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    pub build: Option<bool>,
    pub suffix: Option<String>,
    pub linked_dependencies: Option<Vec<String>>,
    pub sort_dependencies: Option<bool>,
    pub rollup: Option<BuildOptions>,
    pub hooks: Option<IndexMap<String, CommandList>>,
    pub commands: Option<IndexMap<String, String>>,
}

/// Options governing one package.
#[derive(Debug, Clone)]
pub struct PackageOptions {
    pub root_dir: PathBuf,
    /// Whether `build` bundles this package.
    pub build: bool,
    pub suffix: String,
    pub hooks: Hooks,
    pub shell_hooks: IndexMap<String, CommandList>,
    pub linked_dependencies: Vec<String>,
    pub sort_dependencies: bool,
    pub build_options: BuildOptions,
    pub commands: IndexMap<String, String>,
    /// Root directories of workspace siblings, by unsuffixed name.
    pub sibling_roots: IndexMap<String, PathBuf>,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            build: true,
            suffix: String::new(),
            hooks: Hooks::new(),
            shell_hooks: IndexMap::new(),
            linked_dependencies: Vec::new(),
            sort_dependencies: false,
            build_options: BuildOptions::default(),
            commands: IndexMap::new(),
            sibling_roots: IndexMap::new(),
        }
    }
}

impl PackageOptions {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_linked_dependencies(mut self, linked: Vec<String>) -> Self {
        self.linked_dependencies = linked;
        self
    }

    pub fn with_build_options(mut self, options: BuildOptions) -> Self {
        self.build_options = options;
        self
    }

    /// Options for another package, inheriting everything but the root.
    pub fn for_root(&self, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..self.clone()
        }
    }

    /// Applies config-file overrides, field by field.
    pub fn merge(&mut self, overrides: ConfigOverrides) {
        if let Some(build) = overrides.build {
            self.build = build;
        }
        if let Some(suffix) = overrides.suffix {
            self.suffix = suffix;
        }
        if let Some(linked) = overrides.linked_dependencies {
            self.linked_dependencies = linked;
        }
        if let Some(sort) = overrides.sort_dependencies {
            self.sort_dependencies = sort;
        }
        if let Some(rollup) = overrides.rollup {
            self.build_options = BuildOptions {
                node_env: rollup.node_env.or_else(|| self.build_options.node_env.take()),
                ..rollup
            };
        }
        if let Some(hooks) = overrides.hooks {
            self.shell_hooks = hooks;
        }
        if let Some(commands) = overrides.commands {
            self.commands = commands;
        }
    }
}

/// One strategy for obtaining overrides from a config file.
///
/// Loaders never fail past their own boundary: anything that goes wrong
/// while evaluating a candidate yields `None`.
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    fn supports(&self, path: &Path) -> bool;
    async fn load(&self, path: &Path) -> Option<ConfigOverrides>;
}

/// Reads `siroc.config.json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLoader;

#[async_trait]
impl ConfigLoader for JsonLoader {
    fn supports(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "json")
    }

    async fn load(&self, path: &Path) -> Option<ConfigOverrides> {
        let content = tokio::fs::read_to_string(path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(overrides) => Some(overrides),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring unreadable config");
                None
            }
        }
    }
}

/// Chain of loaders tried against each candidate file in turn.
#[derive(Clone)]
pub struct ConfigStore {
    loaders: Vec<Arc<dyn ConfigLoader>>,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("loaders", &self.loaders.len())
            .finish()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    /// A store that only understands JSON config files.
    pub fn new() -> Self {
        Self {
            loaders: vec![Arc::new(JsonLoader)],
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn ConfigLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Overrides from the first candidate file that evaluates, or empty ones.
    pub async fn load(&self, root_dir: &Path) -> ConfigOverrides {
        for file in CONFIG_FILES {
            let path = root_dir.join(file);
            if !path.is_file() {
                continue;
            }
            for loader in self.loaders.iter().filter(|loader| loader.supports(&path)) {
                if let Some(overrides) = loader.load(&path).await {
                    debug!(path = %path.display(), "loaded config");
                    return overrides;
                }
            }
        }
        ConfigOverrides::default()
    }
}
