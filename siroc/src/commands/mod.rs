//! Command implementations for the CLI.

mod build;
mod changelog;
mod info;
mod run;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use siroc_core::{get_workspace_packages, Git, Package, PackageOptions, Services};

pub use build::{cmd_build, cmd_dev};
pub use changelog::cmd_changelog;
pub use info::cmd_list;
pub use run::{cmd_custom, cmd_publish, cmd_run};

/// Process-level settings shared by every command.
pub struct Context {
    pub cwd: PathBuf,
    pub suffix: String,
    pub node_env: Option<String>,
}

impl Context {
    fn services(&self) -> Services {
        Services::new(
            Arc::new(Git::new(&self.cwd)),
            Arc::new(siroc_adapters::config_store()),
        )
    }

    /// The package nearest to `--cwd`.
    pub async fn root_package(&self) -> Result<Package> {
        let mut options = PackageOptions::new(&self.cwd).with_suffix(self.suffix.clone());
        options.build_options.node_env = self.node_env.clone();
        Package::load(options, self.services())
            .await
            .context("Couldn't load package")
    }

    /// Workspace packages of `root`, limited to `names` unless empty.
    pub async fn workspace_packages(&self, root: &Package, names: &[String]) -> Vec<Package> {
        let filter = (!names.is_empty()).then_some(names);
        get_workspace_packages(root, filter).await
    }
}
