//! Process-backed implementations of the siroc collaborator seams.

pub mod bundler;
pub mod node;

use std::sync::Arc;

use siroc_core::config::ConfigStore;

pub use bundler::CommandBundler;
pub use node::NodeModuleLoader;

/// A config store that understands every supported config file.
pub fn config_store() -> ConfigStore {
    ConfigStore::new().with_loader(Arc::new(NodeModuleLoader::default()))
}
