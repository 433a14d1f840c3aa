//! Evaluates JavaScript and TypeScript config files with Node.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use siroc_core::config::{ConfigLoader, ConfigOverrides};

/// Imports the module named by the first argument and prints its default
/// export as JSON, calling it first when it is a function.
const EVALUATE: &str = r#"
const { pathToFileURL } = await import('node:url');
const mod = await import(pathToFileURL(process.argv[1]).href);
let config = mod.default ?? mod;
if (typeof config === 'function') config = await config();
process.stdout.write(JSON.stringify(config ?? {}));
"#;

/// Loads `siroc.config.ts`, `siroc.config.js` and the legacy `package.js`.
///
/// Only the serializable part of a config survives: in-process hook
/// functions are dropped, shell-command hooks are kept.
#[derive(Debug, Clone)]
pub struct NodeModuleLoader {
    node: String,
}

impl Default for NodeModuleLoader {
    fn default() -> Self {
        Self::new("node")
    }
}

impl NodeModuleLoader {
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into() }
    }

    fn command(&self, path: &Path) -> Command {
        let mut cmd = Command::new(&self.node);
        if path.extension().is_some_and(|ext| ext == "ts") {
            cmd.args(["--experimental-strip-types", "--no-warnings"]);
        }
        cmd.args(["--input-type=module", "-e", EVALUATE]).arg(path);
        if let Some(dir) = path.parent() {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl ConfigLoader for NodeModuleLoader {
    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext == "ts" || ext == "js" || ext == "mjs" || ext == "cjs")
    }

    async fn load(&self, path: &Path) -> Option<ConfigOverrides> {
        let output = self
            .command(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;
        let output = match output {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                debug!(
                    path = %path.display(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "config evaluation failed"
                );
                return None;
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "could not start node");
                return None;
            }
        };

        serde_json::from_slice(&output.stdout)
            .map_err(|e| debug!(path = %path.display(), error = %e, "config is not usable"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_files() {
        let loader = NodeModuleLoader::default();
        assert!(loader.supports(Path::new("siroc.config.ts")));
        assert!(loader.supports(Path::new("package.js")));
        assert!(!loader.supports(Path::new("siroc.config.json")));
    }

    #[test]
    fn strips_types_for_typescript() {
        let loader = NodeModuleLoader::default();
        let cmd = loader.command(Path::new("/repo/siroc.config.ts"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[0], "--experimental-strip-types");
        assert_eq!(args.last().map(String::as_str), Some("/repo/siroc.config.ts"));
    }

    #[tokio::test]
    async fn missing_node_yields_nothing() {
        let loader = NodeModuleLoader::new("definitely-not-a-node-binary");
        assert!(loader.load(Path::new("/repo/siroc.config.js")).await.is_none());
    }
}
