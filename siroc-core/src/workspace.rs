//! Workspace member discovery.

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::manifest::MANIFEST_FILE;
use crate::package::Package;
use crate::parallel::run_in_parallel;

/// Expands one workspace pattern into the directories it names.
pub fn expand_pattern(root_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    if pattern.is_empty() || pattern == "." {
        return Ok(vec![root_dir.to_path_buf()]);
    }
    let full = root_dir.join(pattern).to_string_lossy().into_owned();

    let paths = glob::glob(&full).map_err(|e| Error::Glob {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    Ok(paths
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_dir())
        .collect())
}

/// Resolves the packages of `root`'s workspace, or just `root` when none are declared.
///
/// Members without a manifest, members that fail to load and members not in
/// `names` are left out; nothing here fails the whole resolution. Every
/// returned package knows where its siblings live.
pub async fn get_workspace_packages(root: &Package, names: Option<&[String]>) -> Vec<Package> {
    let mut patterns = root.manifest().workspace_patterns();
    if patterns.is_empty() {
        patterns.push(".".to_string());
    }

    let mut dirs: IndexSet<PathBuf> = IndexSet::new();
    for pattern in &patterns {
        match expand_pattern(root.root_dir(), pattern) {
            Ok(found) => dirs.extend(found),
            Err(e) => warn!(package = %root.name(), "{}", e),
        }
    }

    let results = run_in_parallel(dirs, |dir| async move {
        if !dir.join(MANIFEST_FILE).is_file() {
            return Err(Error::Package {
                package: dir.display().to_string(),
                message: "Not a package directory.".to_string(),
            });
        }
        let options = root.options().for_root(&dir);
        Package::load(options, root.services().clone()).await
    })
    .await;

    let mut packages: Vec<Package> = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(package) => packages.push(package),
            Err(e) => debug!("skipping workspace member: {}", e),
        }
    }

    let siblings: IndexMap<String, PathBuf> = packages
        .iter()
        .map(|p| (p.name().to_string(), p.root_dir().to_path_buf()))
        .collect();

    packages
        .into_iter()
        .filter(|p| names.map_or(true, |names| names.iter().any(|n| n == p.name())))
        .map(|mut p| {
            p.options_mut().sibling_roots = siblings.clone();
            p
        })
        .collect()
}
