//! The package model: one publishable unit and its manifest.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{debug, info, warn};

use crate::config::{ConfigStore, PackageOptions};
use crate::entrypoint::{self, strip_source_extension};
use crate::error::{Error, Result};
use crate::exec::{exec, exec_async, ExecOutput};
use crate::hooks::HookPayload;
use crate::manifest::{Bin, Manifest, ManifestField, PersonDetails, MANIFEST_FILE};
use crate::vcs::{Git, VersionControl};
use crate::version::derive_version;

/// Collaborators shared by every package of a run.
#[derive(Clone)]
pub struct Services {
    pub vcs: Arc<dyn VersionControl>,
    pub config_store: Arc<ConfigStore>,
}

impl Services {
    pub fn new(vcs: Arc<dyn VersionControl>, config_store: Arc<ConfigStore>) -> Self {
        Self { vcs, config_store }
    }

    /// `git` in `cwd` and a JSON-only config store.
    pub fn git(cwd: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(Git::new(cwd)), Arc::new(ConfigStore::new()))
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("config_store", &self.config_store)
            .finish_non_exhaustive()
    }
}

/// A declared executable and the source it is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    /// Absolute path of the built script.
    pub path: PathBuf,
    /// The path as written in the manifest.
    pub declared: String,
    pub entrypoint: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Package {
    options: PackageOptions,
    manifest: Manifest,
    services: Services,
}

impl Package {
    /// Loads the package whose manifest is nearest to `options.root_dir`, then
    /// applies the first config file found in its root.
    ///
    /// Fails when no manifest is found or it lacks a name or version.
    pub async fn load(mut options: PackageOptions, services: Services) -> Result<Self> {
        let (root_dir, manifest) = Manifest::locate(&options.root_dir)?;
        manifest.ensure_identity(&root_dir.join(MANIFEST_FILE))?;
        options.root_dir = root_dir;

        let overrides = services.config_store.load(&options.root_dir).await;
        options.merge(overrides);

        debug!(package = %manifest.name, root = %options.root_dir.display(), "loaded package");
        Ok(Self {
            options,
            manifest,
            services,
        })
    }

    /// Loads a package in a directory relative to this one, with default options.
    pub async fn load_relative(&self, relative: impl AsRef<Path>) -> Result<Self> {
        let options = PackageOptions::new(self.resolve_path(relative));
        Self::load(options, self.services.clone()).await
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn root_dir(&self) -> &Path {
        &self.options.root_dir
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    pub fn options(&self) -> &PackageOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut PackageOptions {
        &mut self.options
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.options.root_dir.join(path)
    }

    /// The package name with the configured suffix removed.
    pub fn unsuffixed_name(&self) -> String {
        if self.options.suffix.is_empty() {
            self.manifest.name.clone()
        } else {
            self.manifest.name.replacen(&self.options.suffix, "", 1)
        }
    }

    /// The unsuffixed name without its scope, used for default file names.
    pub fn base_name(&self) -> String {
        let name = self.unsuffixed_name();
        name.rsplit('/').next().unwrap_or(&name).to_string()
    }

    /// Source file for the primary output (`main`, else `module`, else `browser`).
    pub fn entrypoint(&self) -> Option<PathBuf> {
        let declared = self
            .manifest
            .main
            .as_deref()
            .or(self.manifest.module.as_deref())
            .or(self.manifest.browser_path())?;
        entrypoint::resolve(self.root_dir(), Some(declared))
    }

    /// Declared binaries, one per distinct built path.
    pub fn binaries(&self) -> Vec<Binary> {
        let Some(bin) = &self.manifest.bin else {
            return Vec::new();
        };
        let mut seen = IndexSet::new();
        bin.paths()
            .into_iter()
            .filter_map(|declared| {
                let path = self.resolve_path(declared);
                seen.insert(path.clone()).then(|| Binary {
                    entrypoint: entrypoint::resolve(self.root_dir(), Some(declared)),
                    declared: declared.to_string(),
                    path,
                })
            })
            .collect()
    }

    /// Additional export targets, excluding the primary outputs and directory patterns.
    pub fn exports(&self) -> Vec<String> {
        let Some(exports) = &self.manifest.exports else {
            return Vec::new();
        };
        let primary: Vec<String> = [
            self.manifest.main.as_deref(),
            self.manifest.module.as_deref(),
            self.manifest.browser_path(),
        ]
        .into_iter()
        .flatten()
        .flat_map(|path| [path.to_string(), format!("./{}", path)])
        .collect();

        exports
            .targets()
            .into_iter()
            .filter(|target| !primary.iter().any(|p| p == target))
            .filter(|target| !target.ends_with('.') && !target.ends_with('/'))
            .map(str::to_string)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// Author followed by contributors, parsed into structured form.
    pub fn contributors(&self) -> Vec<PersonDetails> {
        self.manifest
            .author
            .iter()
            .chain(self.manifest.contributors.iter().flatten())
            .map(|person| person.details())
            .collect()
    }

    /// Applies the configured suffix and stamps a build version.
    ///
    /// The suffix is only appended when the name does not already contain it.
    /// Linked dependencies are renamed to their suffixed names, keeping their
    /// range, and a single `bin` script is exposed under both names.
    pub async fn suffix_and_version(&mut self) -> Result<()> {
        let suffix = self.options.suffix.clone();
        let commit = self.services.vcs.short_commit().await;
        let version = derive_version(&self.manifest.version, &commit)?;
        info!(package = %self.name(), "Adding suffix {}", suffix);

        let old_name = self.manifest.name.clone();
        if !old_name.contains(&suffix) {
            self.manifest.name.push_str(&suffix);
        }

        if let Some(deps) = self.manifest.dependencies.as_mut() {
            for old in &self.options.linked_dependencies {
                let new = format!("{}{}", old, suffix);
                if &new == old {
                    continue;
                }
                let Some((index, _, range)) = deps.shift_remove_full(old) else {
                    continue;
                };
                if let Some(existing) = deps.get_mut(&new) {
                    *existing = range;
                } else {
                    deps.shift_insert(index, new, range);
                }
            }
        }

        if let Some(Bin::Single(script)) = &self.manifest.bin {
            let mut map = indexmap::IndexMap::new();
            map.insert(old_name, script.clone());
            map.insert(self.manifest.name.clone(), script.clone());
            self.manifest.bin = Some(Bin::Map(map));
        }

        self.manifest.version = version;
        Ok(())
    }

    /// Pins linked dependencies to the versions their manifests currently declare.
    pub fn sync_linked_dependencies(&mut self) {
        let suffix = self.options.suffix.clone();
        for linked in self.options.linked_dependencies.clone() {
            let name = format!("{}{}", linked, suffix);
            let Some(sibling) = self.find_sibling_manifest(&linked, &name) else {
                debug!(package = %self.name(), dependency = %name, "linked package not found");
                continue;
            };
            if sibling.version.is_empty() {
                continue;
            }
            let Some(current) = self
                .manifest
                .dependencies
                .as_mut()
                .and_then(|deps| deps.get_mut(&name))
            else {
                continue;
            };
            *current = if current.starts_with('^') {
                format!("^{}", sibling.version)
            } else {
                sibling.version.clone()
            };
        }
    }

    fn find_sibling_manifest(&self, unsuffixed: &str, suffixed: &str) -> Option<Manifest> {
        let node_modules = self.resolve_path("node_modules");
        [
            self.options.sibling_roots.get(suffixed).cloned(),
            self.options.sibling_roots.get(unsuffixed).cloned(),
            Some(node_modules.join(suffixed)),
            Some(node_modules.join(unsuffixed)),
        ]
        .into_iter()
        .flatten()
        .find_map(|dir| Manifest::try_read(&dir))
    }

    /// Canonical key order, plus sorted dependencies when configured.
    pub fn auto_fix(&mut self) -> Result<()> {
        self.manifest.sort_keys()?;
        if self.options.sort_dependencies {
            self.sort_dependencies();
        }
        Ok(())
    }

    pub fn sort_dependencies(&mut self) {
        self.manifest.sort_dependencies();
    }

    pub fn copy_fields_from(&mut self, source: &Package, fields: &[ManifestField]) {
        for field in fields {
            self.manifest.copy_field(&source.manifest, *field);
        }
    }

    /// Copies files or directories from another package, defaulting to its `files` list.
    pub async fn copy_files_from(&self, source: &Package, files: Option<&[String]>) -> Result<()> {
        let files: Vec<String> = match files {
            Some(files) => files.to_vec(),
            None => source.manifest.files.clone().unwrap_or_default(),
        };
        for file in files {
            copy_recursive(&source.resolve_path(&file), &self.resolve_path(&file)).await?;
        }
        Ok(())
    }

    pub async fn write_package(&self) -> Result<()> {
        debug!(package = %self.name(), "Writing {}", self.resolve_path("package.json").display());
        self.manifest.write_async(self.root_dir()).await
    }

    /// Removes the directories that hold built binaries and `main`.
    ///
    /// Directories containing `src` and the package root itself are kept.
    pub async fn remove_build_folders(&self) -> Result<()> {
        let mut dirs = IndexSet::new();
        let outputs = self
            .binaries()
            .into_iter()
            .map(|b| b.path)
            .chain(self.manifest.main.as_deref().map(|main| self.resolve_path(main)));
        for output in outputs {
            if let Some(dir) = output.parent() {
                dirs.insert(dir.to_path_buf());
            }
        }

        for dir in dirs {
            let Ok(relative) = dir.strip_prefix(self.root_dir()) else {
                continue;
            };
            let outside = relative.components().any(|c| c == Component::ParentDir);
            if outside
                || relative.as_os_str().is_empty()
                || relative.to_string_lossy().contains("src")
            {
                continue;
            }
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => debug!(package = %self.name(), "Removed {}", dir.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Writes placeholder outputs that re-export the sources.
    pub async fn create_stubs(&self) -> Result<()> {
        self.create_binary_stubs().await?;
        for path in [
            self.manifest.main.as_deref(),
            self.manifest.module.as_deref(),
            self.manifest.types.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            self.create_stub(path).await?;
        }
        Ok(())
    }

    async fn create_stub(&self, path: &str) -> Result<()> {
        if !self.options.build {
            return Ok(());
        }
        let Some(entrypoint) = self.entrypoint() else {
            return Ok(());
        };
        let out_file = self.resolve_path(path);
        let out_dir = out_file.parent().unwrap_or(self.root_dir()).to_path_buf();
        tokio::fs::create_dir_all(&out_dir).await?;
        let relative = import_path(&out_dir, &entrypoint);
        tokio::fs::write(
            &out_file,
            format!("export * from './{}'", strip_source_extension(&relative)),
        )
        .await?;
        Ok(())
    }

    async fn create_binary_stubs(&self) -> Result<()> {
        for binary in self.binaries() {
            let Some(entrypoint) = &binary.entrypoint else {
                continue;
            };
            let out_dir = binary.path.parent().unwrap_or(self.root_dir()).to_path_buf();
            tokio::fs::create_dir_all(&out_dir).await?;
            let relative = import_path(&out_dir, entrypoint);
            tokio::fs::write(
                &binary.path,
                format!(
                    "#!/usr/bin/env node\nconst jiti = require('jiti')(__filename)\nmodule.exports = jiti('./{}')",
                    strip_source_extension(&relative)
                ),
            )
            .await?;
        }
        self.set_binary_permissions().await
    }

    /// Marks every existing binary output as executable.
    pub async fn set_binary_permissions(&self) -> Result<()> {
        for binary in self.binaries() {
            if !binary.path.is_file() {
                warn!(package = %self.name(), "Binary {} does not exist", binary.path.display());
                continue;
            }
            make_executable(&binary.path).await?;
        }
        Ok(())
    }

    /// Runs a command in the package root.
    pub fn exec(&self, command: &str, silent: bool) -> ExecOutput {
        exec(self.root_dir(), command, silent)
    }

    pub fn publish(&self, tag: &str) -> Result<ExecOutput> {
        info!(
            package = %self.name(),
            "publishing {}@{} with tag {}",
            self.name(),
            self.manifest.version,
            tag
        );
        let command = format!("npm publish --tag {}", tag);
        let out = self.exec(&command, false);
        if out.success {
            Ok(out)
        } else {
            Err(Error::Command {
                command,
                message: out.stderr,
            })
        }
    }

    /// Dispatches a hook to registered handlers, then to configured shell commands.
    ///
    /// Returns how many handlers or commands failed. Failures are only logged.
    pub async fn call_hook(&self, payload: &mut HookPayload<'_>) -> usize {
        let name = payload.name();
        let mut failures = self.options.hooks.dispatch(self, payload);

        if let Some(commands) = self.options.shell_hooks.get(name.as_str()) {
            for command in commands.commands() {
                let out = exec_async(self.root_dir(), command, true).await;
                if !out.success {
                    failures += 1;
                    warn!(
                        package = %self.name(),
                        hook = %name,
                        "Couldn't run hook for {}: {}",
                        self.name(),
                        out.stderr
                    );
                }
            }
        }
        failures
    }
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Module specifier for `target` as seen from files in `from`, with `/` separators.
fn import_path(from: &Path, target: &Path) -> String {
    let relative = pathdiff::diff_paths(target, from).unwrap_or_else(|| target.to_path_buf());
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

async fn copy_recursive(src: &Path, dst: &Path) -> Result<()> {
    let mut pending = vec![(src.to_path_buf(), dst.to_path_buf())];
    while let Some((src, dst)) = pending.pop() {
        if tokio::fs::metadata(&src).await?.is_dir() {
            tokio::fs::create_dir_all(&dst).await?;
            let mut entries = tokio::fs::read_dir(&src).await?;
            while let Some(entry) = entries.next_entry().await? {
                pending.push((entry.path(), dst.join(entry.file_name())));
            }
        } else {
            if let Some(parent) = dst.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&src, &dst).await?;
        }
    }
    Ok(())
}
