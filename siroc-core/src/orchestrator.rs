//! The three-phase workspace build.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexSet;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::build_config::{synthesize, BuildConfig, BuildOptions};
use crate::bundler::{format_size, BuildReport, Bundler, BundlerError, WatchEvent};
use crate::error::{Error, Result};
use crate::hooks::HookPayload;
use crate::package::Package;
use crate::parallel::run_in_parallel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildFlags {
    pub watch: bool,
    pub dev: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Build,
    Finalize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Prepare => "prepare",
            Phase::Build => "build",
            Phase::Finalize => "finalize",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Built(Vec<BuildReport>),
    /// Building is disabled for the package.
    Skipped,
    Watching,
    Failed { phase: Phase, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutcome {
    pub package: String,
    pub outcome: Outcome,
}

#[derive(Debug, Default)]
pub struct BuildSummary {
    pub outcomes: Vec<PackageOutcome>,
    pub watchers: Vec<JoinHandle<()>>,
}

impl BuildSummary {
    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o.outcome, Outcome::Failed { .. }))
    }

    pub fn is_watching(&self) -> bool {
        !self.watchers.is_empty()
    }
}

/// Runs the prepare, build and finalize phases across a set of packages.
///
/// Every phase settles for all packages before the next starts. A package
/// that fails in one phase takes no part in later ones.
pub struct Orchestrator {
    bundler: Arc<dyn Bundler>,
    flags: BuildFlags,
}

impl Orchestrator {
    pub fn new(bundler: Arc<dyn Bundler>) -> Self {
        Self {
            bundler,
            flags: BuildFlags::default(),
        }
    }

    pub fn with_flags(mut self, flags: BuildFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.flags.watch = watch;
        self
    }

    pub fn with_dev(mut self, dev: bool) -> Self {
        self.flags.dev = dev;
        self
    }

    /// Phase 1 only: clear old outputs and write stubs.
    pub async fn prepare(&self, packages: &[Package]) -> Vec<Result<()>> {
        run_in_parallel(packages, |package| async move {
            package.remove_build_folders().await?;
            package.create_stubs().await
        })
        .await
    }

    pub async fn run(&self, packages: &mut [Package]) -> BuildSummary {
        info!(
            "Beginning build{}",
            if self.flags.watch { " (watching)" } else { "" }
        );
        link_workspace(packages);

        let mut outcomes: Vec<Option<Outcome>> = vec![None; packages.len()];

        let prepared = self.prepare(packages).await;
        for (index, result) in prepared.into_iter().enumerate() {
            if let Err(e) = result {
                fail(&mut outcomes[index], packages[index].name(), Phase::Prepare, e);
            }
        }

        let mut watchers = Vec::new();
        let live: Vec<usize> = live_indices(&outcomes);
        let bundler = self.bundler.as_ref();
        let flags = self.flags;
        let built = run_in_parallel(
            packages
                .iter_mut()
                .enumerate()
                .filter(|(index, _)| live.contains(index))
                .map(|(_, package)| package),
            |package| async move { build_phase(package, bundler, flags).await },
        )
        .await;
        for (index, result) in live.iter().copied().zip(built) {
            match result {
                Ok(BuildStep::Built(reports)) => outcomes[index] = Some(Outcome::Built(reports)),
                Ok(BuildStep::Skipped) => outcomes[index] = Some(Outcome::Skipped),
                Ok(BuildStep::Watching(handle)) => {
                    watchers.push(handle);
                    outcomes[index] = Some(Outcome::Watching);
                }
                Err(e) => fail(&mut outcomes[index], packages[index].name(), Phase::Build, e),
            }
        }

        let finalizable: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| matches!(o, Some(Outcome::Built(_)) | Some(Outcome::Skipped) | None))
            .map(|(index, _)| index)
            .collect();
        let finalized = run_in_parallel(
            packages
                .iter_mut()
                .enumerate()
                .filter(|(index, _)| finalizable.contains(index))
                .map(|(_, package)| package),
            |package| async move { finalize(package).await },
        )
        .await;
        for (index, result) in finalizable.iter().copied().zip(finalized) {
            if let Err(e) = result {
                fail(&mut outcomes[index], packages[index].name(), Phase::Finalize, e);
            }
        }

        let outcomes = packages
            .iter()
            .zip(outcomes)
            .map(|(package, outcome)| PackageOutcome {
                package: package.name().to_string(),
                outcome: outcome.unwrap_or(Outcome::Built(Vec::new())),
            })
            .collect();

        BuildSummary { outcomes, watchers }
    }
}

fn live_indices(outcomes: &[Option<Outcome>]) -> Vec<usize> {
    outcomes
        .iter()
        .enumerate()
        .filter(|(_, o)| o.is_none())
        .map(|(index, _)| index)
        .collect()
}

fn fail(slot: &mut Option<Outcome>, package: &str, phase: Phase, e: Error) {
    error!(package = %package, phase = %phase, "{}", e);
    *slot = Some(Outcome::Failed {
        phase,
        message: e.to_string(),
    });
}

/// Every package links against every workspace member, by unsuffixed name.
fn link_workspace(packages: &mut [Package]) {
    let names: Vec<String> = packages.iter().map(|p| p.unsuffixed_name()).collect();
    for package in packages.iter_mut() {
        let options = package.options_mut();
        let linked: IndexSet<String> = options
            .linked_dependencies
            .drain(..)
            .chain(names.iter().cloned())
            .collect();
        options.linked_dependencies = linked.into_iter().collect();
    }
}

enum BuildStep {
    Built(Vec<BuildReport>),
    Skipped,
    Watching(JoinHandle<()>),
}

async fn build_phase(package: &mut Package, bundler: &dyn Bundler, flags: BuildFlags) -> Result<BuildStep> {
    if !package.options().suffix.is_empty() {
        package.suffix_and_version().await?;
        package.write_package().await?;
    }
    if !package.options().build {
        return Ok(BuildStep::Skipped);
    }
    if flags.watch {
        watch_package(package, bundler, flags).await.map(BuildStep::Watching)
    } else {
        build_package(package, bundler, flags).await.map(BuildStep::Built)
    }
}

async fn finalize(package: &mut Package) -> Result<()> {
    package.sync_linked_dependencies();
    package.auto_fix()?;
    package.set_binary_permissions().await?;
    package.write_package().await
}

/// Options with linked-dependency rewriting and flags applied, after the extend hook.
async fn extended_options(package: &Package, flags: BuildFlags) -> BuildOptions {
    let mut options = package.options().build_options.clone();
    options.dev = options.dev || flags.dev || flags.watch;
    options.watch = flags.watch;

    let suffix = &package.options().suffix;
    if !suffix.is_empty() {
        for name in &package.options().linked_dependencies {
            let suffixed = format!("{}{}", name, suffix);
            options
                .replace
                .insert(format!("'{}'", name), format!("'{}'", suffixed));
            options.alias.insert(name.clone(), suffixed);
        }
    }

    package.call_hook(&mut HookPayload::Extend(&mut options)).await;
    options
}

/// Synthesizes the package's configurations, passing them through both extension hooks.
pub async fn build_configs(package: &Package, flags: BuildFlags) -> Result<Vec<BuildConfig>> {
    let options = extended_options(package, flags).await;
    let mut configs = synthesize(package, &options)?;
    package
        .call_hook(&mut HookPayload::ExtendConfig(&mut configs))
        .await;
    Ok(configs)
}

/// Builds every configuration of one package concurrently.
pub async fn build_package(
    package: &Package,
    bundler: &dyn Bundler,
    flags: BuildFlags,
) -> Result<Vec<BuildReport>> {
    let configs = build_configs(package, flags).await?;
    if configs.is_empty() {
        debug!(package = %package.name(), "nothing to build");
        return Ok(Vec::new());
    }

    debug!(package = %package.name(), "Building {}", package.name());
    let results = run_in_parallel(&configs, |config| async move {
        let report = bundler
            .build(config)
            .await
            .map_err(|e| format_error(package, e))?;
        log_report(package, &report);
        package.call_hook(&mut HookPayload::Done(&report)).await;
        Ok::<_, Error>(report)
    })
    .await;

    results.into_iter().collect()
}

/// Starts watching one package; events are logged until the process exits.
pub async fn watch_package(
    package: &Package,
    bundler: &dyn Bundler,
    flags: BuildFlags,
) -> Result<JoinHandle<()>> {
    let configs = build_configs(package, flags).await?;
    let mut events = bundler.watch(configs).map_err(|e| Error::Watch {
        package: package.name().to_string(),
        message: describe_error(package.root_dir(), &e),
    })?;
    let name = package.name().to_string();
    let root_dir = package.root_dir().to_path_buf();

    Ok(tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                WatchEvent::Start => debug!(package = %name, "Watching {} for changes", name),
                WatchEvent::BundleStart { .. } => debug!(package = %name, "Building {}", name),
                WatchEvent::BundleEnd { .. } => {}
                WatchEvent::End => info!(package = %name, "Built {}", name),
                WatchEvent::Error(e) => {
                    error!(package = %name, "{}", describe_error(&root_dir, &e))
                }
            }
        }
    }))
}

fn describe_error(root_dir: &Path, e: &BundlerError) -> String {
    match e.loc {
        Some(_) => e.to_string(),
        None => format!("{}\nat {}", e, root_dir.display()),
    }
}

fn format_error(package: &Package, e: BundlerError) -> Error {
    Error::Package {
        package: package.name().to_string(),
        message: describe_error(package.root_dir(), &e),
    }
}

fn log_report(package: &Package, report: &BuildReport) {
    for output in &report.outputs {
        info!(
            package = %package.name(),
            "Built {:<15} {:>15} {:>8}",
            package.name(),
            output.file_name,
            format_size(output.size)
        );
    }
}
